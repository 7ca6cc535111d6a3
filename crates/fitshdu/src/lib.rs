#![cfg_attr(not(feature = "std"), no_std)]

//! Typed FITS header cards and HDU navigation.
//!
//! The card codec ([`card`], [`value`], [`keyword`]) works without `std`.
//! File handles and HDU views ([`hdu`], [`header`]) need the `std` feature.

extern crate alloc;

pub mod block;
pub mod card;
pub mod error;
pub mod io;
pub mod keyword;
pub mod layout;
pub mod memory;
pub mod value;

#[cfg(feature = "std")]
pub mod hdu;
#[cfg(feature = "std")]
pub mod header;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use card::{format_card, parse_record, parse_records, Card, FormatOptions, NumberFormat};
pub use error::{Error, Result};
pub use io::{ElementType, FitsIo, HduTypeCode};
pub use keyword::{classify, names_eq, KeywordClass};
pub use memory::MemoryFits;
pub use value::{CardType, FromValue, Value};

#[cfg(feature = "std")]
pub use hdu::{FitsFile, Hdu, HduKind};
#[cfg(feature = "std")]
pub use header::{CardKey, SetMode};
