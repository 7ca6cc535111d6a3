//! Structural keywords: building the mandatory cards of new HDUs and sizing
//! the data segment that follows a header.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::card::Card;
use crate::error::{Error, Result};
use crate::io::HduTypeCode;
use crate::keyword::names_eq;
use crate::value::Value;

/// BITPIX values allowed by the standard.
pub const VALID_BITPIX: [i64; 6] = [8, 16, 32, 64, -32, -64];

/// The `XTENSION` kinds this crate can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Image,
    AsciiTable,
    BinaryTable,
}

impl Extension {
    /// The `XTENSION` value string.
    pub fn as_str(self) -> &'static str {
        match self {
            Extension::Image => "IMAGE",
            Extension::AsciiTable => "TABLE",
            Extension::BinaryTable => "BINTABLE",
        }
    }
}

fn find_value<'a>(cards: &'a [Card], name: &str) -> Option<&'a Value> {
    cards
        .iter()
        .find(|c| names_eq(&c.name, name))
        .and_then(|c| c.value.as_ref())
}

fn card_integer(cards: &[Card], name: &str) -> Option<i64> {
    match find_value(cards, name) {
        Some(Value::Integer(n)) => Some(*n),
        _ => None,
    }
}

fn card_float(cards: &[Card], name: &str) -> Option<f64> {
    match find_value(cards, name) {
        Some(Value::Integer(n)) => Some(*n as f64),
        Some(Value::Float(f)) => Some(*f),
        _ => None,
    }
}

fn card_logical(cards: &[Card], name: &str) -> Option<bool> {
    match find_value(cards, name) {
        Some(Value::Logical(b)) => Some(*b),
        _ => None,
    }
}

fn required(cards: &[Card], name: &'static str) -> Result<usize> {
    let n = card_integer(cards, name).ok_or(Error::InvalidHeader(name))?;
    usize::try_from(n).map_err(|_| Error::ValueRange(format!("{name} = {n} is negative")))
}

/// Returns `true` if the header starts with `SIMPLE`.
pub fn is_primary(cards: &[Card]) -> bool {
    cards
        .first()
        .map(|c| names_eq(&c.name, "SIMPLE"))
        .unwrap_or(false)
}

/// The `XTENSION` value, trimmed, or `None` for a primary header.
pub fn xtension(cards: &[Card]) -> Option<String> {
    match cards.first() {
        Some(c) if names_eq(&c.name, "XTENSION") => match &c.value {
            Some(Value::String(s)) => Some(String::from(s.trim_end())),
            _ => None,
        },
        _ => None,
    }
}

/// HDU type of a header: the primary array counts as an image.
pub fn type_code(cards: &[Card]) -> HduTypeCode {
    if is_primary(cards) {
        return HduTypeCode::Image;
    }
    match xtension(cards).as_deref() {
        Some("IMAGE") => HduTypeCode::Image,
        Some("TABLE") => HduTypeCode::AsciiTable,
        Some("BINTABLE") => HduTypeCode::BinaryTable,
        _ => HduTypeCode::Unknown,
    }
}

/// Axis lengths `NAXIS1..NAXISn`.
pub fn axes(cards: &[Card]) -> Result<Vec<usize>> {
    let naxis = required(cards, "NAXIS")?;
    (1..=naxis)
        .map(|i| {
            let name = format!("NAXIS{i}");
            let n = card_integer(cards, &name).ok_or(Error::InvalidHeader("missing NAXISn"))?;
            usize::try_from(n).map_err(|_| Error::ValueRange(format!("{name} = {n} is negative")))
        })
        .collect()
}

/// `(BITPIX, BZERO, BSCALE)` with the standard defaults for the scaling.
pub fn scaling(cards: &[Card]) -> Result<(i64, f64, f64)> {
    let bitpix = card_integer(cards, "BITPIX").ok_or(Error::InvalidHeader("BITPIX"))?;
    let bzero = card_float(cards, "BZERO").unwrap_or(0.0);
    let bscale = card_float(cards, "BSCALE").unwrap_or(1.0);
    Ok((bitpix, bzero, bscale))
}

/// Size in bytes of the data segment described by `cards`, before padding.
///
/// `|BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`, with random
/// groups (`GROUPS = T`, `NAXIS1 = 0`) leaving NAXIS1 out of the product.
pub fn data_byte_len(cards: &[Card]) -> Result<usize> {
    let (bitpix, _, _) = scaling(cards)?;
    if !VALID_BITPIX.contains(&bitpix) {
        return Err(Error::InvalidHeader("BITPIX"));
    }
    let dims = axes(cards)?;
    if dims.is_empty() {
        return Ok(0);
    }
    let bytes_per_value = (bitpix.unsigned_abs() / 8) as usize;
    let primary = is_primary(cards);
    let groups = primary && dims[0] == 0 && card_logical(cards, "GROUPS") == Some(true);

    let counted = if groups { &dims[1..] } else { &dims[..] };
    let pixels = counted
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::InvalidHeader("data size overflow"))?;

    let (pcount, gcount) = if primary && !groups {
        (0, 1)
    } else {
        let pcount = card_integer(cards, "PCOUNT").unwrap_or(0).max(0) as usize;
        let gcount = card_integer(cards, "GCOUNT").unwrap_or(1).max(1) as usize;
        (pcount, gcount)
    };

    pcount
        .checked_add(pixels)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bytes_per_value))
        .ok_or(Error::InvalidHeader("data size overflow"))
}

fn check_bitpix(bitpix: i64) -> Result<()> {
    if VALID_BITPIX.contains(&bitpix) {
        Ok(())
    } else {
        Err(Error::ValueRange(format!("unsupported BITPIX {bitpix}")))
    }
}

fn axis_cards(cards: &mut Vec<Card>, naxes: &[usize]) {
    cards.push(Card::new("NAXIS", naxes.len() as i64).with_comment("number of array dimensions"));
    for (i, &dim) in naxes.iter().enumerate() {
        cards.push(Card::new(&format!("NAXIS{}", i + 1), dim as i64));
    }
}

/// Mandatory cards of a primary HDU.
pub fn primary_cards(bitpix: i64, naxes: &[usize]) -> Result<Vec<Card>> {
    check_bitpix(bitpix)?;
    let mut cards = Vec::with_capacity(4 + naxes.len());
    cards.push(Card::new("SIMPLE", true).with_comment("conforms to FITS standard"));
    cards.push(Card::new("BITPIX", bitpix).with_comment("bits per data value"));
    axis_cards(&mut cards, naxes);
    cards.push(Card::new("EXTEND", true));
    Ok(cards)
}

/// Mandatory cards of an image extension.
pub fn image_cards(bitpix: i64, naxes: &[usize]) -> Result<Vec<Card>> {
    check_bitpix(bitpix)?;
    let mut cards = Vec::with_capacity(5 + naxes.len());
    cards.push(Card::new("XTENSION", Extension::Image.as_str()).with_comment("image extension"));
    cards.push(Card::new("BITPIX", bitpix).with_comment("bits per data value"));
    axis_cards(&mut cards, naxes);
    cards.push(Card::new("PCOUNT", 0i64));
    cards.push(Card::new("GCOUNT", 1i64));
    Ok(cards)
}

/// Mandatory cards of an ASCII or binary table with `row_len`-byte rows.
pub fn table_cards(ascii: bool, row_len: usize, rows: usize, tfields: usize) -> Vec<Card> {
    let (ext, comment) = if ascii {
        (Extension::AsciiTable, "ASCII table extension")
    } else {
        (Extension::BinaryTable, "binary table extension")
    };
    let mut cards = Vec::with_capacity(8);
    cards.push(Card::new("XTENSION", ext.as_str()).with_comment(comment));
    cards.push(Card::new("BITPIX", 8i64));
    axis_cards(&mut cards, &[row_len, rows]);
    cards.push(Card::new("PCOUNT", 0i64));
    cards.push(Card::new("GCOUNT", 1i64));
    cards.push(Card::new("TFIELDS", tfields as i64));
    cards
}
