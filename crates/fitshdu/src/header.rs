//! Card-collection operations on an HDU: lookup, update, append, delete and
//! lazy iteration.
//!
//! Card positions are 1-based physical record positions. Reading at a
//! position yields the logical card that starts there, with any CONTINUE
//! records that follow it joined in.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use tracing::debug;

use crate::card::{
    format_card, optional_text, parse_continued, Card, FormatOptions, NumberFormat, Record,
};
use crate::error::{Error, Result};
use crate::hdu::Hdu;
use crate::io::FitsIo;
use crate::keyword::{classify, names_eq, KeywordClass};
use crate::value::{FromValue, Value};

/// Longest text placed on one COMMENT or HISTORY card by the append helpers.
pub const COMMENTARY_CHUNK: usize = 70;

/// How [`Hdu::set`] treats an existing card with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Replace the first match, or append if there is none.
    #[default]
    Update,
    /// Always append, leaving existing cards alone.
    Append,
}

/// A card found in the header, with where it lives.
#[derive(Debug, Clone)]
pub struct Located {
    /// 1-based position of its first record.
    pub position: usize,
    /// Number of records it spans.
    pub records: usize,
    pub card: Card,
    /// Found by name, so no earlier card shares its keyword.
    keyed: bool,
}

/// Read the logical card starting at `pos` of a header with `total` records.
fn read_at<B: FitsIo>(io: &mut B, pos: usize, total: usize) -> Result<(Card, usize)> {
    let first = io.read_record(pos)?;
    parse_continued(&first, |n| {
        if pos + n <= total {
            io.read_record(pos + n).map(Some)
        } else {
            Ok(None)
        }
    })
}

fn header_len<B: FitsIo>(io: &mut B) -> Result<usize> {
    io.header_space().map(|(existing, _)| existing)
}

/// Addresses a card by 1-based position or by name.
pub trait CardKey {
    /// Find the card. A position out of range is [`Error::NotFound`]; an
    /// unmatched name is `Ok(None)`.
    fn locate<B: FitsIo>(&self, io: &mut B) -> Result<Option<Located>>;

    /// How the key reads in error messages.
    fn describe(&self) -> String;
}

impl CardKey for usize {
    fn locate<B: FitsIo>(&self, io: &mut B) -> Result<Option<Located>> {
        let total = header_len(io)?;
        if *self == 0 || *self > total {
            return Err(Error::NotFound(self.describe()));
        }
        let (card, records) = read_at(io, *self, total)?;
        Ok(Some(Located {
            position: *self,
            records,
            card,
            keyed: false,
        }))
    }

    fn describe(&self) -> String {
        format!("card {self}")
    }
}

impl CardKey for &str {
    fn locate<B: FitsIo>(&self, io: &mut B) -> Result<Option<Located>> {
        let total = header_len(io)?;
        let mut pos = 1;
        while pos <= total {
            let (card, records) = read_at(io, pos, total)?;
            if names_eq(&card.name, self) {
                return Ok(Some(Located {
                    position: pos,
                    records,
                    card,
                    keyed: true,
                }));
            }
            pos += records;
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!("keyword {}", self.trim_end())
    }
}

impl CardKey for String {
    fn locate<B: FitsIo>(&self, io: &mut B) -> Result<Option<Located>> {
        self.as_str().locate(io)
    }

    fn describe(&self) -> String {
        self.as_str().describe()
    }
}

fn encode(card: &Card) -> Result<Vec<Record>> {
    match format_card(card, &FormatOptions::default()) {
        // A comment too long for the fixed layout may fit after a free-format value.
        Err(Error::ValueRange(_)) => format_card(
            card,
            &FormatOptions {
                number_format: NumberFormat::Free,
            },
        ),
        other => other,
    }
}

/// Returns `true` if the first record keyed by the card's name is the card
/// itself, so keyword-addressed collaborator calls hit it.
fn keyword_addressable(found: &Located) -> bool {
    found.keyed && found.records == 1 && classify(&found.card.name) == KeywordClass::Other
}

/// Replace the records of `found` with `records`.
fn replace<B: FitsIo>(io: &mut B, found: &Located, records: &[Record]) -> Result<()> {
    if keyword_addressable(found) && records.len() == 1 {
        return io.update_record(&found.card.name, &records[0]);
    }
    for _ in 0..found.records {
        io.delete_record(found.position)?;
    }
    for (i, record) in records.iter().enumerate() {
        io.insert_record(found.position + i, record)?;
    }
    Ok(())
}

fn append_records<B: FitsIo>(io: &mut B, records: &[Record]) -> Result<()> {
    for record in records {
        io.write_record(record)?;
    }
    Ok(())
}

/// Split commentary text into chunks of at most [`COMMENTARY_CHUNK`] chars.
fn commentary_chunks(text: &str) -> Vec<String> {
    if text.is_empty() {
        return alloc::vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(COMMENTARY_CHUNK)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

impl<B: FitsIo> Hdu<B> {
    /// The card at a position or with a name.
    pub fn card<K: CardKey>(&self, key: K) -> Result<Option<Card>> {
        self.with_io(|io| Ok(key.locate(io)?.map(|found| found.card)))
    }

    /// Like [`Hdu::card`], with the card's position and record span.
    pub fn locate<K: CardKey>(&self, key: K) -> Result<Option<Located>> {
        self.with_io(|io| key.locate(io))
    }

    /// Returns `true` if a card named `name` exists.
    pub fn contains(&self, name: &str) -> Result<bool> {
        self.with_io(|io| Ok(name.locate(io)?.is_some()))
    }

    /// Write a valued card.
    ///
    /// In [`SetMode::Update`] the first card named `name` is replaced, keeping
    /// its comment when `comment` is `None`; if there is none the card is
    /// appended. [`SetMode::Append`] always appends.
    pub fn set(
        &self,
        name: &str,
        value: impl Into<Value>,
        comment: Option<&str>,
        mode: SetMode,
    ) -> Result<()> {
        let mut card = Card::new(name, value);
        card.comment = comment.and_then(optional_text);
        self.with_io(|io| {
            let found = match mode {
                SetMode::Update => name.locate(io)?,
                SetMode::Append => None,
            };
            match found {
                Some(found) => {
                    if comment.is_none() {
                        card.comment = found.card.comment.clone();
                    }
                    debug!(
                        hdu = self.num(),
                        keyword = name,
                        position = found.position,
                        "updating card"
                    );
                    replace(io, &found, &encode(&card)?)
                }
                None => {
                    debug!(hdu = self.num(), keyword = name, "appending card");
                    append_records(io, &encode(&card)?)
                }
            }
        })
    }

    /// Replace the value of the card at `position`, keeping its name, and its
    /// comment when `comment` is `None`.
    pub fn update_at(
        &self,
        position: usize,
        value: impl Into<Value>,
        comment: Option<&str>,
    ) -> Result<()> {
        let value = value.into();
        self.with_io(|io| {
            let found = position
                .locate(io)?
                .ok_or_else(|| Error::NotFound(position.describe()))?;
            let card = Card {
                name: found.card.name.clone(),
                value: Some(value),
                comment: match comment {
                    Some(text) => optional_text(text),
                    None => found.card.comment.clone(),
                },
                raw: None,
            };
            replace(io, &found, &encode(&card)?)
        })
    }

    /// Change only the comment of a card. The value and its type are kept,
    /// so an undefined card stays undefined. On a commentary card this
    /// replaces its text.
    pub fn set_comment<K: CardKey>(&self, key: K, comment: &str) -> Result<()> {
        self.with_io(|io| {
            let found = key
                .locate(io)?
                .ok_or_else(|| Error::NotFound(key.describe()))?;
            let mut card = found.card.clone();
            card.comment = optional_text(comment);
            replace(io, &found, &encode(&card)?)
        })
    }

    /// Remove a card and any CONTINUE records belonging to it.
    pub fn delete<K: CardKey>(&self, key: K) -> Result<()> {
        self.with_io(|io| {
            let found = key
                .locate(io)?
                .ok_or_else(|| Error::NotFound(key.describe()))?;
            debug!(
                hdu = self.num(),
                position = found.position,
                records = found.records,
                "deleting card"
            );
            if keyword_addressable(&found) {
                return io.delete_key(&found.card.name);
            }
            for _ in 0..found.records {
                io.delete_record(found.position)?;
            }
            Ok(())
        })
    }

    fn append_commentary(&self, name: &str, text: &str) -> Result<()> {
        let mut records = Vec::new();
        for chunk in commentary_chunks(text) {
            records.extend(encode(&Card::commentary(name, &chunk))?);
        }
        self.with_io(|io| append_records(io, &records))
    }

    /// Append `COMMENT` cards, splitting text longer than 70 characters.
    pub fn append_comment(&self, text: &str) -> Result<()> {
        self.append_commentary("COMMENT", text)
    }

    /// Append `HISTORY` cards, splitting text longer than 70 characters.
    pub fn append_history(&self, text: &str) -> Result<()> {
        self.append_commentary("HISTORY", text)
    }

    /// Lazy iterator over the logical cards in storage order.
    pub fn cards(&self) -> Cards<B> {
        Cards {
            hdu: self.clone(),
            next: 1,
            done: false,
        }
    }

    /// All logical cards.
    pub fn header(&self) -> Result<Vec<Card>> {
        self.cards().collect()
    }

    /// Read a keyword's value as `T`. A missing keyword is
    /// [`Error::NotFound`].
    pub fn read_key<T: FromValue>(&self, name: &str) -> Result<T> {
        self.card(name)?
            .ok_or_else(|| Error::NotFound(name.describe()))?
            .value_as()
    }

    /// Update-or-append a keyword.
    pub fn write_key(
        &self,
        name: &str,
        value: impl Into<Value>,
        comment: Option<&str>,
    ) -> Result<()> {
        self.set(name, value, comment, SetMode::Update)
    }

    /// The `[units]` of a keyword's comment.
    pub fn units(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .card(name)?
            .and_then(|card| card.units().map(ToString::to_string)))
    }

    /// Number of header records (END excluded). Valid positions are
    /// `1..=len`.
    pub fn len(&self) -> Result<usize> {
        self.with_io(header_len)
    }

    /// Returns `true` if the header holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// `(existing, remaining)` records; see [`FitsIo::header_space`].
    pub fn header_space(&self) -> Result<(usize, usize)> {
        self.with_io(|io| io.header_space())
    }
}

/// Lazy, restartable iterator over an HDU's logical cards.
///
/// Each step reads from the file, so edits made between steps are seen.
/// Iteration ends after the first error.
#[derive(Debug)]
pub struct Cards<B> {
    hdu: Hdu<B>,
    next: usize,
    done: bool,
}

impl<B: FitsIo> Cards<B> {
    /// Start again from the first card.
    pub fn rewind(&mut self) {
        self.next = 1;
        self.done = false;
    }
}

impl<B: FitsIo> Iterator for Cards<B> {
    type Item = Result<Card>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pos = self.next;
        let step = self.hdu.with_io(|io| {
            let total = header_len(io)?;
            if pos > total {
                return Ok(None);
            }
            read_at(io, pos, total).map(Some)
        });
        match step {
            Ok(Some((card, records))) => {
                self.next += records;
                Some(Ok(card))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
