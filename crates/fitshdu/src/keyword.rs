//! Keyword classification, comparison and validation.
//!
//! Every card access classifies its keyword, so the helpers here work on the
//! raw bytes without allocating.

use alloc::string::String;

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};

/// The prefix that introduces an ESO-style hierarchical keyword.
pub const HIERARCH_PREFIX: &str = "HIERARCH";

/// Maximum length of a standard (non-HIERARCH) keyword.
pub const KEYWORD_LEN: usize = 8;

/// Coarse classification of a keyword name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordClass {
    /// `COMMENT`, or the blank keyword.
    Comment,
    /// `HISTORY`.
    History,
    /// `CONTINUE`, the long-string continuation keyword.
    Continue,
    /// `HIERARCH` followed by a space and at least one more character.
    Hierarch,
    /// Anything else.
    Other,
}

impl KeywordClass {
    /// Returns `true` for keywords that carry free text instead of a value.
    pub fn is_commentary(self) -> bool {
        matches!(self, KeywordClass::Comment | KeywordClass::History)
    }
}

fn trim_trailing_spaces(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map(|i| i + 1)
        .unwrap_or(0);
    &bytes[..end]
}

/// Classify `name`, ignoring ASCII case and trailing spaces.
///
/// An empty or all-space name is the blank commentary keyword and classifies
/// as [`KeywordClass::Comment`]. A bare `HIERARCH` (or `HIERARCHY`) is
/// [`KeywordClass::Other`].
pub fn classify(name: &str) -> KeywordClass {
    let bytes = trim_trailing_spaces(name.as_bytes());
    match bytes.len() {
        0 => KeywordClass::Comment,
        7 if bytes.eq_ignore_ascii_case(b"COMMENT") => KeywordClass::Comment,
        7 if bytes.eq_ignore_ascii_case(b"HISTORY") => KeywordClass::History,
        8 if bytes.eq_ignore_ascii_case(b"CONTINUE") => KeywordClass::Continue,
        // Trimmed, so a length past the separator guarantees a non-space tail.
        n if n > 9
            && bytes[..8].eq_ignore_ascii_case(HIERARCH_PREFIX.as_bytes())
            && bytes[8] == b' ' =>
        {
            KeywordClass::Hierarch
        }
        _ => KeywordClass::Other,
    }
}

/// Compare two keyword names: ASCII case-folded, trailing spaces ignored.
pub fn names_eq(a: &str, b: &str) -> bool {
    trim_trailing_spaces(a.as_bytes()).eq_ignore_ascii_case(trim_trailing_spaces(b.as_bytes()))
}

/// Validate a caller-supplied keyword and return its canonical (uppercase,
/// right-trimmed) spelling.
///
/// Standard keywords are 1 to 8 characters from `A-Z`, `0-9`, `-` and `_`.
/// HIERARCH keywords may contain any printable ASCII except `=`, and must
/// leave room for the ` = ` value indicator and a value in one record.
pub fn validate_keyword(name: &str) -> Result<String> {
    let trimmed = core::str::from_utf8(trim_trailing_spaces(name.as_bytes()))
        .map_err(|_| Error::InvalidKeyword(name.into()))?;
    let upper = trimmed.to_ascii_uppercase();

    if classify(&upper) == KeywordClass::Hierarch {
        let ok = upper.bytes().all(|b| (0x20..=0x7e).contains(&b) && b != b'=');
        if !ok || upper.len() + 4 > CARD_SIZE {
            return Err(Error::InvalidKeyword(name.into()));
        }
        return Ok(upper);
    }

    if upper.is_empty() || upper.len() > KEYWORD_LEN {
        return Err(Error::InvalidKeyword(name.into()));
    }
    for b in upper.bytes() {
        match b {
            b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => {}
            _ => return Err(Error::InvalidKeyword(name.into())),
        }
    }
    Ok(upper)
}
