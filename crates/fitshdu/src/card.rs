//! Header cards and the codec between cards and 80-byte records.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str;

use tracing::warn;

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};
use crate::keyword::{classify, names_eq, validate_keyword, KeywordClass, KEYWORD_LEN};
use crate::value::{format_scalar, parse_token, split_units, CardType, FromValue, Value};

/// One physical 80-byte header record.
pub type Record = [u8; CARD_SIZE];

/// Longest commentary text that fits after the keyword field.
pub const MAX_COMMENTARY_LEN: usize = CARD_SIZE - KEYWORD_LEN;

/// Column (0-based) where fixed-format numeric and logical values end.
const FIXED_VALUE_END: usize = 30;

/// Column (0-based) where the value field of a standard card begins.
const VALUE_START: usize = 10;

// ── Types ──

/// One logical header entry. A long string may span several records.
#[derive(Debug, Clone)]
pub struct Card {
    /// Keyword name, right-trimmed. HIERARCH names keep their prefix.
    pub name: String,
    /// The decoded value; `None` for commentary cards and END.
    pub value: Option<Value>,
    /// Trailing comment, or the full text of a commentary card.
    ///
    /// Trailing spaces are not significant: parsing drops them, and so do the
    /// constructors and the header editing methods.
    pub comment: Option<String>,
    /// The value token as it appeared in the first record, if parsed.
    pub raw: Option<String>,
}

impl PartialEq for Card {
    fn eq(&self, other: &Self) -> bool {
        names_eq(&self.name, &other.name)
            && self.value == other.value
            && self.comment == other.comment
    }
}

impl Card {
    /// A valued card.
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Card {
            name: name.to_string(),
            value: Some(value.into()),
            comment: None,
            raw: None,
        }
    }

    /// A card whose value field is blank.
    pub fn undefined(name: &str) -> Self {
        Card {
            name: name.to_string(),
            value: Some(Value::Undefined),
            comment: None,
            raw: None,
        }
    }

    /// A commentary card (`COMMENT`, `HISTORY`, blank, or any keyword without
    /// a value indicator).
    pub fn commentary(name: &str, text: &str) -> Self {
        Card {
            name: name.to_string(),
            value: None,
            comment: optional_text(text),
            raw: None,
        }
    }

    /// A `COMMENT` card.
    pub fn comment(text: &str) -> Self {
        Card::commentary("COMMENT", text)
    }

    /// A `HISTORY` card.
    pub fn history(text: &str) -> Self {
        Card::commentary("HISTORY", text)
    }

    /// Attach a trailing comment. A blank comment removes it.
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = optional_text(comment);
        self
    }

    /// The card type tag.
    pub fn card_type(&self) -> CardType {
        match &self.value {
            Some(value) => value.card_type(),
            None if names_eq(&self.name, "END") => CardType::End,
            None => CardType::Comment,
        }
    }

    /// Classification of the keyword.
    pub fn keyword_class(&self) -> KeywordClass {
        classify(&self.name)
    }

    /// Returns `true` if the card carries text rather than a value.
    pub fn is_commentary(&self) -> bool {
        self.card_type() == CardType::Comment
    }

    /// Returns `true` if this is the END pseudo-card.
    pub fn is_end(&self) -> bool {
        self.card_type() == CardType::End
    }

    /// The `[units]` token at the start of the comment, if any.
    pub fn units(&self) -> Option<&str> {
        self.comment.as_deref().and_then(|c| split_units(c).0)
    }

    /// The comment with any leading `[units]` token removed.
    pub fn unitless(&self) -> Option<&str> {
        self.comment.as_deref().map(|c| split_units(c).1)
    }

    /// Convert the value to `T`.
    pub fn value_as<T: FromValue>(&self) -> Result<T> {
        match &self.value {
            Some(value) => T::from_value(value),
            None => Err(Error::TypeMismatch {
                expected: "value",
                found: self.card_type().name(),
            }),
        }
    }
}

// ── Parsing ──

fn malformed(offset: usize, reason: &'static str) -> Error {
    Error::MalformedCard { offset, reason }
}

fn record_text(record: &[u8]) -> Result<&str> {
    if record.len() != CARD_SIZE {
        return Err(malformed(record.len(), "record is not 80 bytes"));
    }
    if let Some(pos) = record.iter().position(|&b| !(0x20..=0x7e).contains(&b)) {
        return Err(malformed(pos, "non-printable byte"));
    }
    str::from_utf8(record).map_err(|e| malformed(e.valid_up_to(), "non-printable byte"))
}

/// Comment text with trailing spaces removed, or `None` when blank.
pub(crate) fn optional_text(text: &str) -> Option<String> {
    let text = text.trim_end();
    if text.is_empty() {
        None
    } else {
        Some(String::from(text))
    }
}

/// Parse a comment that starts right after the `/` separator.
fn comment_after_slash(text: &str) -> Option<String> {
    optional_text(text.strip_prefix(' ').unwrap_or(text))
}

/// Parse a quoted string starting at `field[0] == '\''`.
///
/// Returns the unescaped content and the index just past the closing quote.
fn parse_quoted(field: &str, offset: usize) -> Result<(String, usize)> {
    let bytes = field.as_bytes();
    let mut value = String::new();
    let mut i = 1;
    loop {
        if i >= bytes.len() {
            return Err(malformed(offset, "unterminated string"));
        }
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                value.push('\'');
                i += 2;
            } else {
                return Ok((value, i + 1));
            }
        } else {
            value.push(bytes[i] as char);
            i += 1;
        }
    }
}

struct ValueField {
    value: Value,
    comment: Option<String>,
    raw: Option<String>,
}

/// Decode the value field of a record. `offset` is the index of `field[0]`
/// within the record, used for error reporting.
fn parse_value_field(field: &str, offset: usize) -> Result<ValueField> {
    let start = field.len() - field.trim_start_matches(' ').len();
    let body = &field[start..];
    let offset = offset + start;

    if body.is_empty() {
        return Ok(ValueField {
            value: Value::Undefined,
            comment: None,
            raw: None,
        });
    }

    if body.starts_with('\'') {
        let (text, end) = parse_quoted(body, offset)?;
        let after = &body[end..];
        let after_trimmed = after.trim_start_matches(' ');
        let comment = if after_trimmed.is_empty() {
            None
        } else if let Some(rest) = after_trimmed.strip_prefix('/') {
            comment_after_slash(rest)
        } else {
            let pos = offset + end + (after.len() - after_trimmed.len());
            return Err(malformed(pos, "unexpected text after string value"));
        };
        return Ok(ValueField {
            value: Value::String(text),
            comment,
            raw: Some(String::from(&body[..end])),
        });
    }

    let (token, comment) = match body.split_once('/') {
        Some((token, rest)) => (token, comment_after_slash(rest)),
        None => (body, None),
    };
    let token = token.trim_end();
    if token.is_empty() {
        return Ok(ValueField {
            value: Value::Undefined,
            comment,
            raw: None,
        });
    }
    match parse_token(token)? {
        Some(value) => Ok(ValueField {
            value,
            comment,
            raw: Some(String::from(token)),
        }),
        None => Err(malformed(offset, "value matches no FITS grammar")),
    }
}

fn commentary_card(name: &str, text: &str) -> Card {
    Card {
        name: String::from(name),
        value: None,
        comment: optional_text(text),
        raw: None,
    }
}

fn valued_card(name: &str, field: ValueField) -> Card {
    Card {
        name: String::from(name),
        value: Some(field.value),
        comment: field.comment,
        raw: field.raw,
    }
}

/// Parse a single 80-byte record. CONTINUE records are not joined; see
/// [`parse_card`] for that.
pub fn parse_record(record: &[u8]) -> Result<Card> {
    let text = record_text(record)?;

    if text[..KEYWORD_LEN + 1].eq_ignore_ascii_case("HIERARCH ") {
        if let Some(eq) = text.find('=') {
            let name = text[..eq].trim_end();
            if classify(name) == KeywordClass::Hierarch {
                let field = parse_value_field(&text[eq + 1..], eq + 1)?;
                return Ok(valued_card(name, field));
            }
        }
    }

    let name = text[..KEYWORD_LEN].trim_end();
    if classify(name).is_commentary() {
        return Ok(commentary_card(name, &text[KEYWORD_LEN..]));
    }

    let bytes = text.as_bytes();
    let value_start = if bytes[8] == b'=' {
        9
    } else if bytes[8] == b' ' && bytes[9] == b'=' {
        warn!(keyword = name, "value indicator found in column 10");
        10
    } else {
        return Ok(commentary_card(name, &text[KEYWORD_LEN..]));
    };

    let field = parse_value_field(&text[value_start..], value_start)?;
    Ok(valued_card(name, field))
}

/// Parse a CONTINUE record into its string fragment and comment.
///
/// Returns `None` if the record is not a string continuation.
fn parse_continue_record(record: &[u8], base: usize) -> Result<Option<(String, Option<String>)>> {
    let text = record_text(record).map_err(|e| match e {
        Error::MalformedCard { offset, reason } => malformed(base + offset, reason),
        other => other,
    })?;
    if classify(&text[..KEYWORD_LEN]) != KeywordClass::Continue {
        return Ok(None);
    }
    let field = &text[KEYWORD_LEN..];
    if !field.trim_start_matches(' ').starts_with('\'') {
        return Ok(None);
    }
    let parsed = parse_value_field(field, base + KEYWORD_LEN)?;
    match parsed.value {
        Value::String(s) => Ok(Some((s, parsed.comment))),
        _ => Ok(None),
    }
}

/// Parse the logical card that starts with `first`, pulling CONTINUE records
/// through `next`.
///
/// `next(n)` must return the record `n` places after `first`, or `None` at the
/// end of the header. Returns the card and the number of records consumed.
pub fn parse_continued<F>(first: &[u8], mut next: F) -> Result<(Card, usize)>
where
    F: FnMut(usize) -> Result<Option<Record>>,
{
    let mut card = parse_record(first)?;
    let mut consumed = 1;
    let mut comments: Vec<String> = card.comment.take().into_iter().collect();

    loop {
        let continues = matches!(&card.value, Some(Value::String(s)) if s.ends_with('&'));
        if !continues {
            break;
        }
        let record = match next(consumed)? {
            Some(record) => record,
            None => break,
        };
        let (fragment, comment) = match parse_continue_record(&record, consumed * CARD_SIZE)? {
            Some(parts) => parts,
            None => break,
        };
        if let Some(Value::String(s)) = card.value.as_mut() {
            s.pop();
            s.push_str(&fragment);
        }
        comments.extend(comment);
        consumed += 1;
    }

    if !comments.is_empty() {
        card.comment = Some(comments.join(" "));
    }
    Ok((card, consumed))
}

/// Parse the logical card at the start of `records`.
pub fn parse_card(records: &[Record]) -> Result<(Card, usize)> {
    let first = records
        .first()
        .ok_or_else(|| malformed(0, "no record to parse"))?;
    parse_continued(first, |n| Ok(records.get(n).copied()))
}

/// Iterator over the logical cards of a record slice.
///
/// Yields one item per card, with CONTINUE chains joined. Stops after the
/// first error.
#[derive(Debug, Clone)]
pub struct CardReader<'a> {
    records: &'a [Record],
    pos: usize,
    failed: bool,
}

impl<'a> CardReader<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        CardReader {
            records,
            pos: 0,
            failed: false,
        }
    }

    /// 0-based index of the next record to be read.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for CardReader<'_> {
    type Item = Result<Card>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.records.len() {
            return None;
        }
        match parse_card(&self.records[self.pos..]) {
            Ok((card, consumed)) => {
                self.pos += consumed;
                Some(Ok(card))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse a sequence of records into logical cards, joining CONTINUE chains.
pub fn parse_records(records: &[Record]) -> Result<Vec<Card>> {
    CardReader::new(records).collect()
}

/// The keyword of a record without decoding its value: the HIERARCH name up
/// to `=`, or columns 1-8, right-trimmed.
pub fn record_keyword(record: &Record) -> &str {
    let text = match str::from_utf8(record) {
        Ok(text) => text,
        Err(_) => return "",
    };
    if text[..KEYWORD_LEN + 1].eq_ignore_ascii_case("HIERARCH ") {
        if let Some(eq) = text.find('=') {
            let name = text[..eq].trim_end();
            if classify(name) == KeywordClass::Hierarch {
                return name;
            }
        }
    }
    text[..KEYWORD_LEN].trim_end()
}

// ── Writing ──

/// Layout of numeric and logical values in the value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// Right-justified so the value ends in column 30.
    #[default]
    Fixed,
    /// Left-justified from column 11.
    Free,
}

/// Options controlling [`format_card`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatOptions {
    pub number_format: NumberFormat,
}

fn blank_record() -> Record {
    [b' '; CARD_SIZE]
}

/// Copy `text` into `record` at `at`, truncating at the record end.
/// Returns the index just past the last byte written.
fn put(record: &mut Record, at: usize, text: &[u8]) -> usize {
    let len = text.len().min(CARD_SIZE.saturating_sub(at));
    record[at..at + len].copy_from_slice(&text[..len]);
    at + len
}

fn check_printable(text: &str) -> Result<()> {
    match text.bytes().position(|b| !(0x20..=0x7e).contains(&b)) {
        Some(pos) => Err(malformed(pos, "non-printable character in card text")),
        None => Ok(()),
    }
}

/// Write ` / comment` after `end`. A comment that does not fit whole is a
/// range error.
fn put_comment(record: &mut Record, end: usize, comment: Option<&str>) -> Result<()> {
    if let Some(comment) = comment {
        if !comment_fits(end, Some(comment)) {
            return Err(Error::ValueRange(alloc::format!(
                "comment of {} characters does not fit in the record",
                comment.len()
            )));
        }
        record[end + 1] = b'/';
        put(record, end + 3, comment.as_bytes());
    }
    Ok(())
}

fn comment_fits(end: usize, comment: Option<&str>) -> bool {
    match comment {
        Some(c) => end + 3 + c.len() <= CARD_SIZE,
        None => true,
    }
}

fn escaped_len(s: &str) -> usize {
    s.len() + s.bytes().filter(|&b| b == b'\'').count()
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Longest prefix of `s` whose escaped form fits in `cap` bytes.
fn split_point(s: &str, cap: usize) -> usize {
    let mut width = 0;
    for (i, b) in s.bytes().enumerate() {
        width += if b == b'\'' { 2 } else { 1 };
        if width > cap {
            return i;
        }
    }
    s.len()
}

fn continue_record() -> Record {
    let mut record = blank_record();
    put(&mut record, 0, b"CONTINUE");
    record
}

/// Emit a string value, splitting it over CONTINUE records when it does not
/// fit after `start` in `first`.
fn format_string(
    first: Record,
    start: usize,
    s: &str,
    comment: Option<&str>,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut record = first;
    let mut start = start;
    let mut rest = s;

    loop {
        let room = CARD_SIZE - start;
        let esc = escaped_len(rest);

        if esc + 2 <= room && comment_fits(start + esc + 2, comment) {
            let end = put(&mut record, start, alloc::format!("'{}'", escape(rest)).as_bytes());
            put_comment(&mut record, end, comment)?;
            records.push(record);
            return Ok(records);
        }

        if esc + 3 <= room {
            // The string fits but its comment does not: close the chain with an
            // empty fragment that carries the comment.
            put(&mut record, start, alloc::format!("'{}&'", escape(rest)).as_bytes());
            records.push(record);
            let mut tail = continue_record();
            let end = put(&mut tail, VALUE_START, b"''");
            put_comment(&mut tail, end, comment)?;
            records.push(tail);
            return Ok(records);
        }

        if room < 4 {
            return Err(Error::ValueRange(String::from(
                "string value does not fit in the record",
            )));
        }
        let take = split_point(rest, room - 3);
        if take == 0 {
            return Err(Error::ValueRange(String::from(
                "string value does not fit in the record",
            )));
        }
        let (chunk, remainder) = rest.split_at(take);
        put(&mut record, start, alloc::format!("'{}&'", escape(chunk)).as_bytes());
        records.push(record);

        record = continue_record();
        start = VALUE_START;
        rest = remainder;
    }
}

/// Serialize a card into one or more 80-byte records.
///
/// More than one record is produced only when a string value (or its
/// comment) needs CONTINUE records.
pub fn format_card(card: &Card, options: &FormatOptions) -> Result<Vec<Record>> {
    let comment = card.comment.as_deref();
    if let Some(c) = comment {
        check_printable(c)?;
    }

    let value = match &card.value {
        Some(value) => value,
        None => return format_commentary(card).map(|r| alloc::vec![r]),
    };

    let name = validate_keyword(&card.name)?;
    let class = classify(&name);
    if class.is_commentary() || class == KeywordClass::Continue {
        return Err(Error::InvalidKeyword(name));
    }

    let mut record = blank_record();
    let hierarch = class == KeywordClass::Hierarch;
    let start = if hierarch {
        let end = put(&mut record, 0, name.as_bytes());
        put(&mut record, end, b" = ")
    } else {
        put(&mut record, 0, name.as_bytes());
        record[8] = b'=';
        VALUE_START
    };
    let fixed = options.number_format == NumberFormat::Fixed && !hierarch;

    if let Value::String(s) = value {
        check_printable(s)?;
        return format_string(record, start, s, comment);
    }

    let text = format_scalar(value)?;
    let at = if fixed {
        start.max(FIXED_VALUE_END.saturating_sub(text.len()))
    } else {
        start
    };
    if at + text.len() > CARD_SIZE {
        return Err(Error::ValueRange(alloc::format!(
            "value of {name} does not fit in the record"
        )));
    }
    let mut end = put(&mut record, at, text.as_bytes());
    if fixed {
        end = end.max(FIXED_VALUE_END);
    }
    put_comment(&mut record, end, comment)?;
    Ok(alloc::vec![record])
}

fn format_commentary(card: &Card) -> Result<Record> {
    let name = card.name.trim_end();
    let name = if name.is_empty() {
        String::new()
    } else {
        let name = validate_keyword(name)?;
        if name.len() > KEYWORD_LEN {
            return Err(Error::InvalidKeyword(name));
        }
        name
    };
    let mut record = blank_record();
    put(&mut record, 0, name.as_bytes());
    if let Some(text) = &card.comment {
        if text.len() > MAX_COMMENTARY_LEN {
            return Err(Error::ValueRange(alloc::format!(
                "commentary text of {} characters does not fit in the record",
                text.len()
            )));
        }
        put(&mut record, KEYWORD_LEN, text.as_bytes());
    }
    Ok(record)
}

/// Create the standard FITS END record.
pub fn format_end_card() -> Record {
    let mut record = blank_record();
    put(&mut record, 0, b"END");
    record
}

// ── Tests ──


#[cfg(test)]
mod write_tests {
    use super::*;
    use alloc::format;

    fn one(card: &Card) -> Record {
        let records = format_card(card, &FormatOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        records[0]
    }

    fn text(record: &Record) -> &str {
        str::from_utf8(record).unwrap()
    }

    #[test]
    fn fixed_integer_ends_in_column_30() {
        let rec = one(&Card::new("NAXIS", 2i64));
        assert_eq!(&rec[0..10], b"NAXIS   = ");
        assert_eq!(rec[29], b'2');
        assert_eq!(rec[28], b' ');
    }

    #[test]
    fn free_integer_starts_in_column_11() {
        let opts = FormatOptions {
            number_format: NumberFormat::Free,
        };
        let rec = format_card(&Card::new("NAXIS", 2i64), &opts).unwrap()[0];
        assert_eq!(rec[10], b'2');
    }

    #[test]
    fn fixed_logical_in_column_30() {
        let rec = one(&Card::new("SIMPLE", true));
        assert_eq!(rec[29], b'T');
    }

    #[test]
    fn comment_after_fixed_value() {
        let rec = one(&Card::new("NAXIS", 2i64).with_comment("number of axes"));
        assert_eq!(&rec[30..48], b" / number of axes ");
    }

    #[test]
    fn name_is_upper_cased() {
        let rec = one(&Card::new("naxis1", 10i64));
        assert_eq!(&rec[0..8], b"NAXIS1  ");
    }

    #[test]
    fn string_is_quoted_and_escaped() {
        let rec = one(&Card::new("OBSERVER", "O'Brien"));
        assert!(text(&rec).starts_with("OBSERVER= 'O''Brien'"));
    }

    #[test]
    fn undefined_leaves_value_blank() {
        let rec = one(&Card::undefined("BLANK").with_comment("no value"));
        assert!(text(&rec).starts_with("BLANK   =                      / no value"));
    }

    #[test]
    fn commentary_text_from_column_9() {
        let rec = one(&Card::comment("This is a comment."));
        assert_eq!(&rec[0..8], b"COMMENT ");
        assert!(text(&rec)[8..].starts_with("This is a comment."));
    }

    #[test]
    fn blank_commentary_card() {
        let rec = one(&Card::commentary("", ""));
        assert!(rec.iter().all(|&b| b == b' '));
    }

    #[test]
    fn hierarch_uses_free_layout() {
        let rec = one(&Card::new("HIERARCH ESO DET CHIP NX", 2048i64));
        assert!(text(&rec).starts_with("HIERARCH ESO DET CHIP NX = 2048"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let opts = FormatOptions::default();
        assert!(matches!(
            format_card(&Card::new("TOOLONGKEY", 1i64), &opts),
            Err(Error::InvalidKeyword(_))
        ));
        assert!(matches!(
            format_card(&Card::new("COMMENT", 1i64), &opts),
            Err(Error::InvalidKeyword(_))
        ));
    }

    #[test]
    fn non_finite_float_is_range_error() {
        let opts = FormatOptions::default();
        assert!(matches!(
            format_card(&Card::new("BAD", f64::INFINITY), &opts),
            Err(Error::ValueRange(_))
        ));
    }

    #[test]
    fn long_string_uses_continue() {
        let long: String = (0..200).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let card = Card::new("LONGSTR", long.as_str()).with_comment("a long one");
        let records = format_card(&card, &FormatOptions::default()).unwrap();
        assert!(records.len() > 1);
        for rec in &records[1..] {
            assert_eq!(&rec[0..10], b"CONTINUE  ");
        }
        let (parsed, consumed) = parse_card(&records).unwrap();
        assert_eq!(consumed, records.len());
        assert_eq!(parsed, card);
    }

    #[test]
    fn long_comment_on_short_string_gets_tail_record() {
        let comment = "x".repeat(60);
        let card = Card::new("OBJECT", "Andromeda Galaxy M31").with_comment(&comment);
        let records = format_card(&card, &FormatOptions::default()).unwrap();
        assert_eq!(records.len(), 2);
        let (parsed, _) = parse_card(&records).unwrap();
        assert_eq!(parsed, card);
    }

    #[test]
    fn longest_comment_that_fits_roundtrips() {
        let card = Card::new("NAXIS", 2i64).with_comment(&"y".repeat(47));
        let (parsed, _) = parse_card(&[one(&card)]).unwrap();
        assert_eq!(parsed, card);

        let card = Card::comment(&"z".repeat(MAX_COMMENTARY_LEN));
        let (parsed, _) = parse_card(&[one(&card)]).unwrap();
        assert_eq!(parsed, card);
    }

    #[test]
    fn overlong_comments_are_range_errors() {
        let opts = FormatOptions::default();
        let card = Card::new("NAXIS", 2i64).with_comment(&"y".repeat(60));
        assert!(matches!(format_card(&card, &opts), Err(Error::ValueRange(_))));
        let card = Card::new("OBJECT", "M31").with_comment(&"y".repeat(70));
        assert!(matches!(format_card(&card, &opts), Err(Error::ValueRange(_))));
        let card = Card::comment(&"z".repeat(100));
        assert!(matches!(format_card(&card, &opts), Err(Error::ValueRange(_))));
    }

    #[test]
    fn comment_trailing_spaces_are_dropped() {
        let card = Card::new("OBJECT", "M31").with_comment("target  ");
        assert_eq!(card.comment.as_deref(), Some("target"));
        assert_eq!(Card::new("OBJECT", "M31").with_comment("   ").comment, None);
        let records = format_card(&card, &FormatOptions::default()).unwrap();
        assert_eq!(parse_card(&records).unwrap().0, card);
    }

    #[test]
    fn quotes_are_not_split_across_records() {
        let s = "'".repeat(100);
        let card = Card::new("QUOTES", s.as_str());
        let records = format_card(&card, &FormatOptions::default()).unwrap();
        let (parsed, _) = parse_card(&records).unwrap();
        assert_eq!(parsed.value, Some(Value::String(s)));
    }

    #[test]
    fn roundtrip_every_kind() {
        let cards = [
            Card::new("SIMPLE", true).with_comment("conforms"),
            Card::new("BITPIX", -64i64),
            Card::new("BIG", i64::MIN),
            Card::new("EXPTIME", 1.0f64 / 3.0).with_comment("[s] exposure"),
            Card::new("TINY", 6.5e-200f64),
            Card::new("IMPEDNC", (1.25f64, -3.0e10f64)),
            Card::new("OBJECT", "NGC 1234  "),
            Card::new("EMPTY", ""),
            Card::undefined("BLANK").with_comment("blank value"),
            Card::comment("free text here"),
            Card::history("step 1"),
            Card::new("HIERARCH ESO TEL AIRM START", 1.204f64),
        ];
        for opts in [
            FormatOptions::default(),
            FormatOptions {
                number_format: NumberFormat::Free,
            },
        ] {
            for card in &cards {
                let records = format_card(card, &opts).unwrap();
                let (parsed, _) = parse_card(&records).unwrap();
                assert_eq!(&parsed, card, "{}", format!("{:?}", text(&records[0])));
            }
        }
    }

    #[test]
    fn end_card_format() {
        let buf = format_end_card();
        assert_eq!(&buf[0..3], b"END");
        assert!(buf[3..].iter().all(|&b| b == b' '));
    }
}
