use alloc::format;
use alloc::string::{String, ToString};

use crate::error::{Error, Result};

/// A decoded FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS complex value `(real, imaginary)`.
    Complex(f64, f64),
    /// FITS character string, without the enclosing quotes.
    String(String),
    /// A keyword whose value field is blank. Distinct from a missing card.
    Undefined,
}

/// The type tag of a header card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Logical,
    Integer,
    Float,
    String,
    Complex,
    Comment,
    Undefined,
    End,
}

impl CardType {
    /// Upper-case name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            CardType::Logical => "LOGICAL",
            CardType::Integer => "INTEGER",
            CardType::Float => "FLOAT",
            CardType::String => "STRING",
            CardType::Complex => "COMPLEX",
            CardType::Comment => "COMMENT",
            CardType::Undefined => "UNDEFINED",
            CardType::End => "END",
        }
    }
}

impl core::fmt::Display for CardType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

fn mismatch(expected: CardType, found: &Value) -> Error {
    Error::TypeMismatch {
        expected: expected.name(),
        found: found.card_type().name(),
    }
}

impl Value {
    /// The card type tag for this value.
    pub fn card_type(&self) -> CardType {
        match self {
            Value::Logical(_) => CardType::Logical,
            Value::Integer(_) => CardType::Integer,
            Value::Float(_) => CardType::Float,
            Value::Complex(..) => CardType::Complex,
            Value::String(_) => CardType::String,
            Value::Undefined => CardType::Undefined,
        }
    }

    /// Returns `true` for [`Value::Undefined`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// The value as a logical. Only logical values convert.
    pub fn as_logical(&self) -> Result<bool> {
        match self {
            Value::Logical(b) => Ok(*b),
            other => Err(mismatch(CardType::Logical, other)),
        }
    }

    /// The value as an integer.
    ///
    /// Logicals map to 1/0. Floats convert only when they carry no fractional
    /// part and fit in an `i64`.
    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Logical(b) => Ok(i64::from(*b)),
            Value::Integer(n) => Ok(*n),
            Value::Float(f) => float_to_integer(*f),
            other => Err(mismatch(CardType::Integer, other)),
        }
    }

    /// The value as a float. Integers widen only when exactly representable.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Logical(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Integer(n) => integer_to_float(*n),
            Value::Float(f) => Ok(*f),
            other => Err(mismatch(CardType::Float, other)),
        }
    }

    /// The value as a complex pair; real values get a zero imaginary part.
    pub fn as_complex(&self) -> Result<(f64, f64)> {
        match self {
            Value::Complex(re, im) => Ok((*re, *im)),
            Value::Integer(_) | Value::Float(_) | Value::Logical(_) => Ok((self.as_float()?, 0.0)),
            other => Err(mismatch(CardType::Complex, other)),
        }
    }

    /// Borrow the value as a string. Only string values convert.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(mismatch(CardType::String, other)),
        }
    }
}

fn float_to_integer(f: f64) -> Result<i64> {
    if libm::trunc(f) != f {
        return Err(Error::TypeMismatch {
            expected: CardType::Integer.name(),
            found: CardType::Float.name(),
        });
    }
    // 2^63 is exact in f64; anything at or above it does not fit.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !(-LIMIT..LIMIT).contains(&f) {
        return Err(Error::ValueRange(format!("{f} does not fit in a 64-bit integer")));
    }
    Ok(f as i64)
}

fn integer_to_float(n: i64) -> Result<f64> {
    let f = n as f64;
    if f as i128 != i128::from(n) {
        return Err(Error::ValueRange(format!(
            "{n} is not exactly representable as a double"
        )));
    }
    Ok(f)
}

// ── Typed conversions ──

/// Types that can be extracted from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_logical()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_integer()
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let n = value.as_integer()?;
        i32::try_from(n).map_err(|_| Error::ValueRange(format!("{n} does not fit in i32")))
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Result<Self> {
        let n = value.as_integer()?;
        usize::try_from(n).map_err(|_| Error::ValueRange(format!("{n} does not fit in usize")))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_float()
    }
}

impl FromValue for (f64, f64) {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_complex()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_str().map(String::from)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<(f64, f64)> for Value {
    fn from((re, im): (f64, f64)) -> Self {
        Value::Complex(re, im)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

// ── Units ──

/// Split a comment into its `[units]` prefix and the remaining text.
///
/// `"[m/s] radial velocity"` gives `(Some("m/s"), "radial velocity")`. A comment
/// without a leading bracketed token gives `(None, comment)`.
pub fn split_units(comment: &str) -> (Option<&str>, &str) {
    if let Some(rest) = comment.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let units = &rest[..end];
            let after = &rest[end + 1..];
            return (Some(units), after.strip_prefix(' ').unwrap_or(after));
        }
    }
    (None, comment)
}

// ── Token grammar ──

fn is_integer_token(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// FITS real: `[sign] (digits [. [digits]] | . digits) [(E|D) [sign] digits]`.
fn is_float_token(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;
    let mut has_point = false;
    if i < bytes.len() && bytes[i] == b'.' {
        has_point = true;
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - frac_start;
    }
    if mantissa_digits == 0 {
        return false;
    }
    let mut has_exponent = false;
    if i < bytes.len() && matches!(bytes[i], b'E' | b'e' | b'D' | b'd') {
        has_exponent = true;
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len() && (has_point || has_exponent)
}

fn parse_integer(text: &str) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|_| Error::ValueRange(format!("integer {text} overflows 64 bits")))
}

fn parse_float(text: &str) -> Result<f64> {
    let normalized = text.replace(['D', 'd'], "E");
    let f = normalized
        .parse::<f64>()
        .map_err(|_| Error::ValueRange(format!("invalid real {text}")))?;
    if f.is_infinite() {
        return Err(Error::ValueRange(format!("real {text} overflows a double")));
    }
    Ok(f)
}

fn parse_real(text: &str) -> Result<Option<f64>> {
    if is_integer_token(text) {
        let n = parse_integer(text)?;
        return Ok(Some(n as f64));
    }
    if is_float_token(text) {
        return parse_float(text).map(Some);
    }
    Ok(None)
}

fn parse_complex(text: &str) -> Result<Option<Value>> {
    let inner = match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => inner,
        None => return Ok(None),
    };
    let (left, right) = match inner.split_once(',') {
        Some(parts) => parts,
        None => return Ok(None),
    };
    match (parse_real(left.trim())?, parse_real(right.trim())?) {
        (Some(re), Some(im)) => Ok(Some(Value::Complex(re, im))),
        _ => Ok(None),
    }
}

/// Decode an unquoted value token, trying logical, integer, float and complex
/// in that order.
///
/// Returns `Ok(None)` when no grammar matches, and [`Error::ValueRange`] when a
/// grammar matches but the number does not fit.
pub fn parse_token(token: &str) -> Result<Option<Value>> {
    let token = token.trim();
    match token {
        "T" => return Ok(Some(Value::Logical(true))),
        "F" => return Ok(Some(Value::Logical(false))),
        _ => {}
    }
    if is_integer_token(token) {
        return parse_integer(token).map(|n| Some(Value::Integer(n)));
    }
    if is_float_token(token) {
        return parse_float(token).map(|f| Some(Value::Float(f)));
    }
    if token.starts_with('(') {
        return parse_complex(token);
    }
    Ok(None)
}

// ── Number formatting ──

/// Format a float so that it parses back to the same bits and always reads
/// as a FITS real (it carries a `.` or an `E`).
pub fn format_float(f: f64) -> Result<String> {
    if !f.is_finite() {
        return Err(Error::ValueRange(format!(
            "{f} cannot be written to a FITS header"
        )));
    }
    let magnitude = libm::fabs(f);
    if magnitude == 0.0 || (1e-4..1e15).contains(&magnitude) {
        let mut s = format!("{f}");
        if !s.contains('.') {
            s.push_str(".0");
        }
        return Ok(s);
    }
    let s = format!("{f:E}");
    match s.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            Ok(format!("{mantissa}.0E{exponent}"))
        }
        _ => Ok(s),
    }
}

/// Displays the value as it reads in a value field, with strings quoted.
impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Float(x) if !x.is_finite() => write!(f, "{x}"),
            Value::Complex(re, im) if !(re.is_finite() && im.is_finite()) => {
                write!(f, "({re}, {im})")
            }
            other => f.write_str(&format_scalar(other).unwrap_or_default()),
        }
    }
}

/// Format a non-string value as the text of its value field.
///
/// Strings are quoted by the card formatter, and undefined values have no
/// text, so both yield an empty string here.
pub fn format_scalar(value: &Value) -> Result<String> {
    match value {
        Value::Logical(b) => Ok(String::from(if *b { "T" } else { "F" })),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(f) => format_float(*f),
        Value::Complex(re, im) => Ok(format!("({}, {})", format_float(*re)?, format_float(*im)?)),
        Value::String(_) | Value::Undefined => Ok(String::new()),
    }
}
