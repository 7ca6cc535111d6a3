use alloc::string::String;

/// All errors that can occur while decoding cards or navigating HDUs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A header record does not decode under any value grammar.
    #[error("malformed header card at byte {offset}: {reason}")]
    MalformedCard {
        /// Byte offset within the record (or CONTINUE chain) where decoding failed.
        offset: usize,
        /// Short description of the failure.
        reason: &'static str,
    },
    /// A card value was requested as an incompatible type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A numeric value overflows the target representation.
    #[error("value out of range: {0}")]
    ValueRange(String),
    /// A positional index is out of range, or a required card/HDU is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// The file handle an HDU is bound to has been closed.
    #[error("FITS file handle is closed")]
    ClosedResource,
    /// A keyword fails FITS name-grammar validation.
    #[error("invalid keyword name: {0:?}")]
    InvalidKeyword(String),
    /// Malformed FITS block structure.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// A write was attempted on a file opened read-only.
    #[error("file is opened read-only")]
    ReadOnly,
    /// An I/O error from the standard library.
    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    #[test]
    fn display_malformed_card() {
        let e = Error::MalformedCard {
            offset: 11,
            reason: "unterminated string",
        };
        assert_eq!(
            e.to_string(),
            "malformed header card at byte 11: unterminated string"
        );
    }

    #[test]
    fn display_type_mismatch() {
        let e = Error::TypeMismatch {
            expected: "INTEGER",
            found: "FLOAT",
        };
        assert_eq!(e.to_string(), "type mismatch: expected INTEGER, found FLOAT");
    }

    #[test]
    fn display_invalid_keyword() {
        let e = Error::InvalidKeyword("TOOLONGNAME".into());
        assert_eq!(e.to_string(), "invalid keyword name: \"TOOLONGNAME\"");
    }

    #[test]
    fn display_closed_resource() {
        assert_eq!(Error::ClosedResource.to_string(), "FITS file handle is closed");
    }

    #[test]
    fn display_not_found() {
        let e = Error::NotFound("card 12".into());
        assert_eq!(e.to_string(), "not found: card 12");
    }

    #[cfg(feature = "std")]
    #[test]
    fn io_error_from_conversion() {
        let io_err = std::io::Error::other("oops");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert_eq!(e.to_string(), "I/O error: oops");
    }

    #[cfg(feature = "std")]
    #[test]
    fn std_error_source() {
        use std::error::Error as StdError;

        assert!(Error::ClosedResource.source().is_none());
        let e = Error::Io(std::io::Error::other("inner"));
        assert!(e.source().is_some());
    }

    #[test]
    fn debug_formatting() {
        let e = Error::ValueRange("99999999999999999999".into());
        let debug = format!("{e:?}");
        assert!(debug.contains("ValueRange"));
    }
}
