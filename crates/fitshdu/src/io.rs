//! The low-level FITS I/O collaborator.
//!
//! The header and HDU layers never touch bytes on disk directly. They drive a
//! [`FitsIo`] implementation one 80-byte record at a time, the way cfitsio's
//! `ffmahd`/`ffgrec`/`ffirec` family works. [`crate::memory::MemoryFits`] is
//! the implementation shipped with the crate.

use crate::card::Record;
use crate::error::Result;

/// HDU type reported by [`FitsIo::move_to_absolute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduTypeCode {
    /// Primary array or `XTENSION = 'IMAGE'`.
    Image,
    /// `XTENSION = 'TABLE'`.
    AsciiTable,
    /// `XTENSION = 'BINTABLE'`.
    BinaryTable,
    /// Any other extension type.
    Unknown,
}

/// Pixel element type, tagged with the cfitsio `*_IMG` codes.
///
/// The equivalent type of an image accounts for `BZERO`/`BSCALE`, so a
/// `BITPIX = 16` image with `BZERO = 32768` reports [`ElementType::U16`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    /// The cfitsio image type code (`BYTE_IMG` = 8, `SBYTE_IMG` = 10, ...).
    pub fn code(self) -> i64 {
        match self {
            ElementType::U8 => 8,
            ElementType::I8 => 10,
            ElementType::I16 => 16,
            ElementType::U16 => 20,
            ElementType::I32 => 32,
            ElementType::U32 => 40,
            ElementType::I64 => 64,
            ElementType::U64 => 80,
            ElementType::F32 => -32,
            ElementType::F64 => -64,
        }
    }

    /// Inverse of [`ElementType::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            8 => ElementType::U8,
            10 => ElementType::I8,
            16 => ElementType::I16,
            20 => ElementType::U16,
            32 => ElementType::I32,
            40 => ElementType::U32,
            64 => ElementType::I64,
            80 => ElementType::U64,
            -32 => ElementType::F32,
            -64 => ElementType::F64,
            _ => return None,
        })
    }

    /// Storage type for a raw `BITPIX` value, ignoring scaling.
    pub fn from_bitpix(bitpix: i64) -> Option<Self> {
        match bitpix {
            8 | 16 | 32 | 64 | -32 | -64 => Self::from_code(bitpix),
            _ => None,
        }
    }

    /// Equivalent type of a `BITPIX` array scaled by `bzero` and `bscale`.
    ///
    /// The unsigned and signed-byte offsets map to their integer types; any
    /// other scaling of an integer array promotes to a float type wide enough
    /// for the raw values.
    pub fn equivalent(bitpix: i64, bzero: f64, bscale: f64) -> Option<Self> {
        let raw = Self::from_bitpix(bitpix)?;
        if bitpix < 0 || (bzero == 0.0 && bscale == 1.0) {
            return Some(raw);
        }
        if bscale == 1.0 {
            let offset = match raw {
                ElementType::U8 if bzero == -128.0 => Some(ElementType::I8),
                ElementType::I16 if bzero == 32768.0 => Some(ElementType::U16),
                ElementType::I32 if bzero == 2147483648.0 => Some(ElementType::U32),
                ElementType::I64 if bzero == 9223372036854775808.0 => Some(ElementType::U64),
                _ => None,
            };
            if offset.is_some() {
                return offset;
            }
        }
        match raw {
            ElementType::U8 | ElementType::I16 => Some(ElementType::F32),
            _ => Some(ElementType::F64),
        }
    }
}

/// Record-level access to a FITS file, positioned on one HDU at a time.
///
/// Card positions are 1-based physical record positions within the current
/// header, excluding the END record. HDU positions are 1-based with the
/// primary HDU at 1.
pub trait FitsIo {
    /// Make HDU `pos` current and report its type.
    fn move_to_absolute(&mut self, pos: usize) -> Result<HduTypeCode>;

    /// Total number of HDUs in the file.
    fn num_hdus(&mut self) -> Result<usize>;

    /// `(existing, remaining)`: records in the current header and the number
    /// that can still be added without growing it by another block.
    fn header_space(&mut self) -> Result<(usize, usize)>;

    /// Read the record at `pos`.
    fn read_record(&mut self, pos: usize) -> Result<Record>;

    /// Append a record at the end of the current header.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Insert a record so it lands at `pos`, shifting later records down.
    /// `pos` may be one past the last record.
    fn insert_record(&mut self, pos: usize, record: &Record) -> Result<()>;

    /// Replace the first record whose keyword matches `name`, appending if
    /// there is none.
    fn update_record(&mut self, name: &str, record: &Record) -> Result<()>;

    /// Remove the record at `pos`.
    fn delete_record(&mut self, pos: usize) -> Result<()>;

    /// Remove the first record whose keyword matches `name`.
    fn delete_key(&mut self, name: &str) -> Result<()>;

    /// Equivalent element type of the current image HDU.
    fn image_equiv_type(&mut self) -> Result<ElementType>;

    /// Number of axes of the current image HDU.
    fn image_dim(&mut self) -> Result<usize>;

    /// Flush pending changes and release the file.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for code in [8, 10, 16, 20, 32, 40, 64, 80, -32, -64] {
            let t = ElementType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(ElementType::from_code(12).is_none());
    }

    #[test]
    fn bitpix_excludes_derived_codes() {
        assert_eq!(ElementType::from_bitpix(-32), Some(ElementType::F32));
        assert_eq!(ElementType::from_bitpix(20), None);
        assert_eq!(ElementType::from_bitpix(10), None);
    }

    #[test]
    fn equivalent_unscaled() {
        assert_eq!(ElementType::equivalent(16, 0.0, 1.0), Some(ElementType::I16));
        assert_eq!(ElementType::equivalent(-64, 5.0, 2.0), Some(ElementType::F64));
    }

    #[test]
    fn equivalent_unsigned_offsets() {
        assert_eq!(ElementType::equivalent(8, -128.0, 1.0), Some(ElementType::I8));
        assert_eq!(ElementType::equivalent(16, 32768.0, 1.0), Some(ElementType::U16));
        assert_eq!(
            ElementType::equivalent(32, 2147483648.0, 1.0),
            Some(ElementType::U32)
        );
        assert_eq!(
            ElementType::equivalent(64, 9223372036854775808.0, 1.0),
            Some(ElementType::U64)
        );
    }

    #[test]
    fn equivalent_scaled_promotes_to_float() {
        assert_eq!(ElementType::equivalent(16, 0.0, 0.5), Some(ElementType::F32));
        assert_eq!(ElementType::equivalent(8, 10.0, 1.0), Some(ElementType::F32));
        assert_eq!(ElementType::equivalent(32, 1.5, 1.0), Some(ElementType::F64));
    }

    #[test]
    fn equivalent_rejects_bad_bitpix() {
        assert_eq!(ElementType::equivalent(12, 0.0, 1.0), None);
    }
}
