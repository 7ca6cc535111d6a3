//! In-memory FITS container implementing [`FitsIo`].
//!
//! The whole file is held as a list of HDUs, each a vector of header records
//! (END excluded) and its raw data bytes. [`MemoryFits::to_bytes`] lays them
//! back out in 2880-byte blocks.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

#[cfg(feature = "std")]
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::block::{
    header_blocks, padded_byte_len, write_data_blocks, write_header_blocks, BLOCK_SIZE, CARD_SIZE,
    CARDS_PER_BLOCK,
};
use crate::card::{
    format_card, format_end_card, parse_record, record_keyword, Card, FormatOptions, Record,
};
use crate::error::{Error, Result};
use crate::io::{ElementType, FitsIo, HduTypeCode};
use crate::keyword::names_eq;
use crate::layout;

const END_RECORD: &[u8; 8] = b"END     ";

/// Whether a container accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpenMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone)]
struct HduBuffer {
    records: Vec<Record>,
    data: Vec<u8>,
}

impl HduBuffer {
    /// Cards decoded one record at a time. Structural keywords never span
    /// CONTINUE records, and undecodable records are skipped.
    fn cards(&self) -> Vec<Card> {
        self.records
            .iter()
            .filter_map(|r| parse_record(r).ok())
            .collect()
    }

    /// HDU type, read from the first record only.
    fn type_code(&self) -> HduTypeCode {
        let first: Vec<Card> = self
            .records
            .first()
            .and_then(|r| parse_record(r).ok())
            .into_iter()
            .collect();
        layout::type_code(&first)
    }
}

/// An in-memory FITS file.
#[derive(Debug)]
pub struct MemoryFits {
    hdus: Vec<HduBuffer>,
    current: usize,
    mode: FileOpenMode,
    dirty: bool,
    #[cfg(feature = "std")]
    path: Option<PathBuf>,
}

/// Builder returned by [`MemoryFits::create`].
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct NewFitsFile {
    path: PathBuf,
    overwrite: bool,
}

fn format_cards(cards: &[Card]) -> Result<Vec<Record>> {
    let options = FormatOptions::default();
    let mut records = Vec::with_capacity(cards.len());
    for card in cards {
        records.extend(format_card(card, &options)?);
    }
    Ok(records)
}

/// Split one HDU off the front of `data`: its records and total header
/// length in bytes (whole blocks).
fn read_header(data: &[u8]) -> Result<(Vec<Record>, usize)> {
    let mut records = Vec::new();
    for chunk in data.chunks_exact(CARD_SIZE) {
        if &chunk[..8] == END_RECORD {
            let len = header_blocks(records.len()) * BLOCK_SIZE;
            return Ok((records, len));
        }
        let mut record = [b' '; CARD_SIZE];
        record.copy_from_slice(chunk);
        records.push(record);
    }
    Err(Error::InvalidHeader("missing END card"))
}

impl MemoryFits {
    fn from_hdus(hdus: Vec<HduBuffer>, mode: FileOpenMode) -> Self {
        MemoryFits {
            hdus,
            current: 0,
            mode,
            dirty: false,
            #[cfg(feature = "std")]
            path: None,
        }
    }

    /// A writable container holding an empty primary HDU.
    pub fn new() -> Result<Self> {
        let records = format_cards(&layout::primary_cards(8, &[])?)?;
        Ok(Self::from_hdus(
            vec![HduBuffer {
                records,
                data: Vec::new(),
            }],
            FileOpenMode::ReadWrite,
        ))
    }

    /// Parse a complete FITS byte stream. The result is writable.
    ///
    /// Missing padding after the last data segment is tolerated, as is
    /// trailing garbage after at least one good HDU.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < BLOCK_SIZE {
            return Err(Error::UnexpectedEof);
        }
        let mut hdus = Vec::new();
        let mut offset = 0;

        while data.len() - offset >= BLOCK_SIZE {
            let remaining = &data[offset..];
            let (records, header_len) = match read_header(remaining) {
                Ok(parts) => parts,
                Err(e) if hdus.is_empty() => return Err(e),
                Err(_) => {
                    warn!(offset, "ignoring trailing bytes without a FITS header");
                    break;
                }
            };
            let buffer = HduBuffer {
                records,
                data: Vec::new(),
            };
            let cards = buffer.cards();
            if hdus.is_empty() && !layout::is_primary(&cards) {
                return Err(Error::InvalidHeader("first HDU must be primary"));
            }
            let data_len = match layout::data_byte_len(&cards) {
                Ok(len) => len,
                Err(e) if hdus.is_empty() => return Err(e),
                Err(e) => {
                    warn!(offset, error = %e, "stopping at HDU with unreadable structure");
                    break;
                }
            };
            let data_start = offset + header_len.min(remaining.len());
            let data_end = data_start
                .checked_add(data_len)
                .filter(|&end| end <= data.len())
                .ok_or(Error::UnexpectedEof)?;
            hdus.push(HduBuffer {
                data: data[data_start..data_end].to_vec(),
                ..buffer
            });
            offset = data_start
                .saturating_add(padded_byte_len(data_len))
                .min(data.len());
        }

        debug!(hdus = hdus.len(), bytes = data.len(), "parsed FITS stream");
        Ok(Self::from_hdus(hdus, FileOpenMode::ReadWrite))
    }

    /// Serialize every HDU in block layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let end = format_end_card();
        let mut out = Vec::new();
        for hdu in &self.hdus {
            write_header_blocks(&mut out, &hdu.records, &end);
            write_data_blocks(&mut out, &hdu.data);
        }
        out
    }

    /// Append an HDU built from `cards` with a zero-filled data segment.
    ///
    /// `data_len` must match the size the structural keywords describe.
    /// Returns the 1-based number of the new HDU.
    pub fn append_hdu(&mut self, cards: &[Card], data_len: usize) -> Result<usize> {
        self.check_writable()?;
        if layout::is_primary(cards) || layout::xtension(cards).is_none() {
            return Err(Error::InvalidHeader("extension must start with XTENSION"));
        }
        let expected = layout::data_byte_len(cards)?;
        if expected != data_len {
            return Err(Error::ValueRange(format!(
                "data length {data_len} does not match header ({expected} bytes)"
            )));
        }
        let records = format_cards(cards)?;
        self.hdus.push(HduBuffer {
            records,
            data: vec![0; data_len],
        });
        self.dirty = true;
        debug!(hdu = self.hdus.len(), data_len, "appended HDU");
        Ok(self.hdus.len())
    }

    /// Access mode.
    pub fn mode(&self) -> FileOpenMode {
        self.mode
    }

    /// 1-based number of the current HDU.
    pub fn current_hdu(&self) -> usize {
        self.current + 1
    }

    fn check_writable(&self) -> Result<()> {
        match self.mode {
            FileOpenMode::ReadWrite => Ok(()),
            FileOpenMode::ReadOnly => Err(Error::ReadOnly),
        }
    }

    fn hdu(&self) -> &HduBuffer {
        &self.hdus[self.current]
    }

    fn hdu_mut(&mut self) -> &mut HduBuffer {
        self.dirty = true;
        &mut self.hdus[self.current]
    }

    fn index_of(&self, pos: usize) -> Result<usize> {
        if pos == 0 || pos > self.hdu().records.len() {
            return Err(Error::NotFound(format!("card {pos}")));
        }
        Ok(pos - 1)
    }

    fn find_key(&self, name: &str) -> Option<usize> {
        self.hdu()
            .records
            .iter()
            .position(|r| names_eq(record_keyword(r), name))
    }

    fn image_cards(&self) -> Result<Vec<Card>> {
        let cards = self.hdu().cards();
        if layout::type_code(&cards) != HduTypeCode::Image {
            return Err(Error::InvalidHeader("current HDU is not an image"));
        }
        Ok(cards)
    }
}

#[cfg(feature = "std")]
impl MemoryFits {
    fn load(path: &Path, mode: FileOpenMode) -> Result<Self> {
        let data = std::fs::read(path)?;
        let mut fits = Self::from_bytes(&data)?;
        fits.mode = mode;
        fits.path = Some(path.to_path_buf());
        debug!(path = %path.display(), ?mode, hdus = fits.hdus.len(), "opened FITS file");
        Ok(fits)
    }

    /// Open an existing file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref(), FileOpenMode::ReadOnly)
    }

    /// Open an existing file for editing. Changes are written back on
    /// [`FitsIo::close`], [`MemoryFits::flush`] or drop.
    pub fn edit<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref(), FileOpenMode::ReadWrite)
    }

    /// Start creating a new file holding an empty primary HDU.
    pub fn create<P: AsRef<Path>>(path: P) -> NewFitsFile {
        NewFitsFile {
            path: path.as_ref().to_path_buf(),
            overwrite: false,
        }
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write pending changes to the backing file.
    pub fn flush(&mut self) -> Result<()> {
        if let (FileOpenMode::ReadWrite, true, Some(path)) = (self.mode, self.dirty, &self.path) {
            std::fs::write(path, self.to_bytes())?;
            debug!(path = %path.display(), "flushed FITS file");
        }
        self.dirty = false;
        Ok(())
    }
}

#[cfg(feature = "std")]
impl NewFitsFile {
    /// Replace the file if it already exists.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Write the empty primary HDU and return the open container.
    pub fn open(self) -> Result<MemoryFits> {
        if !self.overwrite && self.path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("file already exists: {}", self.path.display()),
            )));
        }
        let mut fits = MemoryFits::new()?;
        std::fs::write(&self.path, fits.to_bytes())?;
        debug!(path = %self.path.display(), "created FITS file");
        fits.path = Some(self.path);
        Ok(fits)
    }
}

#[cfg(feature = "std")]
impl Drop for MemoryFits {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to write FITS file on drop");
        }
    }
}

impl FitsIo for MemoryFits {
    fn move_to_absolute(&mut self, pos: usize) -> Result<HduTypeCode> {
        if pos == 0 || pos > self.hdus.len() {
            return Err(Error::NotFound(format!("HDU {pos}")));
        }
        self.current = pos - 1;
        Ok(self.hdu().type_code())
    }

    fn num_hdus(&mut self) -> Result<usize> {
        Ok(self.hdus.len())
    }

    fn header_space(&mut self) -> Result<(usize, usize)> {
        let existing = self.hdu().records.len();
        let capacity = header_blocks(existing) * CARDS_PER_BLOCK;
        Ok((existing, capacity - existing - 1))
    }

    fn read_record(&mut self, pos: usize) -> Result<Record> {
        let index = self.index_of(pos)?;
        Ok(self.hdu().records[index])
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        self.check_writable()?;
        self.hdu_mut().records.push(*record);
        Ok(())
    }

    fn insert_record(&mut self, pos: usize, record: &Record) -> Result<()> {
        self.check_writable()?;
        if pos == 0 || pos > self.hdu().records.len() + 1 {
            return Err(Error::NotFound(format!("card {pos}")));
        }
        self.hdu_mut().records.insert(pos - 1, *record);
        Ok(())
    }

    fn update_record(&mut self, name: &str, record: &Record) -> Result<()> {
        self.check_writable()?;
        match self.find_key(name) {
            Some(index) => self.hdu_mut().records[index] = *record,
            None => self.hdu_mut().records.push(*record),
        }
        Ok(())
    }

    fn delete_record(&mut self, pos: usize) -> Result<()> {
        self.check_writable()?;
        let index = self.index_of(pos)?;
        self.hdu_mut().records.remove(index);
        Ok(())
    }

    fn delete_key(&mut self, name: &str) -> Result<()> {
        self.check_writable()?;
        let index = self
            .find_key(name)
            .ok_or_else(|| Error::NotFound(format!("keyword {}", name.trim_end())))?;
        self.hdu_mut().records.remove(index);
        Ok(())
    }

    fn image_equiv_type(&mut self) -> Result<ElementType> {
        let (bitpix, bzero, bscale) = layout::scaling(&self.image_cards()?)?;
        ElementType::equivalent(bitpix, bzero, bscale).ok_or(Error::InvalidHeader("BITPIX"))
    }

    fn image_dim(&mut self) -> Result<usize> {
        Ok(layout::axes(&self.image_cards()?)?.len())
    }

    fn close(&mut self) -> Result<()> {
        #[cfg(feature = "std")]
        self.flush()?;
        Ok(())
    }
}
