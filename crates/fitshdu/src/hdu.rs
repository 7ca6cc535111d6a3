//! File handles and HDU views.
//!
//! A [`FitsFile`] owns the I/O collaborator and the current-HDU position
//! behind an `Arc<Mutex<..>>`. An [`Hdu`] is a lightweight view holding a
//! weak reference to that handle and its own 1-based number; every operation
//! on it takes the lock and re-seeks before touching the header. Once the
//! file is closed, or every `FitsFile` clone is dropped, HDU operations fail
//! with [`Error::ClosedResource`].

use alloc::format;
use alloc::string::String;
use alloc::sync::{Arc, Weak};

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{ElementType, FitsIo, HduTypeCode};
use crate::keyword::names_eq;
use crate::memory::MemoryFits;

/// What kind of data an HDU holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
    /// Primary array or image extension.
    Image {
        /// Equivalent element type (after BZERO/BSCALE).
        element: ElementType,
        /// Number of axes.
        rank: usize,
    },
    /// ASCII (`ascii = true`) or binary table.
    Table { ascii: bool },
    /// Any other extension.
    Any,
}

impl HduKind {
    /// The extension label: `IMAGE`, `TABLE`, `BINTABLE` or `ANY`.
    pub fn xtension(&self) -> &'static str {
        match self {
            HduKind::Image { .. } => "IMAGE",
            HduKind::Table { ascii: true } => "TABLE",
            HduKind::Table { ascii: false } => "BINTABLE",
            HduKind::Any => "ANY",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Handle<B> {
    backend: Option<B>,
    position: usize,
}

type Shared<B> = Arc<Mutex<Handle<B>>>;

fn lock<B>(shared: &Mutex<Handle<B>>) -> MutexGuard<'_, Handle<B>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Seek to `num` and classify it.
fn dispatch<B: FitsIo>(io: &mut B, num: usize) -> Result<HduKind> {
    Ok(match io.move_to_absolute(num)? {
        HduTypeCode::Image => HduKind::Image {
            element: io.image_equiv_type()?,
            rank: io.image_dim()?,
        },
        HduTypeCode::AsciiTable => HduKind::Table { ascii: true },
        HduTypeCode::BinaryTable => HduKind::Table { ascii: false },
        HduTypeCode::Unknown => HduKind::Any,
    })
}

/// An open FITS file. Clones share the same underlying handle.
#[derive(Debug)]
pub struct FitsFile<B = MemoryFits> {
    inner: Shared<B>,
}

impl<B> Clone for FitsFile<B> {
    fn clone(&self) -> Self {
        FitsFile {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A view on one HDU of an open [`FitsFile`].
#[derive(Debug)]
pub struct Hdu<B = MemoryFits> {
    file: Weak<Mutex<Handle<B>>>,
    num: usize,
    kind: HduKind,
}

impl<B> Clone for Hdu<B> {
    fn clone(&self) -> Self {
        Hdu {
            file: Weak::clone(&self.file),
            num: self.num,
            kind: self.kind,
        }
    }
}

impl<B: FitsIo> FitsFile<B> {
    /// Wrap a collaborator positioned on the primary HDU.
    pub fn new(backend: B) -> Self {
        FitsFile {
            inner: Arc::new(Mutex::new(Handle {
                backend: Some(backend),
                position: 1,
            })),
        }
    }

    fn with_handle<R>(&self, f: impl FnOnce(&mut B, &mut usize) -> Result<R>) -> Result<R> {
        let mut guard = lock(&self.inner);
        let Handle { backend, position } = &mut *guard;
        let backend = backend.as_mut().ok_or(Error::ClosedResource)?;
        f(backend, position)
    }

    /// Make HDU `num` (1-based) current and return a view on it.
    pub fn move_to(&self, num: usize) -> Result<Hdu<B>> {
        let kind = self.with_handle(|io, position| {
            let kind = dispatch(io, num)?;
            *position = num;
            Ok(kind)
        })?;
        debug!(hdu = num, ?kind, "moved to HDU");
        Ok(Hdu {
            file: Arc::downgrade(&self.inner),
            num,
            kind,
        })
    }

    /// The primary HDU.
    pub fn primary(&self) -> Result<Hdu<B>> {
        self.move_to(1)
    }

    /// The HDU the handle is currently positioned on.
    pub fn current(&self) -> Result<Hdu<B>> {
        let position = self.with_handle(|_, position| Ok(*position))?;
        self.move_to(position)
    }

    /// Number of HDUs in the file.
    pub fn num_hdus(&self) -> Result<usize> {
        self.with_handle(|io, _| io.num_hdus())
    }

    /// Views on every HDU, in file order.
    pub fn hdus(&self) -> Result<impl Iterator<Item = Result<Hdu<B>>> + '_> {
        let n = self.num_hdus()?;
        Ok((1..=n).map(move |num| self.move_to(num)))
    }

    /// First HDU whose extension label, `HDUNAME` or `EXTNAME` matches `name`.
    pub fn hdu_by_name(&self, name: &str) -> Result<Option<Hdu<B>>> {
        self.find_first(|hdu| hdu.has_name(name))
    }

    fn scan<I, F>(&self, nums: I, mut predicate: F) -> Result<Option<Hdu<B>>>
    where
        I: IntoIterator<Item = usize>,
        F: FnMut(&Hdu<B>) -> Result<bool>,
    {
        let original = self.with_handle(|_, position| Ok(*position))?;
        let mut found = Ok(None);
        for num in nums {
            found = self
                .move_to(num)
                .and_then(|hdu| Ok(predicate(&hdu)?.then_some(hdu)));
            if !matches!(found, Ok(None)) {
                break;
            }
        }
        if matches!(found, Ok(Some(_))) {
            return found;
        }
        // Put the cursor back whether the scan missed or failed.
        let restored = self.with_handle(|io, position| {
            io.move_to_absolute(original)?;
            *position = original;
            Ok(())
        });
        match found {
            Err(e) => Err(e),
            missed => restored.and(missed),
        }
    }

    /// Scan forward from the primary HDU.
    pub fn find_first<F>(&self, predicate: F) -> Result<Option<Hdu<B>>>
    where
        F: FnMut(&Hdu<B>) -> Result<bool>,
    {
        let n = self.num_hdus()?;
        self.scan(1..=n, predicate)
    }

    /// Scan backward from the last HDU.
    pub fn find_last<F>(&self, predicate: F) -> Result<Option<Hdu<B>>>
    where
        F: FnMut(&Hdu<B>) -> Result<bool>,
    {
        let n = self.num_hdus()?;
        self.scan((1..=n).rev(), predicate)
    }

    /// Scan forward from the HDU after the current one.
    pub fn find_next<F>(&self, predicate: F) -> Result<Option<Hdu<B>>>
    where
        F: FnMut(&Hdu<B>) -> Result<bool>,
    {
        let n = self.num_hdus()?;
        let current = self.with_handle(|_, position| Ok(*position))?;
        self.scan(current + 1..=n, predicate)
    }

    /// Scan backward from the HDU before the current one.
    pub fn find_previous<F>(&self, predicate: F) -> Result<Option<Hdu<B>>>
    where
        F: FnMut(&Hdu<B>) -> Result<bool>,
    {
        let current = self.with_handle(|_, position| Ok(*position))?;
        self.scan((1..current).rev(), predicate)
    }

    /// Flush and release the collaborator. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let backend = lock(&self.inner).backend.take();
        match backend {
            Some(mut io) => {
                debug!("closing FITS file");
                io.close()
            }
            None => Ok(()),
        }
    }

    /// Returns `true` once [`FitsFile::close`] has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner).backend.is_none()
    }
}

impl FitsFile<MemoryFits> {
    /// Open a file on disk read-only.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        MemoryFits::open(path).map(Self::new)
    }

    /// Open a file on disk for editing; changes are written on close.
    pub fn edit<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        MemoryFits::edit(path).map(Self::new)
    }
}

impl<B: FitsIo> Hdu<B> {
    /// Run `f` on the collaborator with this HDU current.
    pub(crate) fn with_io<R>(&self, f: impl FnOnce(&mut B) -> Result<R>) -> Result<R> {
        let shared = self.file.upgrade().ok_or(Error::ClosedResource)?;
        let mut guard = lock(&shared);
        let Handle { backend, position } = &mut *guard;
        let io = backend.as_mut().ok_or(Error::ClosedResource)?;
        io.move_to_absolute(self.num)?;
        *position = self.num;
        f(io)
    }

    /// 1-based HDU number.
    pub fn num(&self) -> usize {
        self.num
    }

    /// The kind determined when the view was created.
    pub fn kind(&self) -> HduKind {
        self.kind
    }

    /// The extension label of [`Hdu::kind`].
    pub fn xtension(&self) -> &'static str {
        self.kind.xtension()
    }

    /// Returns `true` if the owning file has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        match self.file.upgrade() {
            Some(shared) => lock(&shared).backend.is_none(),
            None => true,
        }
    }

    fn string_key(&self, name: &str) -> Result<Option<String>> {
        match self.card(name)? {
            Some(card) => match card.value.as_ref().map(|v| v.as_str()) {
                Some(Ok(s)) => Ok(Some(String::from(s.trim_end()))),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// The `EXTNAME` string, if present.
    pub fn extname(&self) -> Result<Option<String>> {
        self.string_key("EXTNAME")
    }

    /// The `HDUNAME` string, if present.
    pub fn hduname(&self) -> Result<Option<String>> {
        self.string_key("HDUNAME")
    }

    /// Returns `true` if `name` matches the extension label, `HDUNAME` or
    /// `EXTNAME`, compared case-insensitively and ignoring trailing spaces.
    pub fn has_name(&self, name: &str) -> Result<bool> {
        if names_eq(self.xtension(), name) {
            return Ok(true);
        }
        if let Some(hduname) = self.hduname()? {
            if names_eq(&hduname, name) {
                return Ok(true);
            }
        }
        Ok(self
            .extname()?
            .map(|extname| names_eq(&extname, name))
            .unwrap_or(false))
    }

    /// A short description: number, label and name.
    pub fn describe(&self) -> Result<String> {
        let name = self.extname()?.or(self.hduname()?);
        Ok(match (self.kind, name) {
            (HduKind::Image { element, rank }, Some(name)) => {
                format!("{} IMAGE {name} ({element:?}, {rank} axes)", self.num)
            }
            (HduKind::Image { element, rank }, None) => {
                format!("{} IMAGE ({element:?}, {rank} axes)", self.num)
            }
            (kind, Some(name)) => format!("{} {} {name}", self.num, kind.xtension()),
            (kind, None) => format!("{} {}", self.num, kind.xtension()),
        })
    }
}
