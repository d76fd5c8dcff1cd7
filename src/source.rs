//! Random-access byte sources and lazily sliced views over them.
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::{ErrorKind, Result};

/// A random-access provider of bytes.
///
/// Implementations may block (e.g., network or disk reads) in `read_range`.
pub trait ByteSource: fmt::Debug + Send + Sync {
    /// Returns the total size of the source in bytes.
    fn len(&self) -> u64;

    /// Reads the bytes in `start..end`.
    ///
    /// Callers guarantee that `start <= end <= self.len()`.
    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Returns `true` if the source has no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }
    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        track_assert!(
            start <= end && end <= ByteSource::len(self),
            ErrorKind::InvalidInput
        );
        Ok(self[start as usize..end as usize].to_vec())
    }
}

/// A file read through positioned reads.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}
impl FileSource {
    /// Opens the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = track_io!(File::open(path))?;
        Self::from_file(file)
    }

    /// Makes a new `FileSource` from an opened file.
    pub fn from_file(file: File) -> Result<Self> {
        let len = track_io!(file.metadata())?.len();
        Ok(FileSource {
            file: Mutex::new(file),
            len,
        })
    }
}
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }
    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        track_assert!(start <= end && end <= self.len, ErrorKind::InvalidInput);
        let mut buf = vec![0; (end - start) as usize];
        let mut file = self.file.lock();
        track_io!(file.seek(SeekFrom::Start(start)))?;
        track_io!(file.read_exact(&mut buf))?;
        Ok(buf)
    }
}

/// A window over a shared `ByteSource`.
///
/// Slicing is lazy and never reads. Slicing a slice narrows the same window over the root source,
/// so nested slices do not stack up.
#[derive(Clone)]
pub struct ByteRange {
    source: Arc<dyn ByteSource>,
    start: u64,
    end: u64,
}
impl ByteRange {
    /// Makes a new `ByteRange` covering all of `source`.
    pub fn new<S: ByteSource + 'static>(source: S) -> Self {
        Self::from_shared(Arc::new(source))
    }

    /// Makes a new `ByteRange` covering all of an already shared source.
    pub fn from_shared(source: Arc<dyn ByteSource>) -> Self {
        let end = source.len();
        ByteRange {
            source,
            start: 0,
            end,
        }
    }

    /// Makes a new in-memory `ByteRange`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }

    /// Returns the size of the window.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the offset of the window within the root source.
    pub fn offset(&self) -> u64 {
        self.start
    }

    /// Returns the window `start..end` relative to this one.
    pub fn slice(&self, start: u64, end: u64) -> Result<Self> {
        track_assert!(
            start <= end && end <= self.len(),
            ErrorKind::InvalidInput,
            "Out of range: {}..{} (len={})",
            start,
            end,
            self.len()
        );
        Ok(ByteRange {
            source: Arc::clone(&self.source),
            start: self.start + start,
            end: self.start + end,
        })
    }

    /// Returns the window from `start` to the end of this one.
    pub fn slice_from(&self, start: u64) -> Result<Self> {
        track!(self.slice(start, self.len()))
    }

    /// Reads the bytes of the window.
    pub fn read(&self) -> Result<Vec<u8>> {
        track!(self.source.read_range(self.start, self.end))
    }

    /// Reads at most `len` bytes from the head of the window.
    pub fn read_head(&self, len: u64) -> Result<Vec<u8>> {
        track!(self.source.read_range(self.start, self.end.min(self.start + len)))
    }
}
impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteRange({}..{})", self.start, self.end)
    }
}
