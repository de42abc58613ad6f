//! Random-access byte sources.
//!
//! [`RandomAccessSource`] puts an open file and an in-memory buffer behind one
//! cursor interface with a single byte of pushback. A source may cover only a
//! sub-range of its backing data (an embedded font program, a stream body);
//! every position it reports is relative to that range's start.
//!
//! Reading past the end yields `None` rather than an error. Only
//! [`read_fully`](RandomAccessSource::read_fully) fails on short input.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const FILE_BUFFER_SIZE: usize = 8192;

/// Storage behind a [`RandomAccessSource`]. Offsets are absolute.
trait ByteBackend {
    /// Read up to `buf.len()` bytes at absolute offset `pos`.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize>;
    /// Total length of the backing data.
    fn len(&self) -> u64;
    /// Release OS resources. Later reads reopen transparently.
    fn close(&mut self);
    /// Reacquire OS resources released by `close`.
    fn reopen(&mut self) -> io::Result<()>;
    /// True unless `close` was called without a subsequent reopen.
    fn is_open(&self) -> bool;
}

/// File-backed storage.
struct FileBackend {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    /// Absolute offset the reader is positioned at
    reader_pos: u64,
    len: u64,
}

impl FileBackend {
    fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(BufReader::with_capacity(FILE_BUFFER_SIZE, file)),
            reader_pos: 0,
            len,
        })
    }
}

impl ByteBackend for FileBackend {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        if self.reader.is_none() {
            self.reopen()?;
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };
        if pos != self.reader_pos {
            reader.seek(SeekFrom::Start(pos))?;
            self.reader_pos = pos;
        }
        let n = reader.read(buf)?;
        self.reader_pos += n as u64;
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn reopen(&mut self) -> io::Result<()> {
        if self.reader.is_none() {
            log::debug!("Reopening {}", self.path.display());
            let file = File::open(&self.path)?;
            self.len = file.metadata()?.len();
            self.reader = Some(BufReader::with_capacity(FILE_BUFFER_SIZE, file));
            self.reader_pos = 0;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

/// Memory-backed storage using `bytes::Bytes`.
struct MemoryBackend {
    data: Bytes,
    open: bool,
}

impl ByteBackend for MemoryBackend {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.open = true;
        let Ok(start) = usize::try_from(pos) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let remaining = &self.data[start..];
        let to_read = buf.len().min(remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        Ok(to_read)
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Seekable byte cursor over a file or a memory buffer.
pub struct RandomAccessSource {
    backend: Box<dyn ByteBackend>,
    /// Absolute offset of relative position 0
    start_offset: u64,
    /// Length of the visible range, `None` for "to the end of the backing data"
    limit: Option<u64>,
    /// Relative position of the underlying cursor
    position: u64,
    /// Relative position set by the last explicit `seek`
    seek_position: u64,
    pushback: Option<u8>,
}

impl RandomAccessSource {
    /// Open a file-backed source.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_range(path, 0, None)
    }

    /// Open a file-backed source covering `length` bytes (or the rest of the
    /// file) starting at `start_offset`.
    pub fn open_range(
        path: impl AsRef<Path>,
        start_offset: u64,
        length: Option<u64>,
    ) -> Result<Self> {
        let backend = FileBackend::open(path.as_ref())?;
        Ok(Self::with_backend(Box::new(backend), start_offset, length))
    }

    /// Create a memory-backed source.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::from_bytes_range(data, 0, None)
    }

    /// Create a memory-backed source over a sub-range of `data`.
    pub fn from_bytes_range(data: impl Into<Bytes>, start_offset: u64, length: Option<u64>) -> Self {
        let backend = MemoryBackend {
            data: data.into(),
            open: true,
        };
        Self::with_backend(Box::new(backend), start_offset, length)
    }

    fn with_backend(backend: Box<dyn ByteBackend>, start_offset: u64, limit: Option<u64>) -> Self {
        Self {
            backend,
            start_offset,
            limit,
            position: 0,
            seek_position: 0,
            pushback: None,
        }
    }

    /// Offset of this source's range within the backing data.
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Length of the visible range.
    pub fn length(&self) -> u64 {
        let available = self.backend.len().saturating_sub(self.start_offset);
        match self.limit {
            Some(limit) => limit.min(available),
            None => available,
        }
    }

    /// Current position, accounting for a pushed-back byte.
    pub fn tell(&self) -> u64 {
        if self.pushback.is_some() {
            self.position.saturating_sub(1)
        } else {
            self.position
        }
    }

    /// Move the cursor to `pos` (relative). Clears any pushed-back byte.
    ///
    /// Seeking past the end is allowed; subsequent reads report end of data.
    pub fn seek(&mut self, pos: u64) {
        self.pushback = None;
        self.position = pos;
        self.seek_position = pos;
    }

    /// Read one byte, or `None` at end of data.
    pub fn read(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        let mut byte = [0u8; 1];
        match self.read_backend(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read up to `buf.len()` bytes. Returns `None` at end of data.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let mut filled = 0;
        if let Some(b) = self.pushback.take() {
            buf[0] = b;
            filled = 1;
        }
        while filled < buf.len() {
            let n = self.read_backend(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            Ok(None)
        } else {
            Ok(Some(filled))
        }
    }

    /// Fill `buf` completely or fail with `Error::TruncatedInput`.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let available = self.read_into(buf)?.unwrap_or(0);
        if available < buf.len() {
            return Err(Error::TruncatedInput {
                expected: buf.len(),
                available,
            });
        }
        Ok(())
    }

    /// Read everything from the cursor to the end of the range.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let remaining = self.length().saturating_sub(self.tell()) as usize;
        let mut out = vec![0u8; remaining];
        let n = self.read_into(&mut out)?.unwrap_or(0);
        out.truncate(n);
        Ok(out)
    }

    /// Push one byte back so the next `read` returns it.
    ///
    /// Only one byte is held; pushing again replaces the held byte.
    pub fn push_back(&mut self, byte: u8) {
        if let Some(previous) = self.pushback.replace(byte) {
            log::warn!(
                "Pushback slot already held 0x{:02x}, replaced with 0x{:02x}",
                previous,
                byte
            );
        }
    }

    /// Release the underlying file handle. Clears any pushed-back byte.
    pub fn close(&mut self) {
        self.pushback = None;
        self.backend.close();
    }

    /// Reopen after `close`, restoring the position of the last explicit seek.
    pub fn reopen(&mut self) -> Result<()> {
        if !self.backend.is_open() {
            self.backend.reopen()?;
            self.position = self.seek_position;
        }
        Ok(())
    }

    /// True unless the source has been closed.
    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    fn read_backend(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reopen()?;
        let length = self.length();
        if self.position >= length {
            return Ok(0);
        }
        let max = (length - self.position).min(buf.len() as u64) as usize;
        let n = self
            .backend
            .read_at(self.start_offset + self.position, &mut buf[..max])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Read for RandomAccessSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_into(buf) {
            Ok(n) => Ok(n.unwrap_or(0)),
            Err(Error::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

impl std::fmt::Debug for RandomAccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessSource")
            .field("start_offset", &self.start_offset)
            .field("length", &self.length())
            .field("position", &self.tell())
            .field("open", &self.is_open())
            .finish()
    }
}
