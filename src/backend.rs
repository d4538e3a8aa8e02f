//! Byte backends: seekable, random-access byte containers behind a stream.
//!
//! A [`Backend`] is byte-atomic: it knows nothing about bit-level state.
//! The stream layer above it owns the bit reservoir and decides when a
//! backend operation may happen. Two backends live here: [`MemoryBackend`]
//! over a growable in-memory buffer, and [`FileBackend`] over a plain file
//! handle. The memory-mapped variant is in [`crate::mmap`].

use crate::error::{OxiBinError, Result};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A seekable, random-access byte container.
///
/// Positions are absolute byte offsets from the start of the container.
/// Seeking past the end is allowed (consistent with [`std::io::Cursor`]);
/// reads at or past the end fail with
/// [`UnexpectedEof`](OxiBinError::UnexpectedEof).
pub trait Backend: fmt::Debug {
    /// Current cursor position.
    fn position(&self) -> u64;

    /// Total length of the container in bytes.
    fn len(&self) -> u64;

    /// Move the cursor to an absolute position.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Read exactly `n` bytes at the cursor, advancing it.
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>>;

    /// Write all of `data` at the cursor, advancing it and growing the
    /// container if the write runs past the current end.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Expose the underlying buffer when the backend holds its bytes
    /// contiguously in memory. Backends without such a buffer return `None`
    /// and callers fall back to seek-and-read.
    fn as_contiguous(&self) -> Option<&[u8]> {
        None
    }

    /// Whether the container is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory byte backend over a growable buffer.
///
/// Reads and writes share one cursor. Writes overwrite in place and extend
/// the buffer when they run past the end, so the same backend serves both
/// fixed-size serialization targets (see [`MemoryBackend::with_size`]) and
/// open-ended ones.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    buf: Vec<u8>,
    pos: usize,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend over existing bytes, cursor at the start.
    pub fn from_bytes(buf: impl Into<Vec<u8>>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
        }
    }

    /// Create a zero-filled backend of `size` bytes, cursor at the start.
    ///
    /// This is the usual shape of a serialization target whose total size
    /// was computed up front.
    pub fn with_size(size: usize) -> Self {
        Self {
            buf: vec![0; size],
            pos: 0,
        }
    }

    /// Consume the backend and return its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Backend for MemoryBackend {
    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        Ok(())
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let available = self.buf.len().saturating_sub(self.pos);
        if n > available {
            return Err(OxiBinError::unexpected_eof(n, available));
        }
        let out = self.buf[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(&self.buf)
    }
}

/// A byte backend over a plain [`File`] handle.
///
/// Unlike [`MemoryBackend`] and [`crate::mmap::MmapBackend`], this backend
/// has no contiguous in-memory buffer, so stream conversion to a byte array
/// takes the seek-and-read path.
#[derive(Debug)]
pub struct FileBackend {
    file: File,
    pos: u64,
    len: u64,
}

impl FileBackend {
    /// Create (or truncate) a read-write file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self {
            file,
            pos: 0,
            len: 0,
        })
    }

    /// Wrap an already-open file, rewinding it to the start.
    pub fn from_file(mut file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        Ok(Self { file, pos: 0, len })
    }
}

impl Backend for FileBackend {
    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let available = self.len.saturating_sub(self.pos) as usize;
        if n > available {
            return Err(OxiBinError::unexpected_eof(n, available));
        }
        let mut out = vec![0; n];
        self.file.read_exact(&mut out)?;
        self.pos += n as u64;
        Ok(out)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.pos += data.len() as u64;
        self.len = self.len.max(self.pos);
        Ok(())
    }
}
