//! Memory-mapped file backend.
//!
//! Streams opened from a path map the whole file read-only and serve reads
//! straight out of the mapping. The mapping doubles as the contiguous
//! buffer behind zero-copy [`Stream::to_byte_array`](crate::Stream::to_byte_array),
//! so converting a file-opened stream to bytes costs nothing.
//!
//! # Safety
//!
//! A mapped file must not be modified by another process while the mapping
//! is alive. The backend keeps the mapping read-only and holds the [`File`]
//! handle open for its whole lifetime to minimize the window for surprises.

use crate::backend::Backend;
use crate::error::{OxiBinError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A read-only, memory-mapped byte backend.
///
/// Serialization targets are memory- or file-backed; writing through this
/// backend fails with [`NotSupported`](OxiBinError::NotSupported).
#[derive(Debug)]
pub struct MmapBackend {
    mmap: Mmap,
    /// Keeps the mapped file open for the lifetime of the mapping.
    _file: File,
    pos: usize,
}

impl MmapBackend {
    /// Open the file at `path` and map it read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(file)
    }

    /// Map an already-open file read-only.
    pub fn from_file(file: File) -> Result<Self> {
        // SAFETY: the mapping is read-only and the file handle is held for
        // the mapping's lifetime; the caller must not let another process
        // modify the file while the backend exists.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            _file: file,
            pos: 0,
        })
    }

    /// The whole mapped file as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl Backend for MmapBackend {
    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        Ok(())
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let available = self.mmap.len().saturating_sub(self.pos);
        if n > available {
            return Err(OxiBinError::unexpected_eof(n, available));
        }
        let out = self.mmap[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Err(OxiBinError::not_supported(
            "writing to a memory-mapped stream",
        ))
    }

    fn as_contiguous(&self) -> Option<&[u8]> {
        Some(&self.mmap)
    }
}
