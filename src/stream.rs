//! The bidirectional bit/byte stream engine.
//!
//! A [`Stream`] pairs a byte [`Backend`] with a bit reservoir of up to 7
//! residual bits, so generated code can interleave unaligned bit-level
//! fields with byte-aligned integers, floats and byte arrays. The same
//! stream serves parsing and serialization; the write path reproduces a
//! parsed layout bit-for-bit.
//!
//! # Bit ordering
//!
//! Bit fields come in two directions: big-endian (consecutive bits taken
//! MSB-first) and little-endian (LSB-first). The direction used by the
//! last bit write is latched so a later flush orients the final partial
//! byte correctly.
//!
//! # Example
//!
//! ```
//! use oxibin_runtime::Stream;
//!
//! let mut s = Stream::from_bytes(vec![0b1011_0010, 0x12, 0x34]);
//! assert_eq!(s.read_bits_be(3).unwrap(), 0b101);
//! assert_eq!(s.read_bits_be(5).unwrap(), 0b10010);
//! assert_eq!(s.read_u2be().unwrap(), 0x1234);
//! assert!(s.is_eof());
//! ```

use crate::backend::{Backend, MemoryBackend};
use crate::error::{OxiBinError, Result};
use crate::mmap::MmapBackend;
use crate::writeback::WriteBackHandler;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;
use std::borrow::Cow;
use std::path::Path;

/// A bidirectional bit/byte stream over a byte backend.
///
/// All operations are synchronous and the stream is owned by one logical
/// parser at a time. Byte-aligned operations align first, so residual bits
/// never leak across an aligned boundary; mixing bit-level reads and
/// writes without an intervening align is a caller error.
#[derive(Debug)]
pub struct Stream {
    backend: Box<dyn Backend>,
    /// Residual bit reservoir; only the low `bits_left` bits are meaningful.
    bits: u64,
    /// Number of residual bits, always in `[0, 7]`.
    bits_left: u32,
    /// Direction of the last bit operation: false = big-endian bit order.
    bits_le: bool,
    /// Whether the reservoir holds pending write bits (vs. read bits).
    bits_write_mode: bool,
    pub(crate) write_back: Option<WriteBackHandler>,
    pub(crate) children: Vec<Stream>,
}

impl Stream {
    /// Create a stream over an existing backend.
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
            bits: 0,
            bits_left: 0,
            bits_le: false,
            bits_write_mode: false,
            write_back: None,
            children: Vec::new(),
        }
    }

    /// Open a file and map it as a read-only stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let backend = MmapBackend::open(path.as_ref())?;
        debug!(
            "opened {} as a {} byte mapped stream",
            path.as_ref().display(),
            backend.len()
        );
        Ok(Self::new(backend))
    }

    /// Create a stream over an in-memory byte buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(MemoryBackend::from_bytes(bytes))
    }

    /// Create a stream over a zero-filled buffer of `size` bytes.
    ///
    /// This is the usual serialization target once the total size of a
    /// structure has been computed.
    pub fn with_size(size: usize) -> Self {
        Self::new(MemoryBackend::with_size(size))
    }

    // ------------------------------------------------------------------
    // Introspection and positioning
    // ------------------------------------------------------------------

    /// Current byte position.
    ///
    /// In write mode a buffered partial byte has not reached the backend
    /// yet but logically occupies the next position, so it counts as one
    /// more byte. Generated code relies on this when computing write-back
    /// anchors before the final align.
    pub fn pos(&self) -> u64 {
        let partial = u64::from(self.bits_write_mode && self.bits_left > 0);
        self.backend.position() + partial
    }

    /// Total stream length in bytes.
    pub fn size(&self) -> u64 {
        self.backend.len()
    }

    /// Whether the stream is exhausted.
    ///
    /// Unconsumed residual read bits keep the stream non-EOF even when the
    /// backend cursor has reached the end.
    pub fn is_eof(&self) -> bool {
        self.backend.position() >= self.backend.len()
            && (self.bits_write_mode || self.bits_left == 0)
    }

    /// Move to an absolute byte position.
    ///
    /// Pending write bits are flushed (or residual read bits discarded)
    /// first, so the cursor never moves with a partial byte in flight.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.byte_align()?;
        self.backend.seek(pos)
    }

    // ------------------------------------------------------------------
    // Alignment
    // ------------------------------------------------------------------

    /// Discard residual read bits and return to a byte boundary.
    pub fn align_to_byte(&mut self) {
        self.bits = 0;
        self.bits_left = 0;
    }

    /// Flush pending write bits as one final byte.
    ///
    /// With big-endian bit order the residual bits occupy the high end of
    /// the emitted byte; with little-endian they stay in the low end.
    pub fn write_align_to_byte(&mut self) -> Result<()> {
        if self.bits_left > 0 {
            let byte = if self.bits_le {
                self.bits as u8
            } else {
                (self.bits << (8 - self.bits_left)) as u8
            };
            self.backend.write(&[byte])?;
            self.bits = 0;
            self.bits_left = 0;
        }
        Ok(())
    }

    /// Mode-appropriate align before any byte-aligned operation.
    fn byte_align(&mut self) -> Result<()> {
        if self.bits_write_mode {
            self.write_align_to_byte()
        } else {
            self.align_to_byte();
            Ok(())
        }
    }

    fn read_aligned(&mut self, n: usize) -> Result<Vec<u8>> {
        self.byte_align()?;
        self.backend.read_exact(n)
    }

    fn write_aligned(&mut self, data: &[u8]) -> Result<()> {
        self.byte_align()?;
        self.backend.write(data)
    }

    // ------------------------------------------------------------------
    // Integers and floats
    // ------------------------------------------------------------------

    /// Read an unsigned byte.
    pub fn read_u1(&mut self) -> Result<u8> {
        Ok(self.read_aligned(1)?[0])
    }

    /// Read a signed byte.
    pub fn read_s1(&mut self) -> Result<i8> {
        Ok(self.read_aligned(1)?[0] as i8)
    }

    /// Read a big-endian u16.
    pub fn read_u2be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(&self.read_aligned(2)?))
    }

    /// Read a little-endian u16.
    pub fn read_u2le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(&self.read_aligned(2)?))
    }

    /// Read a big-endian i16.
    pub fn read_s2be(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(&self.read_aligned(2)?))
    }

    /// Read a little-endian i16.
    pub fn read_s2le(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(&self.read_aligned(2)?))
    }

    /// Read a big-endian u32.
    pub fn read_u4be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(&self.read_aligned(4)?))
    }

    /// Read a little-endian u32.
    pub fn read_u4le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(&self.read_aligned(4)?))
    }

    /// Read a big-endian i32.
    pub fn read_s4be(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(&self.read_aligned(4)?))
    }

    /// Read a little-endian i32.
    pub fn read_s4le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(&self.read_aligned(4)?))
    }

    /// Read a big-endian u64.
    pub fn read_u8be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(&self.read_aligned(8)?))
    }

    /// Read a little-endian u64.
    pub fn read_u8le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(&self.read_aligned(8)?))
    }

    /// Read a big-endian i64.
    pub fn read_s8be(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(&self.read_aligned(8)?))
    }

    /// Read a little-endian i64.
    pub fn read_s8le(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(&self.read_aligned(8)?))
    }

    /// Read a big-endian f32.
    pub fn read_f4be(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(&self.read_aligned(4)?))
    }

    /// Read a little-endian f32.
    pub fn read_f4le(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(&self.read_aligned(4)?))
    }

    /// Read a big-endian f64.
    pub fn read_f8be(&mut self) -> Result<f64> {
        Ok(BigEndian::read_f64(&self.read_aligned(8)?))
    }

    /// Read a little-endian f64.
    pub fn read_f8le(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(&self.read_aligned(8)?))
    }

    /// Write an unsigned byte.
    pub fn write_u1(&mut self, v: u8) -> Result<()> {
        self.write_aligned(&[v])
    }

    /// Write a signed byte.
    pub fn write_s1(&mut self, v: i8) -> Result<()> {
        self.write_aligned(&[v as u8])
    }

    /// Write a big-endian u16.
    pub fn write_u2be(&mut self, v: u16) -> Result<()> {
        let mut buf = [0; 2];
        BigEndian::write_u16(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian u16.
    pub fn write_u2le(&mut self, v: u16) -> Result<()> {
        let mut buf = [0; 2];
        LittleEndian::write_u16(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian i16.
    pub fn write_s2be(&mut self, v: i16) -> Result<()> {
        let mut buf = [0; 2];
        BigEndian::write_i16(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian i16.
    pub fn write_s2le(&mut self, v: i16) -> Result<()> {
        let mut buf = [0; 2];
        LittleEndian::write_i16(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian u32.
    pub fn write_u4be(&mut self, v: u32) -> Result<()> {
        let mut buf = [0; 4];
        BigEndian::write_u32(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian u32.
    pub fn write_u4le(&mut self, v: u32) -> Result<()> {
        let mut buf = [0; 4];
        LittleEndian::write_u32(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian i32.
    pub fn write_s4be(&mut self, v: i32) -> Result<()> {
        let mut buf = [0; 4];
        BigEndian::write_i32(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian i32.
    pub fn write_s4le(&mut self, v: i32) -> Result<()> {
        let mut buf = [0; 4];
        LittleEndian::write_i32(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian u64.
    pub fn write_u8be(&mut self, v: u64) -> Result<()> {
        let mut buf = [0; 8];
        BigEndian::write_u64(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian u64.
    pub fn write_u8le(&mut self, v: u64) -> Result<()> {
        let mut buf = [0; 8];
        LittleEndian::write_u64(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian i64.
    pub fn write_s8be(&mut self, v: i64) -> Result<()> {
        let mut buf = [0; 8];
        BigEndian::write_i64(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian i64.
    pub fn write_s8le(&mut self, v: i64) -> Result<()> {
        let mut buf = [0; 8];
        LittleEndian::write_i64(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian f32.
    pub fn write_f4be(&mut self, v: f32) -> Result<()> {
        let mut buf = [0; 4];
        BigEndian::write_f32(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian f32.
    pub fn write_f4le(&mut self, v: f32) -> Result<()> {
        let mut buf = [0; 4];
        LittleEndian::write_f32(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a big-endian f64.
    pub fn write_f8be(&mut self, v: f64) -> Result<()> {
        let mut buf = [0; 8];
        BigEndian::write_f64(&mut buf, v);
        self.write_aligned(&buf)
    }

    /// Write a little-endian f64.
    pub fn write_f8le(&mut self, v: f64) -> Result<()> {
        let mut buf = [0; 8];
        LittleEndian::write_f64(&mut buf, v);
        self.write_aligned(&buf)
    }

    // ------------------------------------------------------------------
    // Unaligned bit values
    // ------------------------------------------------------------------

    fn check_bit_width(n: u32) -> Result<()> {
        if n > 64 {
            return Err(OxiBinError::invalid_argument(format!(
                "bit width {n} outside [0, 64]"
            )));
        }
        Ok(())
    }

    /// Read the next `n` bits in MSB-first order, `n` in `[0, 64]`.
    ///
    /// Residual bits left over from the previous bit read are consumed
    /// first; whole bytes are fetched from the backend only as needed.
    pub fn read_bits_be(&mut self, n: u32) -> Result<u64> {
        Self::check_bit_width(n)?;
        self.bits_write_mode = false;

        let bits_needed = i64::from(n) - i64::from(self.bits_left);
        self.bits_left = (-bits_needed).rem_euclid(8) as u32;

        let mut res;
        if bits_needed > 0 {
            let bytes_needed = ((bits_needed - 1) / 8 + 1) as usize;
            let buf = self.backend.read_exact(bytes_needed)?;
            let mut new_bits: u64 = 0;
            for &b in &buf {
                new_bits = (new_bits << 8) | u64::from(b);
            }
            res = new_bits >> self.bits_left;
            if bits_needed < 64 {
                res |= self.bits << bits_needed;
            }
            self.bits = new_bits;
        } else {
            res = self.bits >> (-bits_needed) as u32;
        }

        self.bits &= (1u64 << self.bits_left) - 1;
        Ok(res)
    }

    /// Read the next `n` bits in LSB-first order, `n` in `[0, 64]`.
    pub fn read_bits_le(&mut self, n: u32) -> Result<u64> {
        Self::check_bit_width(n)?;
        self.bits_write_mode = false;

        let bits_needed = i64::from(n) - i64::from(self.bits_left);
        let mut res;
        if bits_needed > 0 {
            let bytes_needed = ((bits_needed - 1) / 8 + 1) as usize;
            let buf = self.backend.read_exact(bytes_needed)?;
            let mut new_bits: u64 = 0;
            for (i, &b) in buf.iter().enumerate() {
                new_bits |= u64::from(b) << (8 * i);
            }
            res = (new_bits << self.bits_left) | self.bits;
            self.bits = if bits_needed < 64 {
                new_bits >> bits_needed
            } else {
                0
            };
        } else {
            res = self.bits;
            self.bits >>= n;
        }

        self.bits_left = (-bits_needed).rem_euclid(8) as u32;
        if n < 64 {
            res &= (1u64 << n) - 1;
        }
        Ok(res)
    }

    /// Write `n` bits of `val` in MSB-first order, `n` in `[0, 64]`.
    ///
    /// Full bytes are flushed to the backend as soon as the buffered bit
    /// count crosses a multiple of 8; at most 7 bits stay buffered.
    pub fn write_bits_be(&mut self, n: u32, val: u64) -> Result<()> {
        Self::check_bit_width(n)?;
        self.bits_le = false;
        self.bits_write_mode = true;

        let mut val = val;
        if n < 64 {
            val &= (1u64 << n) - 1;
        }

        let bits_to_write = self.bits_left + n;
        let bytes_to_write = (bits_to_write / 8) as usize;
        let old_bits = self.bits;
        self.bits_left = bits_to_write % 8;

        if bytes_to_write > 0 {
            // The low `bits_left` bits of `val` stay buffered; everything
            // above them, prefixed by the old residual, goes out now.
            self.bits = val & ((1u64 << self.bits_left) - 1);
            let shift = n - self.bits_left;
            let mut composite = val >> self.bits_left;
            if shift < 64 {
                composite |= old_bits << shift;
            }
            let mut buf = vec![0u8; bytes_to_write];
            for slot in buf.iter_mut().rev() {
                *slot = (composite & 0xff) as u8;
                composite >>= 8;
            }
            self.backend.write(&buf)?;
        } else {
            self.bits = (old_bits << n) | val;
        }
        Ok(())
    }

    /// Write `n` bits of `val` in LSB-first order, `n` in `[0, 64]`.
    pub fn write_bits_le(&mut self, n: u32, val: u64) -> Result<()> {
        Self::check_bit_width(n)?;
        self.bits_le = true;
        self.bits_write_mode = true;

        let mut val = val;
        if n < 64 {
            val &= (1u64 << n) - 1;
        }

        let bits_to_write = self.bits_left + n;
        let bytes_to_write = (bits_to_write / 8) as usize;
        let old_bits_left = self.bits_left;
        self.bits_left = bits_to_write % 8;

        if bytes_to_write > 0 {
            // The top `bits_left` bits of `val` become the new residual;
            // the rest lands below the old residual in stream order.
            let shift = n - self.bits_left;
            let new_bits = if shift < 64 { val >> shift } else { 0 };
            let mut composite = (val << old_bits_left) | self.bits;
            self.bits = new_bits;
            let mut buf = vec![0u8; bytes_to_write];
            for slot in buf.iter_mut() {
                *slot = (composite & 0xff) as u8;
                composite >>= 8;
            }
            self.backend.write(&buf)?;
        } else {
            self.bits |= val << old_bits_left;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Byte arrays
    // ------------------------------------------------------------------

    /// Read exactly `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if count > i32::MAX as usize {
            return Err(OxiBinError::out_of_range(count as u64, i32::MAX as u64));
        }
        self.read_aligned(count)
    }

    /// Read from the current position to the end of the stream.
    pub fn read_bytes_full(&mut self) -> Result<Vec<u8>> {
        self.byte_align()?;
        let remaining = self.backend.len().saturating_sub(self.backend.position());
        self.backend.read_exact(remaining as usize)
    }

    /// Read bytes until `term` is seen.
    ///
    /// The terminator is appended to the result only when `include_term`
    /// is set, and left unconsumed in the stream when `consume_term` is
    /// not. Hitting end-of-stream first is an error only when `eos_error`
    /// is set; otherwise the bytes read so far are returned.
    pub fn read_bytes_term(
        &mut self,
        term: u8,
        include_term: bool,
        consume_term: bool,
        eos_error: bool,
    ) -> Result<Vec<u8>> {
        self.byte_align()?;
        let mut out = Vec::new();
        loop {
            if self.backend.position() >= self.backend.len() {
                if eos_error {
                    return Err(OxiBinError::unexpected_eof(1, 0));
                }
                return Ok(out);
            }
            let byte = self.backend.read_exact(1)?[0];
            if byte == term {
                if include_term {
                    out.push(byte);
                }
                if !consume_term {
                    let pos = self.backend.position();
                    self.backend.seek(pos - 1)?;
                }
                return Ok(out);
            }
            out.push(byte);
        }
    }

    /// Read `expected.len()` bytes and require them to match `expected`.
    pub fn ensure_fixed_contents(&mut self, expected: &[u8]) -> Result<Vec<u8>> {
        let pos = self.pos();
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(OxiBinError::validation_not_equal(
                format!("{expected:02x?}"),
                format!("{actual:02x?}"),
                pos,
                "(fixed contents)",
            ));
        }
        Ok(actual)
    }

    /// Write a byte array as-is.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_aligned(bytes)
    }

    /// Write `bytes` into a field of exactly `size` bytes.
    ///
    /// Shorter content is followed by one `term` byte and then `pad`
    /// bytes up to `size`; content longer than `size` is an error; content
    /// of exactly `size` bytes is written with no terminator.
    pub fn write_bytes_limit(
        &mut self,
        bytes: &[u8],
        size: usize,
        term: u8,
        pad: u8,
    ) -> Result<()> {
        let n = bytes.len();
        if n > size {
            return Err(OxiBinError::invalid_argument(format!(
                "writing {n} bytes into a field of {size}"
            )));
        }
        self.write_aligned(bytes)?;
        if n < size {
            self.backend.write(&[term])?;
            if size - n > 1 {
                self.backend.write(&vec![pad; size - n - 1])?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Whole-stream access
    // ------------------------------------------------------------------

    /// The full stream contents as bytes.
    ///
    /// Backends with a contiguous in-memory buffer covering the whole
    /// stream are borrowed zero-copy; otherwise the position is saved, the
    /// stream is read end to end from zero, and the position restored.
    pub fn to_byte_array(&mut self) -> Result<Cow<'_, [u8]>> {
        self.byte_align()?;
        let total = self.backend.len();
        let direct = self
            .backend
            .as_contiguous()
            .is_some_and(|buf| buf.len() as u64 == total);
        if !direct {
            let saved = self.backend.position();
            self.backend.seek(0)?;
            let out = self.backend.read_exact(total as usize)?;
            self.backend.seek(saved)?;
            return Ok(Cow::Owned(out));
        }
        Ok(Cow::Borrowed(self.backend.as_contiguous().unwrap_or_default()))
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Best-effort flush of a pending partial write byte.
        if self.bits_write_mode && self.bits_left > 0 {
            let _ = self.write_align_to_byte();
        }
    }
}
