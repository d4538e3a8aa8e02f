//! Byte-array processors applied to raw field contents.
//!
//! Format descriptions can declare that a field's bytes are obfuscated or
//! compressed; generated code reads the raw bytes and pipes them through
//! one of these processors (and through the matching un-processor on the
//! write path).
//!
//! The zlib pair frames RFC 1950 containers by hand: a 2-byte header (CMF,
//! FLG), an optional 4-byte dictionary id, a raw DEFLATE body, and a 4-byte
//! big-endian Adler-32 footer over the uncompressed data.

use crate::error::{OxiBinError, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::trace;
use std::io::{Read, Write};

/// CMF byte emitted on compression: method 8 (DEFLATE), 32 KiB window.
const ZLIB_CMF: u8 = 0x78;
/// FLG byte emitted on compression: best-compression level, no dictionary,
/// FCHECK chosen so `(CMF * 256 + FLG) % 31 == 0`.
const ZLIB_FLG: u8 = 0xDA;

/// Size of the Adler-32 footer.
const ZLIB_FOOTER_LEN: usize = 4;

/// XOR every byte with a single-byte key.
///
/// ```
/// use oxibin_runtime::process::process_xor_one;
///
/// assert_eq!(process_xor_one(&[0x10, 0x20], 0xff), vec![0xef, 0xdf]);
/// ```
pub fn process_xor_one(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|b| b ^ key).collect()
}

/// XOR every byte with a repeating multi-byte key.
///
/// The key cycles: byte `i` is combined with `key[i % key.len()]`. An
/// empty key leaves the data unchanged.
///
/// ```
/// use oxibin_runtime::process::process_xor_many;
///
/// let out = process_xor_many(&[0x10, 0x20, 0x30], &[0xff, 0x0f]);
/// assert_eq!(out, vec![0xef, 0x2f, 0xcf]);
/// ```
pub fn process_xor_many(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}

/// Circularly rotate each byte left by `amount` bits.
///
/// `amount` must be in `[-7, 7]`; negative amounts rotate right. Only
/// group size 1 (independent bytes) is defined.
pub fn process_rotate_left(data: &[u8], amount: i32, group_size: usize) -> Result<Vec<u8>> {
    if !(-7..=7).contains(&amount) {
        return Err(OxiBinError::invalid_argument(format!(
            "rotate amount {amount} outside [-7, 7]"
        )));
    }
    if group_size != 1 {
        return Err(OxiBinError::not_implemented(format!(
            "rotate with group size {group_size}"
        )));
    }
    let amount = amount.rem_euclid(8) as u32;
    Ok(data.iter().map(|b| b.rotate_left(amount)).collect())
}

/// Decompress a zlib-framed DEFLATE payload (RFC 1950).
///
/// The compression method must be 8 (DEFLATE). When the FDICT flag is set,
/// the 4-byte dictionary id after the 2-byte header is skipped. The
/// trailing Adler-32 footer is sliced off and trusted, not recomputed.
pub fn process_zlib(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 2 {
        return Err(OxiBinError::unexpected_eof(2, data.len()));
    }
    let cmf = data[0];
    let flg = data[1];
    let cm = cmf & 0x0f;
    if cm != 8 {
        return Err(OxiBinError::not_supported(format!(
            "zlib compression method {cm}"
        )));
    }
    let header_len = if flg & 0x20 != 0 { 6 } else { 2 };
    if data.len() < header_len + ZLIB_FOOTER_LEN {
        return Err(OxiBinError::unexpected_eof(
            header_len + ZLIB_FOOTER_LEN,
            data.len(),
        ));
    }

    let body = &data[header_len..data.len() - ZLIB_FOOTER_LEN];
    let mut out = Vec::new();
    DeflateDecoder::new(body).read_to_end(&mut out)?;
    trace!("inflated {} byte zlib frame to {} bytes", data.len(), out.len());
    Ok(out)
}

/// Wrap `data` in a freshly synthesized zlib container.
///
/// The body is DEFLATE-compressed and framed with a `0x78 0xDA` header and
/// a big-endian Adler-32 footer over the uncompressed input.
///
/// ```
/// use oxibin_runtime::process::{process_zlib, unprocess_zlib};
///
/// let framed = unprocess_zlib(b"hello hello hello").unwrap();
/// assert_eq!(process_zlib(&framed).unwrap(), b"hello hello hello");
/// ```
pub fn unprocess_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    let body = encoder.finish()?;

    let mut out = Vec::with_capacity(body.len() + 2 + ZLIB_FOOTER_LEN);
    out.push(ZLIB_CMF);
    out.push(ZLIB_FLG);
    out.extend_from_slice(&body);
    out.extend_from_slice(&Adler32::checksum(data).to_be_bytes());
    trace!("deflated {} bytes into {} byte zlib frame", data.len(), out.len());
    Ok(out)
}

/// Incremental Adler-32 checksum (RFC 1950), modulus 65521.
#[derive(Clone, Debug)]
pub struct Adler32 {
    s1: u32,
    s2: u32,
}

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Bytes to accumulate before the sums must be reduced to avoid overflow.
const ADLER_NMAX: usize = 5552;

impl Adler32 {
    /// Create a fresh checksum state.
    pub fn new() -> Self {
        Self { s1: 1, s2: 0 }
    }

    /// Feed more data into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for chunk in data.chunks(ADLER_NMAX) {
            for &byte in chunk {
                s1 += u32::from(byte);
                s2 += s1;
            }
            s1 %= ADLER_MOD;
            s2 %= ADLER_MOD;
        }
        self.s1 = s1;
        self.s2 = s2;
    }

    /// Finalize: `(s2 << 16) | s1`.
    pub fn finish(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }

    /// One-shot checksum of `data`.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finish()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_one() {
        assert_eq!(process_xor_one(&[], 0xaa), Vec::<u8>::new());
        assert_eq!(process_xor_one(&[0xff, 0x00], 0x0f), vec![0xf0, 0x0f]);
        // XOR is its own inverse.
        let data = [1u8, 2, 3, 4];
        assert_eq!(process_xor_one(&process_xor_one(&data, 0x5a), 0x5a), data);
    }

    #[test]
    fn test_xor_many_cycles() {
        let out = process_xor_many(&[0x10, 0x20, 0x30], &[0xff, 0x0f]);
        assert_eq!(out, vec![0xef, 0x2f, 0xcf]);
    }

    #[test]
    fn test_xor_many_single_byte_key() {
        let data = [0x41u8, 0x42, 0x43];
        assert_eq!(process_xor_many(&data, &[0x20]), process_xor_one(&data, 0x20));
    }

    #[test]
    fn test_xor_many_empty_key() {
        assert_eq!(process_xor_many(&[1, 2, 3], &[]), vec![1, 2, 3]);
    }

    #[test]
    fn test_rotate_left() {
        assert_eq!(process_rotate_left(&[0x81], 1, 1).unwrap(), vec![0x03]);
        assert_eq!(process_rotate_left(&[0x0f], 4, 1).unwrap(), vec![0xf0]);
        assert_eq!(process_rotate_left(&[0xaa], 0, 1).unwrap(), vec![0xaa]);
    }

    #[test]
    fn test_rotate_negative_is_rotate_right() {
        assert_eq!(process_rotate_left(&[0x03], -1, 1).unwrap(), vec![0x81]);
        let data = [0x5cu8, 0xd1];
        let there = process_rotate_left(&data, 3, 1).unwrap();
        let back = process_rotate_left(&there, -3, 1).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_rotate_bad_amount() {
        assert!(process_rotate_left(&[0x00], 8, 1).is_err());
        assert!(process_rotate_left(&[0x00], -8, 1).is_err());
    }

    #[test]
    fn test_rotate_group_size_unimplemented() {
        let err = process_rotate_left(&[0x00, 0x01], 1, 2).unwrap_err();
        assert!(matches!(err, OxiBinError::NotImplemented { .. }));
    }

    #[test]
    fn test_adler32_empty() {
        assert_eq!(Adler32::checksum(&[]), 1);
    }

    #[test]
    fn test_adler32_known_value() {
        assert_eq!(Adler32::checksum(b"Hello"), 0x058c01f5);
    }

    #[test]
    fn test_adler32_incremental() {
        let data = b"Hello, World!";
        let mut adler = Adler32::new();
        adler.update(&data[..6]);
        adler.update(&data[6..]);
        assert_eq!(adler.finish(), Adler32::checksum(data));
    }

    #[test]
    fn test_adler32_large() {
        // Exercises the deferred reduction path.
        let data = vec![0xffu8; 3 * ADLER_NMAX + 17];
        let whole = Adler32::checksum(&data);
        let mut adler = Adler32::new();
        for chunk in data.chunks(100) {
            adler.update(chunk);
        }
        assert_eq!(adler.finish(), whole);
    }

    #[test]
    fn test_zlib_header_shape() {
        let framed = unprocess_zlib(b"test").unwrap();
        assert_eq!(framed[0], ZLIB_CMF);
        assert_eq!(framed[1], ZLIB_FLG);
        let check = u16::from(framed[0]) * 256 + u16::from(framed[1]);
        assert_eq!(check % 31, 0);
    }

    #[test]
    fn test_zlib_empty_input() {
        let framed = unprocess_zlib(&[]).unwrap();
        // Adler-32 of nothing is 1.
        assert_eq!(&framed[framed.len() - 4..], &[0, 0, 0, 1]);
        assert_eq!(process_zlib(&framed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_zlib_round_trip() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        let framed = unprocess_zlib(&data).unwrap();
        assert_eq!(process_zlib(&framed).unwrap(), data);
    }

    #[test]
    fn test_zlib_ignores_checksum() {
        let mut framed = unprocess_zlib(b"payload").unwrap();
        let n = framed.len();
        framed[n - 1] ^= 0xff;
        // The footer is trusted as-is; decode still succeeds.
        assert_eq!(process_zlib(&framed).unwrap(), b"payload");
    }

    #[test]
    fn test_zlib_bad_method() {
        // CM = 7 in an otherwise plausible header.
        let err = process_zlib(&[0x77, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, OxiBinError::NotSupported { .. }));
    }

    #[test]
    fn test_zlib_too_short() {
        assert!(process_zlib(&[0x78]).is_err());
        assert!(process_zlib(&[0x78, 0xda, 0x00]).is_err());
    }
}
