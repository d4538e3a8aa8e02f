//! # OxiBin Runtime
//!
//! Runtime support library for the OxiBin declarative binary-format
//! toolkit. Parsers and serializers generated from format descriptions do
//! not interpret schemas at runtime; they drive this crate's [`Stream`]
//! engine operation by operation.
//!
//! The building blocks, leaves first:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Generated code                                            │
//! │     structure-specific parse/serialize sequences          │
//! ├───────────────────────────────────────────────────────────┤
//! │ Stream                                                    │
//! │     bit reservoir, integer/float/bytes codecs,            │
//! │     write-back coordination ([`stream`], [`writeback`])   │
//! ├───────────────────────────────────────────────────────────┤
//! │ Processors and helpers                                    │
//! │     XOR, rotate, zlib framing ([`process`]), [`util`]     │
//! ├───────────────────────────────────────────────────────────┤
//! │ Byte backends                                             │
//! │     memory, file, mmap ([`backend`], [`mmap`])            │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use oxibin_runtime::Stream;
//!
//! // Parse: 3 unaligned bits, then an aligned big-endian u16.
//! let mut input = Stream::from_bytes(vec![0b1011_0010, 0x01, 0x02]);
//! assert_eq!(input.read_bits_be(3).unwrap(), 0b101);
//! assert_eq!(input.read_u2be().unwrap(), 0x0102);
//!
//! // Serialize the same layout back.
//! let mut output = Stream::with_size(3);
//! output.write_bits_be(3, 0b101).unwrap();
//! output.write_align_to_byte().unwrap();
//! output.write_u2be(0x0102).unwrap();
//! assert_eq!(output.to_byte_array().unwrap().as_ref(), &[0b1010_0000, 0x01, 0x02]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod error;
pub mod mmap;
pub mod process;
pub mod stream;
pub mod util;
pub mod writeback;

// Re-exports for convenience
pub use backend::{Backend, FileBackend, MemoryBackend};
pub use error::{OxiBinError, Result};
pub use mmap::MmapBackend;
pub use stream::Stream;
pub use writeback::WriteBackHandler;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backend::{Backend, FileBackend, MemoryBackend};
    pub use crate::error::{OxiBinError, Result};
    pub use crate::mmap::MmapBackend;
    pub use crate::process::{
        process_rotate_left, process_xor_many, process_xor_one, process_zlib, unprocess_zlib,
    };
    pub use crate::stream::Stream;
    pub use crate::util::{
        byte_array_compare, bytes_strip_right, bytes_terminate, modulo, string_reverse,
    };
    pub use crate::writeback::WriteBackHandler;
}
