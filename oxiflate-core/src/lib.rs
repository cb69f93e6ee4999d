//! # OxiFlate Core
//!
//! Core components for the OxiFlate DEFLATE codec.
//!
//! This crate provides the building blocks shared by the encoder and decoder:
//!
//! - [`bitstream`]: LSB-first bit reader over pushed input, and the encoder's pending output buffer
//! - [`ringbuffer`]: Circular output window for back-reference replay
//! - [`checksum`]: Adler-32
//! - [`traits`]: Streaming compressor/decompressor traits and encoder settings
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Framing                                             │
//! │     zlib header, preset dictionary id, Adler-32 trailer │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec (oxiflate-deflate)                            │
//! │     LZ77 match finder, Huffman coding, block sequencer  │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader, PendingBuffer, OutputWindow, Adler-32    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::bitstream::BitReader;
//! use oxiflate_core::checksum::Adler32;
//!
//! // Read bits from a pushed chunk
//! let mut reader = BitReader::new();
//! reader.set_input(&[0xAB, 0xCD]).unwrap();
//! assert_eq!(reader.get_bits(12), Some(0xDAB));
//! assert_eq!(reader.get_bits(8), None);
//!
//! // Compute Adler-32
//! assert_eq!(Adler32::checksum(b"Wikipedia"), 0x11E60398);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod ringbuffer;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, PendingBuffer};
pub use checksum::Adler32;
pub use error::{ErrorCategory, OxiFlateError, Result};
pub use ringbuffer::{OutputWindow, WINDOW_SIZE};
pub use traits::{
    CompressStatus, CompressionLevel, Compressor, DecompressStatus, Decompressor,
    DeflateStrategy, FlushMode, Format,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, PendingBuffer};
    pub use crate::checksum::Adler32;
    pub use crate::error::{OxiFlateError, Result};
    pub use crate::ringbuffer::OutputWindow;
    pub use crate::traits::{
        CompressionLevel, Compressor, Decompressor, DeflateStrategy, FlushMode, Format,
    };
}
