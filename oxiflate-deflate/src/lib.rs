//! # OxiFlate Deflate
//!
//! Pure Rust implementation of the DEFLATE compression format (RFC 1951),
//! with optional zlib framing (RFC 1950).
//!
//! Both directions are push-style state machines: callers hand in input
//! chunks and drain output into their own buffers, and either side can be
//! suspended at any byte boundary.
//!
//! ## Features
//!
//! - **Decompression**: all DEFLATE block types
//!   - Stored (uncompressed) blocks
//!   - Fixed Huffman codes
//!   - Dynamic Huffman codes
//! - **Compression**: LZ77 hash-chain matching + Huffman coding
//!   - Levels 0-9 with greedy and lazy match selection
//!   - Filtered and Huffman-only strategies
//!   - Stored, fixed or dynamic blocks, whichever is smallest
//!   - Sync and full flushes, preset dictionaries
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_deflate::{deflate, inflate};
//!
//! // Compress data
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! // Decompress data
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-3: Greedy matching
//! - Level 4-9: Lazy matching (default is 6)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod deflate;
pub mod dynamic;
pub mod engine;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;
pub mod zlib;

// Re-exports
pub use block::BlockType;
pub use deflate::{Deflater, deflate};
pub use engine::{CompressionConfig, CompressionFunction};
pub use huffman::{HuffmanBuilder, HuffmanTree};
pub use inflate::{Inflater, inflate};
pub use lz77::Lz77Token;
pub use oxiflate_core::{
    CompressionLevel, DeflateStrategy, FlushMode, Format, OxiFlateError, Result,
};
pub use zlib::{
    zlib_compress, zlib_compress_with_dict, zlib_decompress, zlib_decompress_with_dict,
    zlib_requires_dictionary,
};
