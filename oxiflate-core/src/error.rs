//! Error types for OxiFlate operations.
//!
//! Errors fall into three groups:
//!
//! - **Usage** errors: the caller broke the API contract (new input pushed
//!   before the old input was drained, an empty output buffer, input after
//!   `finish`). These are programming errors.
//! - **Corruption** errors: the compressed stream is malformed. The stream
//!   cannot be recovered.
//! - **Resource exhaustion**: an internal buffer would overflow. Well-formed
//!   data never triggers these, so they point at a logic bug.
//!
//! Running out of input is not an error. Decoders and encoders report it
//! through their status values instead.

use thiserror::Error;

/// The error taxonomy an [`OxiFlateError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller violated the API contract.
    Usage,
    /// The compressed stream is malformed.
    Corruption,
    /// An internal buffer or bookkeeping invariant would be violated.
    ResourceExhausted,
}

/// The main error type for OxiFlate operations.
#[derive(Debug, Error)]
pub enum OxiFlateError {
    /// New input was supplied while previous input was still pending.
    #[error("Old input was not completely processed: {remaining} bytes remaining")]
    InputNotConsumed {
        /// Bytes of the previous input that have not been consumed yet.
        remaining: usize,
    },

    /// Buffer too small for operation.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// The operation is not allowed in the current state.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the violated precondition.
        message: String,
    },

    /// Compression level outside 0-9.
    #[error("Invalid compression level: {level}")]
    InvalidLevel {
        /// The rejected level.
        level: u32,
    },

    /// Invalid stream header (zlib wrapper).
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Reserved DEFLATE block type (BTYPE = 11).
    #[error("Invalid block type: {block_type}")]
    InvalidBlockType {
        /// The block type read from the stream.
        block_type: u32,
    },

    /// Invalid Huffman code encountered during decompression.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Corrupted compressed data.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Invalid distance in an LZ77 back-reference.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Current history size.
        history_size: usize,
    },

    /// Checksum mismatch.
    #[error("Checksum mismatch: expected {expected:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream.
        expected: u32,
        /// Checksum computed from the data.
        computed: u32,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input: expected {expected} more bytes")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },

    /// The stream was compressed with a preset dictionary that was not supplied.
    #[error("Preset dictionary required (Adler-32 {checksum:#010x})")]
    DictionaryRequired {
        /// Adler-32 of the required dictionary.
        checksum: u32,
    },

    /// The decoder output window would overflow.
    #[error("Output window overflow: {requested} bytes requested, {free} free")]
    WindowOverflow {
        /// Bytes the operation tried to add.
        requested: usize,
        /// Free space left in the window.
        free: usize,
    },
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, OxiFlateError>;

impl OxiFlateError {
    /// Create an input-not-consumed error.
    pub fn input_not_consumed(remaining: usize) -> Self {
        Self::InputNotConsumed { remaining }
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an invalid level error.
    pub fn invalid_level(level: u32) -> Self {
        Self::InvalidLevel { level }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an invalid block type error.
    pub fn invalid_block_type(block_type: u32) -> Self {
        Self::InvalidBlockType { block_type }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Create a dictionary required error.
    pub fn dictionary_required(checksum: u32) -> Self {
        Self::DictionaryRequired { checksum }
    }

    /// Create a window overflow error.
    pub fn window_overflow(requested: usize, free: usize) -> Self {
        Self::WindowOverflow { requested, free }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputNotConsumed { .. }
            | Self::BufferTooSmall { .. }
            | Self::InvalidState { .. }
            | Self::InvalidLevel { .. } => ErrorCategory::Usage,
            Self::WindowOverflow { .. } => ErrorCategory::ResourceExhausted,
            Self::InvalidHeader { .. }
            | Self::InvalidBlockType { .. }
            | Self::InvalidHuffmanCode { .. }
            | Self::CorruptedData { .. }
            | Self::InvalidDistance { .. }
            | Self::ChecksumMismatch { .. }
            | Self::UnexpectedEof { .. }
            | Self::DictionaryRequired { .. } => ErrorCategory::Corruption,
        }
    }
}
