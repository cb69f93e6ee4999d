//! Zlib framing for DEFLATE streams.
//!
//! The zlib format (RFC 1950) wraps raw DEFLATE data with a header and
//! an Adler-32 checksum.
//!
//! # Format
//!
//! ```text
//! +---+---+=========+============+---+---+---+---+
//! |CMF|FLG|[DICTID] | compressed |    ADLER32    |
//! +---+---+=========+============+---+---+---+---+
//! ```
//!
//! - CMF: Compression Method and Flags
//!   - Bits 0-3: CM (Compression Method) - must be 8 for DEFLATE
//!   - Bits 4-7: CINFO (Compression Info) - log2(window size) - 8
//! - FLG: Flags
//!   - Bits 0-4: FCHECK - check bits so (CMF*256 + FLG) mod 31 == 0
//!   - Bit 5: FDICT - preset dictionary present
//!   - Bits 6-7: FLEVEL - compression level (0-3)
//! - DICTID: Adler-32 of the preset dictionary (big-endian), only with FDICT
//! - ADLER32: Adler-32 checksum of uncompressed data (big-endian)
//!
//! The header and trailer themselves are produced and checked inside
//! [`Deflater`] and [`Inflater`]; this module holds the header arithmetic
//! and one-shot helpers.

use crate::deflate::Deflater;
use crate::inflate::Inflater;
use oxiflate_core::error::{OxiFlateError, Result};
use oxiflate_core::traits::CompressionLevel;

/// CMF byte written by the encoder: CM=8 (DEFLATE), CINFO=7 (32KB window).
pub const ZLIB_CMF: u8 = 0x78;

/// The only compression method zlib defines.
const METHOD_DEFLATE: u8 = 8;

/// FDICT flag in the FLG byte.
const FLAG_DICT: u8 = 0x20;

/// Zlib compression level indicator in header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZlibLevel {
    /// Fastest compression.
    Fastest = 0,
    /// Fast compression.
    Fast = 1,
    /// Default compression.
    Default = 2,
    /// Maximum compression.
    Maximum = 3,
}

impl ZlibLevel {
    /// Convert from compression level (0-9) to zlib level indicator.
    pub fn from_level(level: CompressionLevel) -> Self {
        match level.level() {
            0..=2 => Self::Fastest,
            3..=5 => Self::Fast,
            6 => Self::Default,
            _ => Self::Maximum,
        }
    }
}

/// Build the two header bytes as a big-endian `u16`.
pub(crate) fn header(level: CompressionLevel, has_dictionary: bool) -> u16 {
    let mut flg = (ZlibLevel::from_level(level) as u8) << 6;
    if has_dictionary {
        flg |= FLAG_DICT;
    }
    let base = (ZLIB_CMF as u16) << 8 | flg as u16;
    base + (31 - base % 31) % 31
}

/// Validate the two header bytes. Returns whether FDICT is set.
pub(crate) fn parse_header(cmf: u8, flg: u8) -> Result<bool> {
    if ((cmf as u16) << 8 | flg as u16) % 31 != 0 {
        return Err(OxiFlateError::invalid_header("zlib header check failed"));
    }
    if cmf & 0x0F != METHOD_DEFLATE {
        return Err(OxiFlateError::invalid_header(format!(
            "unsupported compression method {}",
            cmf & 0x0F
        )));
    }
    if cmf >> 4 > 7 {
        return Err(OxiFlateError::invalid_header(format!(
            "window size 2^{} too large",
            (cmf >> 4) + 8
        )));
    }
    Ok(flg & FLAG_DICT != 0)
}

/// Compress data using zlib format.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::zlib::{zlib_compress, zlib_decompress};
///
/// let data = b"Hello, World! Hello, World!";
/// let compressed = zlib_compress(data, 6).unwrap();
/// let decompressed = zlib_decompress(&compressed).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    Deflater::zlib(level).compress_to_vec(input)
}

/// Compress data using zlib format with a preset dictionary.
///
/// The dictionary's Adler-32 is stored in the header (FDICT=1) so the
/// decompressor can tell which dictionary to supply.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::zlib::{zlib_compress_with_dict, zlib_decompress_with_dict};
///
/// let dict = b"common patterns and shared content";
/// let data = b"This text has common patterns that match the dictionary";
/// let compressed = zlib_compress_with_dict(data, 6, dict).unwrap();
/// let decompressed = zlib_decompress_with_dict(&compressed, dict).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn zlib_compress_with_dict(input: &[u8], level: u8, dictionary: &[u8]) -> Result<Vec<u8>> {
    let mut deflater = Deflater::zlib(level);
    deflater.set_dictionary(dictionary)?;
    deflater.compress_to_vec(input)
}

/// Decompress zlib format data.
///
/// Fails with [`OxiFlateError::DictionaryRequired`] if the stream was
/// compressed with a preset dictionary.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    decompress(input, None)
}

/// Decompress zlib format data with a preset dictionary.
///
/// The dictionary is only used if the header asks for one, and must
/// match the checksum stored there.
pub fn zlib_decompress_with_dict(input: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    decompress(input, Some(dictionary))
}

fn decompress(input: &[u8], dictionary: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut inflater = Inflater::zlib();
    inflater.set_input(input)?;

    let mut output = Vec::with_capacity(input.len() * 4);
    let mut chunk = vec![0u8; 32 * 1024];
    loop {
        let n = inflater.inflate(&mut chunk)?;
        output.extend_from_slice(&chunk[..n]);
        if inflater.is_finished() {
            return Ok(output);
        }
        if let Some(id) = inflater.dictionary_id() {
            match dictionary {
                Some(dictionary) => inflater.set_dictionary(dictionary)?,
                None => return Err(OxiFlateError::dictionary_required(id)),
            }
        } else if n == 0 {
            return Err(OxiFlateError::unexpected_eof(1));
        }
    }
}

/// Check if zlib data requires a preset dictionary.
///
/// Returns the Adler-32 of the expected dictionary, or `None` if the
/// header is invalid or asks for no dictionary.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::zlib::{zlib_compress_with_dict, zlib_requires_dictionary};
/// use oxiflate_core::checksum::Adler32;
///
/// let dict = b"test dictionary";
/// let compressed = zlib_compress_with_dict(b"test data", 6, dict).unwrap();
/// assert_eq!(zlib_requires_dictionary(&compressed), Some(Adler32::checksum(dict)));
/// ```
pub fn zlib_requires_dictionary(input: &[u8]) -> Option<u32> {
    let [cmf, flg, a, b, c, d, ..] = *input else {
        return None;
    };
    match parse_header(cmf, flg) {
        Ok(true) => Some(u32::from_be_bytes([a, b, c, d])),
        _ => None,
    }
}
