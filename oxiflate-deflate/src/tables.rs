//! Static DEFLATE tables (RFC 1951).
//!
//! Length and distance base/extra-bit tables, the code-length transmission
//! order, and the fixed Huffman codes. The fixed codes are built once on
//! first use and shared read-only by every encoder and decoder.

use crate::huffman::{HuffmanTree, canonical_codes};
use std::sync::OnceLock;

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Size of the literal/length alphabet including the two reserved codes 286 and 287.
pub const FIXED_LITLEN_SYMBOLS: usize = 288;

/// Size of the distance alphabet including the two reserved codes 30 and 31.
pub const FIXED_DISTANCE_SYMBOLS: usize = 32;

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub fn fixed_litlen_lengths() -> [u8; FIXED_LITLEN_SYMBOLS] {
    let mut lengths = [8u8; FIXED_LITLEN_SYMBOLS];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Fixed distance code lengths: 5 bits for all 32 codes.
pub fn fixed_distance_lengths() -> [u8; FIXED_DISTANCE_SYMBOLS] {
    [5u8; FIXED_DISTANCE_SYMBOLS]
}

/// The fixed literal/length decode table.
pub fn fixed_litlen_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();
    TREE.get_or_init(|| {
        HuffmanTree::from_code_lengths(&fixed_litlen_lengths())
            .expect("fixed literal/length code lengths form a valid prefix code")
    })
}

/// The fixed distance decode table.
pub fn fixed_distance_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();
    TREE.get_or_init(|| {
        HuffmanTree::from_code_lengths(&fixed_distance_lengths())
            .expect("fixed distance code lengths form a valid prefix code")
    })
}

/// Bit-reversed fixed literal/length codewords for the encoder.
pub fn fixed_litlen_codes() -> &'static [u16] {
    static CODES: OnceLock<Vec<u16>> = OnceLock::new();
    CODES.get_or_init(|| canonical_codes(&fixed_litlen_lengths()))
}

/// Bit-reversed fixed distance codewords for the encoder.
pub fn fixed_distance_codes() -> &'static [u16] {
    static CODES: OnceLock<Vec<u16>> = OnceLock::new();
    CODES.get_or_init(|| canonical_codes(&fixed_distance_lengths()))
}

/// Length code base values (RFC 1951 Section 3.2.5).
///
/// For length codes 257-285, this gives the base length value.
/// Extra bits are added to get the final length.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits (special case)
];

/// Number of extra bits for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, // 257-264
    1, 1, 1, 1, // 265-268
    2, 2, 2, 2, // 269-272
    3, 3, 3, 3, // 273-276
    4, 4, 4, 4, // 277-280
    5, 5, 5, 5, // 281-284
    0, // 285
];

/// Distance code base values (RFC 1951 Section 3.2.5).
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, // 0-3: 0 extra bits
    5, 7, // 4-5: 1 extra bit
    9, 13, // 6-7: 2 extra bits
    17, 25, // 8-9: 3 extra bits
    33, 49, // 10-11: 4 extra bits
    65, 97, // 12-13: 5 extra bits
    129, 193, // 14-15: 6 extra bits
    257, 385, // 16-17: 7 extra bits
    513, 769, // 18-19: 8 extra bits
    1025, 1537, // 20-21: 9 extra bits
    2049, 3073, // 22-23: 10 extra bits
    4097, 6145, // 24-25: 11 extra bits
    8193, 12289, // 26-27: 12 extra bits
    16385, 24577, // 28-29: 13 extra bits
];

/// Number of extra bits for distance codes 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order of code length codes in dynamic block header (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Literal/length symbol (257-285) for a match length (3-258).
#[inline]
pub fn length_code(length: usize) -> usize {
    debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&length));
    let lc = length - MIN_MATCH;
    if lc < 8 {
        return 257 + lc;
    }
    if length == MAX_MATCH {
        return 285;
    }
    let msb = usize::BITS - 1 - lc.leading_zeros();
    257 + 4 * (msb as usize - 1) + ((lc >> (msb - 2)) & 3)
}

/// Distance symbol (0-29) for a match distance (1-32768).
#[inline]
pub fn distance_code(distance: usize) -> usize {
    debug_assert!((1..=32768).contains(&distance));
    let d = distance - 1;
    if d < 4 {
        return d;
    }
    let msb = usize::BITS - 1 - d.leading_zeros();
    2 * msb as usize + ((d >> (msb - 1)) & 1)
}

/// Split a match length into (symbol, extra-bit count, extra-bit value).
pub fn length_to_code(length: usize) -> (usize, u32, u32) {
    let code = length_code(length);
    let base = LENGTH_BASE[code - 257] as usize;
    (
        code,
        LENGTH_EXTRA_BITS[code - 257] as u32,
        (length - base) as u32,
    )
}

/// Split a match distance into (symbol, extra-bit count, extra-bit value).
pub fn distance_to_code(distance: usize) -> (usize, u32, u32) {
    let code = distance_code(distance);
    let base = DISTANCE_BASE[code] as usize;
    (
        code,
        DISTANCE_EXTRA_BITS[code] as u32,
        (distance - base) as u32,
    )
}
