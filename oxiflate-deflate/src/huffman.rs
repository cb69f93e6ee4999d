//! Huffman coding for DEFLATE.
//!
//! This module implements both directions of RFC 1951's canonical Huffman
//! codes: [`HuffmanBuilder`] turns symbol frequencies into length-limited
//! code lengths, [`canonical_codes`] assigns the codewords, and
//! [`HuffmanTree`] is the table-driven decoder.
//!
//! # Alphabets
//!
//! DEFLATE uses three Huffman alphabets:
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman trees)
//!
//! # Bit order
//!
//! Codewords are defined MSB-first but the bit stream is LSB-first, so every
//! codeword handled here is stored bit-reversed. The encoder writes it with a
//! plain `write_bits`, and the decoder indexes its table with peeked bits.

use oxiflate_core::bitstream::BitReader;
use oxiflate_core::error::{OxiFlateError, Result};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Bits resolved by the primary decode table.
const PRIMARY_BITS: u32 = 9;
const PRIMARY_SIZE: usize = 1 << PRIMARY_BITS;
const PRIMARY_MASK: u32 = PRIMARY_SIZE as u32 - 1;

/// Reverse the low `length` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, length: u32) -> u16 {
    if length == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - length)
}

/// Assign canonical codewords to a code-length array.
///
/// Returns one bit-reversed codeword per symbol, ready for LSB-first output.
/// Unused symbols (length 0) get codeword 0.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return 0;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            reverse_bits(code, len as u32)
        })
        .collect()
}

/// One slot of the decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// No codeword has this prefix.
    Empty,
    /// A complete codeword of `bits` total bits.
    Leaf { symbol: u16, bits: u8 },
    /// Codewords longer than nine bits continue in a sub-table of `1 << bits` slots.
    SubTable { offset: u16, bits: u8 },
}

/// A Huffman decode table.
///
/// The first 512 entries are indexed directly by the next nine stream bits.
/// Codewords longer than nine bits resolve through a second-level table
/// sized to the longest codeword sharing that nine-bit prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    entries: Vec<Entry>,
    max_code_length: u8,
}

impl HuffmanTree {
    /// Build a decode table from code lengths.
    ///
    /// `code_lengths[i]` is the bit length for symbol `i`; zero means unused.
    /// Incomplete codes are accepted (reading an unassigned codeword fails at
    /// decode time); over-subscribed codes are rejected.
    pub fn from_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        let mut bl_count = [0i32; MAX_CODE_LENGTH + 1];
        for &len in code_lengths {
            if len as usize > MAX_CODE_LENGTH {
                return Err(OxiFlateError::corrupted(
                    0,
                    format!("code length {} exceeds maximum {}", len, MAX_CODE_LENGTH),
                ));
            }
            bl_count[len as usize] += 1;
        }
        bl_count[0] = 0;

        let mut left = 1i32;
        for &count in &bl_count[1..] {
            left = (left << 1) - count;
            if left < 0 {
                return Err(OxiFlateError::corrupted(0, "over-subscribed Huffman code"));
            }
        }

        let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
        let mut code = 0u16;
        for bits in 1..=MAX_CODE_LENGTH {
            code = (code + bl_count[bits - 1] as u16) << 1;
            next_code[bits] = code;
        }

        // (symbol, length, reversed codeword) for every used symbol
        let mut assigned = Vec::with_capacity(code_lengths.len());
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                let code = next_code[len as usize];
                next_code[len as usize] += 1;
                assigned.push((symbol as u16, len as u32, reverse_bits(code, len as u32)));
            }
        }

        let mut sub_bits = [0u8; PRIMARY_SIZE];
        for &(_, len, rev) in &assigned {
            if len > PRIMARY_BITS {
                let prefix = (rev as u32 & PRIMARY_MASK) as usize;
                sub_bits[prefix] = sub_bits[prefix].max((len - PRIMARY_BITS) as u8);
            }
        }

        let mut entries = vec![Entry::Empty; PRIMARY_SIZE];
        for (prefix, &bits) in sub_bits.iter().enumerate() {
            if bits > 0 {
                let offset = entries.len() as u16;
                entries.resize(entries.len() + (1 << bits), Entry::Empty);
                entries[prefix] = Entry::SubTable { offset, bits };
            }
        }

        let mut max_code_length = 0u8;
        for &(symbol, len, rev) in &assigned {
            max_code_length = max_code_length.max(len as u8);
            let leaf = Entry::Leaf {
                symbol,
                bits: len as u8,
            };
            if len <= PRIMARY_BITS {
                let step = 1usize << len;
                let mut index = rev as usize;
                while index < PRIMARY_SIZE {
                    entries[index] = leaf;
                    index += step;
                }
            } else {
                let prefix = (rev as u32 & PRIMARY_MASK) as usize;
                let Entry::SubTable { offset, bits } = entries[prefix] else {
                    unreachable!("sub-table allocated for every long prefix");
                };
                let rest_len = len - PRIMARY_BITS;
                let step = 1usize << rest_len;
                let mut index = (rev >> PRIMARY_BITS) as usize;
                while index < 1 << bits {
                    entries[offset as usize + index] = leaf;
                    index += step;
                }
            }
        }

        Ok(Self {
            entries,
            max_code_length,
        })
    }

    /// Length of the longest codeword, or 0 for an empty code.
    pub fn max_code_length(&self) -> u8 {
        self.max_code_length
    }

    /// Decode one symbol.
    ///
    /// Returns `Ok(None)` when the reader holds too few bits to resolve the
    /// next codeword; nothing is consumed in that case, so the call can be
    /// repeated after more input arrives.
    #[inline]
    pub fn decode(&self, reader: &mut BitReader) -> Result<Option<u16>> {
        let (bits, available) = reader.peek_available(MAX_CODE_LENGTH as u32);

        let mut entry = self.entries[(bits & PRIMARY_MASK) as usize];
        let mut needed = PRIMARY_BITS;
        if let Entry::SubTable { offset, bits: sub } = entry {
            let index = (bits >> PRIMARY_BITS) & ((1u32 << sub) - 1);
            entry = self.entries[offset as usize + index as usize];
            needed += sub as u32;
        }

        match entry {
            Entry::Leaf { symbol, bits: len } if len as u32 <= available => {
                reader.drop_bits(len as u32);
                Ok(Some(symbol))
            }
            Entry::Leaf { .. } => Ok(None),
            Entry::Empty if available >= needed => {
                Err(OxiFlateError::invalid_huffman(reader.bit_position()))
            }
            Entry::Empty => Ok(None),
            Entry::SubTable { .. } => Err(OxiFlateError::invalid_huffman(reader.bit_position())),
        }
    }
}

/// Accumulates symbol frequencies and derives length-limited code lengths.
#[derive(Debug, Clone)]
pub struct HuffmanBuilder {
    frequencies: Vec<u32>,
    max_length: u8,
}

impl HuffmanBuilder {
    /// Create a new Huffman builder.
    pub fn new(alphabet_size: usize, max_length: u8) -> Self {
        debug_assert!(max_length as usize <= MAX_CODE_LENGTH);
        Self {
            frequencies: vec![0; alphabet_size],
            max_length,
        }
    }

    /// Add a symbol occurrence.
    #[inline]
    pub fn add(&mut self, symbol: u16) {
        self.frequencies[symbol as usize] += 1;
    }

    /// Add multiple occurrences of a symbol.
    pub fn add_count(&mut self, symbol: u16, count: u32) {
        self.frequencies[symbol as usize] += count;
    }

    /// Frequencies collected so far.
    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    /// Zero all frequencies.
    pub fn reset(&mut self) {
        self.frequencies.fill(0);
    }

    /// Build code lengths from frequencies.
    ///
    /// Returns an array where `result[i]` is the code length for symbol `i`.
    /// The result is a complete prefix code with no length above the
    /// builder's limit. At least two symbols always receive a code: when
    /// fewer are used, the lowest unused symbols are added with length 1.
    pub fn build_lengths(&self) -> Vec<u8> {
        let n = self.frequencies.len();
        let mut lengths = vec![0u8; n];

        let mut symbols: Vec<(u32, u16)> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(i, &f)| (f, i as u16))
            .collect();

        if symbols.len() < 2 {
            let mut missing = 2 - symbols.len();
            if let Some(&(_, symbol)) = symbols.first() {
                lengths[symbol as usize] = 1;
            }
            for len in lengths.iter_mut() {
                if missing == 0 {
                    break;
                }
                if *len == 0 {
                    *len = 1;
                    missing -= 1;
                }
            }
            return lengths;
        }

        symbols.sort_unstable();

        let mut depths: Vec<u32> = symbols.iter().map(|&(f, _)| f).collect();
        minimum_redundancy(&mut depths);

        let mut counts = [0u32; MAX_CODE_LENGTH + 1];
        let max = self.max_length as usize;
        for &depth in &depths {
            counts[(depth as usize).min(max)] += 1;
        }
        enforce_max_length(&mut counts, max);

        // Longest codes go to the least frequent symbols.
        let mut next = 0;
        for len in (1..=max).rev() {
            for _ in 0..counts[len] {
                lengths[symbols[next].1 as usize] = len as u8;
                next += 1;
            }
        }

        lengths
    }
}

/// In-place minimum-redundancy code lengths (Moffat and Katajainen).
///
/// `a` holds at least two weights in ascending order; on return `a[i]` is the
/// code length of the i-th weight.
fn minimum_redundancy(a: &mut [u32]) {
    let n = a.len();
    debug_assert!(n >= 2);

    // Pass 1: build the tree, internal nodes record their parent.
    a[0] += a[1];
    let mut root = 0usize;
    let mut leaf = 2usize;
    for next in 1..n - 1 {
        if leaf >= n || a[root] < a[leaf] {
            a[next] = a[root];
            a[root] = next as u32;
            root += 1;
        } else {
            a[next] = a[leaf];
            leaf += 1;
        }

        if leaf >= n || (root < next && a[root] < a[leaf]) {
            a[next] += a[root];
            a[root] = next as u32;
            root += 1;
        } else {
            a[next] += a[leaf];
            leaf += 1;
        }
    }

    // Pass 2: internal node depths.
    a[n - 2] = 0;
    for next in (0..n - 2).rev() {
        a[next] = a[a[next] as usize] + 1;
    }

    // Pass 3: leaf depths.
    let mut avail = 1u32;
    let mut used = 0u32;
    let mut depth = 0u32;
    let mut root = n as isize - 2;
    let mut next = n as isize - 1;
    while avail > 0 {
        while root >= 0 && a[root as usize] == depth {
            used += 1;
            root -= 1;
        }
        while avail > used {
            a[next as usize] = depth;
            next -= 1;
            avail -= 1;
        }
        avail = 2 * used;
        depth += 1;
        used = 0;
    }
}

/// Rebalance per-length counts after clamping so Kraft's sum is exactly one.
fn enforce_max_length(counts: &mut [u32; MAX_CODE_LENGTH + 1], max: usize) {
    let mut total: u32 = (1..=max).map(|len| counts[len] << (max - len)).sum();
    while total > 1 << max {
        counts[max] -= 1;
        for len in (1..max).rev() {
            if counts[len] != 0 {
                counts[len] -= 1;
                counts[len + 1] += 2;
                break;
            }
        }
        total -= 1;
    }
}
