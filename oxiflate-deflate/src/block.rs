//! DEFLATE block emission.
//!
//! The [`BlockWriter`] tallies literals and matches for the block being
//! built. When the engine flushes, it builds Huffman trees from those
//! tallies, prices the block as stored, fixed and dynamic, and writes the
//! cheapest encoding into its [`PendingBuffer`].

use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanBuilder,
    LITLEN_ALPHABET_SIZE, MAX_CODE_LENGTH, canonical_codes,
};
use crate::lz77::Lz77Token;
use crate::tables::{
    CODE_LENGTH_ORDER, distance_to_code, fixed_distance_codes, fixed_distance_lengths,
    fixed_litlen_codes, fixed_litlen_lengths, length_to_code,
};
use log::{debug, trace};
use oxiflate_core::bitstream::PendingBuffer;

/// Symbols a block may hold before it must be flushed.
pub const TALLY_CAPACITY: usize = 1 << 14;

/// Largest payload of a single stored block.
pub const MAX_STORED_BLOCK: usize = 65535;

/// Code-length alphabet: repeat previous length 3-6 times (2 extra bits).
const REP_3_6: usize = 16;
/// Code-length alphabet: repeat zero 3-10 times (3 extra bits).
const REPZ_3_10: usize = 17;
/// Code-length alphabet: repeat zero 11-138 times (7 extra bits).
const REPZ_11_138: usize = 18;

/// Maximum length of a code-length code.
const MAX_BL_BITS: u8 = 7;

/// How a block was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Uncompressed (BTYPE 00).
    Stored,
    /// Fixed Huffman codes (BTYPE 01).
    Fixed,
    /// Dynamic Huffman codes (BTYPE 10).
    Dynamic,
}

/// Codewords and lengths for one alphabet.
#[derive(Clone, Copy)]
struct Codes<'a> {
    codes: &'a [u16],
    lengths: &'a [u8],
}

impl Codes<'_> {
    #[inline]
    fn write(&self, pending: &mut PendingBuffer, symbol: usize) {
        pending.write_bits(self.codes[symbol] as u32, self.lengths[symbol] as u32);
    }
}

/// Frequencies and the code derived from them.
#[derive(Debug)]
struct Tree {
    builder: HuffmanBuilder,
    lengths: Vec<u8>,
    codes: Vec<u16>,
    min_codes: usize,
    num_codes: usize,
}

impl Tree {
    fn new(size: usize, min_codes: usize, max_length: u8) -> Self {
        Self {
            builder: HuffmanBuilder::new(size, max_length),
            lengths: vec![0; size],
            codes: vec![0; size],
            min_codes,
            num_codes: min_codes,
        }
    }

    fn build(&mut self) {
        self.lengths = self.builder.build_lengths();
        self.codes = canonical_codes(&self.lengths);
        self.num_codes = self
            .lengths
            .iter()
            .rposition(|&len| len > 0)
            .map_or(0, |i| i + 1)
            .max(self.min_codes);
    }

    /// Bits needed for all tallied symbols under the built code.
    fn encoded_length(&self) -> usize {
        self.builder
            .frequencies()
            .iter()
            .zip(&self.lengths)
            .map(|(&freq, &len)| freq as usize * len as usize)
            .sum()
    }

    fn codes(&self) -> Codes<'_> {
        Codes {
            codes: &self.codes,
            lengths: &self.lengths,
        }
    }
}

/// Run-length code a code-length sequence with the code-length alphabet.
///
/// Calls `emit(symbol, extra_value, extra_bits)` for each instruction.
fn rle_code_lengths(lengths: &[u8], mut emit: impl FnMut(usize, u32, u32)) {
    let mut prev_len: Option<u8> = None;
    let mut count = 0usize;
    let (mut max_count, mut min_count) = if lengths.first() == Some(&0) {
        (138, 3)
    } else {
        (7, 4)
    };

    for (n, &cur_len) in lengths.iter().enumerate() {
        let next_len = lengths.get(n + 1).copied();
        count += 1;
        if count < max_count && next_len == Some(cur_len) {
            continue;
        }

        if count < min_count {
            for _ in 0..count {
                emit(cur_len as usize, 0, 0);
            }
        } else if cur_len != 0 {
            if prev_len != Some(cur_len) {
                emit(cur_len as usize, 0, 0);
                count -= 1;
            }
            emit(REP_3_6, (count - 3) as u32, 2);
        } else if count <= 10 {
            emit(REPZ_3_10, (count - 3) as u32, 3);
        } else {
            emit(REPZ_11_138, (count - 11) as u32, 7);
        }

        count = 0;
        prev_len = Some(cur_len);
        (max_count, min_count) = match next_len {
            Some(0) => (138, 3),
            Some(len) if len == cur_len => (6, 3),
            _ => (7, 4),
        };
    }
}

/// Accumulates one block's symbols and writes finished blocks.
#[derive(Debug)]
pub struct BlockWriter {
    pending: PendingBuffer,
    tokens: Vec<Lz77Token>,
    literal: Tree,
    distance: Tree,
    bit_lengths: Tree,
    /// Extra bits (length and distance) needed by the tallied matches.
    extra_bits: usize,
}

impl BlockWriter {
    /// Create an empty block writer.
    pub fn new() -> Self {
        Self {
            pending: PendingBuffer::new(),
            tokens: Vec::with_capacity(TALLY_CAPACITY),
            literal: Tree::new(LITLEN_ALPHABET_SIZE, 257, MAX_CODE_LENGTH as u8),
            distance: Tree::new(DISTANCE_ALPHABET_SIZE, 1, MAX_CODE_LENGTH as u8),
            bit_lengths: Tree::new(CODELEN_ALPHABET_SIZE, 4, MAX_BL_BITS),
            extra_bits: 0,
        }
    }

    /// The output buffer blocks are written to.
    pub fn pending(&mut self) -> &mut PendingBuffer {
        &mut self.pending
    }

    /// Read-only view of the output buffer.
    pub fn pending_ref(&self) -> &PendingBuffer {
        &self.pending
    }

    /// Discard tallies and pending output.
    pub fn reset(&mut self) {
        self.pending.reset();
        self.reset_tally();
    }

    fn reset_tally(&mut self) {
        self.tokens.clear();
        self.literal.builder.reset();
        self.distance.builder.reset();
        self.bit_lengths.builder.reset();
        self.extra_bits = 0;
    }

    /// Number of symbols tallied for the current block.
    pub fn tallied(&self) -> usize {
        self.tokens.len()
    }

    /// True once the block must be flushed.
    pub fn is_full(&self) -> bool {
        self.tokens.len() >= TALLY_CAPACITY
    }

    /// Tally a literal byte. Returns true when the block is full.
    #[inline]
    pub fn tally_lit(&mut self, literal: u8) -> bool {
        self.tokens.push(Lz77Token::Literal(literal));
        self.literal.builder.add(literal as u16);
        self.is_full()
    }

    /// Tally a back-reference. Returns true when the block is full.
    #[inline]
    pub fn tally_dist(&mut self, distance: usize, length: usize) -> bool {
        self.tokens.push(Lz77Token::Match {
            length: length as u16,
            distance: distance as u16,
        });

        let (lc, length_extra, _) = length_to_code(length);
        let (dc, distance_extra, _) = distance_to_code(distance);
        self.literal.builder.add(lc as u16);
        self.distance.builder.add(dc as u16);
        self.extra_bits += (length_extra + distance_extra) as usize;
        self.is_full()
    }

    /// Write `data` as stored blocks, splitting at the stored-block limit.
    ///
    /// An empty `data` writes a single empty block, which is how a sync
    /// flush ends on a byte boundary.
    pub fn flush_stored_block(&mut self, data: &[u8], last: bool) {
        trace!("stored block: {} bytes, last={}", data.len(), last);
        let mut chunks = data.chunks(MAX_STORED_BLOCK).peekable();
        if chunks.peek().is_none() {
            self.write_stored(&[], last);
        }
        while let Some(chunk) = chunks.next() {
            let is_last = last && chunks.peek().is_none();
            self.write_stored(chunk, is_last);
        }
        self.reset_tally();
    }

    fn write_stored(&mut self, chunk: &[u8], last: bool) {
        self.pending.write_bits(last as u32, 3);
        self.pending.align_to_byte();
        self.pending.write_u16(chunk.len() as u16);
        self.pending.write_u16(!(chunk.len() as u16));
        self.pending.write_bytes(chunk);
    }

    /// Emit the tallied block.
    ///
    /// `stored` is the raw input the tallies cover, when it is still
    /// available; the block is written stored if that is cheapest.
    pub fn flush_block(&mut self, stored: Option<&[u8]>, last: bool) -> BlockType {
        self.literal.builder.add(END_OF_BLOCK);

        self.literal.build();
        self.distance.build();

        // Code-length frequencies for both trees.
        let bl = &mut self.bit_lengths.builder;
        let mut add_bl = |symbol: usize, _: u32, _: u32| bl.add(symbol as u16);
        rle_code_lengths(&self.literal.lengths[..self.literal.num_codes], &mut add_bl);
        rle_code_lengths(&self.distance.lengths[..self.distance.num_codes], &mut add_bl);
        self.bit_lengths.build();

        let mut bl_codes = 4;
        for i in (bl_codes..CODELEN_ALPHABET_SIZE).rev() {
            if self.bit_lengths.lengths[CODE_LENGTH_ORDER[i]] > 0 {
                bl_codes = i + 1;
                break;
            }
        }

        let bl_freqs = self.bit_lengths.builder.frequencies();
        let bl_extra =
            bl_freqs[REP_3_6] * 2 + bl_freqs[REPZ_3_10] * 3 + bl_freqs[REPZ_11_138] * 7;
        let dynamic_len = 14
            + bl_codes * 3
            + self.bit_lengths.encoded_length()
            + bl_extra as usize
            + self.literal.encoded_length()
            + self.distance.encoded_length()
            + self.extra_bits;

        let fixed_lit = fixed_litlen_lengths();
        let fixed_dist = fixed_distance_lengths();
        let static_len = self.extra_bits
            + self
                .literal
                .builder
                .frequencies()
                .iter()
                .zip(&fixed_lit)
                .map(|(&f, &l)| f as usize * l as usize)
                .sum::<usize>()
            + self
                .distance
                .builder
                .frequencies()
                .iter()
                .zip(&fixed_dist)
                .map(|(&f, &l)| f as usize * l as usize)
                .sum::<usize>();

        let opt_len = dynamic_len.min(static_len);

        if let Some(data) = stored.filter(|data| data.len() + 4 < opt_len >> 3) {
            debug!(
                "flushing stored block: {} bytes beat {} coded bits, last={}",
                data.len(),
                opt_len,
                last
            );
            self.flush_stored_block(data, last);
            return BlockType::Stored;
        }

        let block_type = if opt_len == static_len {
            BlockType::Fixed
        } else {
            BlockType::Dynamic
        };

        debug!(
            "flushing {:?} block: {} symbols, dynamic {} bits, fixed {} bits, last={}",
            block_type,
            self.tokens.len(),
            dynamic_len,
            static_len,
            last
        );

        if block_type == BlockType::Fixed {
            self.pending.write_bits((1 << 1) | last as u32, 3);
            let lit = Codes {
                codes: fixed_litlen_codes(),
                lengths: &fixed_lit,
            };
            let dist = Codes {
                codes: fixed_distance_codes(),
                lengths: &fixed_dist,
            };
            Self::compress_block(&mut self.pending, &self.tokens, lit, dist);
        } else {
            self.pending.write_bits((2 << 1) | last as u32, 3);
            self.send_all_trees(bl_codes);
            Self::compress_block(
                &mut self.pending,
                &self.tokens,
                self.literal.codes(),
                self.distance.codes(),
            );
        }

        self.reset_tally();
        block_type
    }

    fn send_all_trees(&mut self, bl_codes: usize) {
        let pending = &mut self.pending;
        pending.write_bits((self.literal.num_codes - 257) as u32, 5);
        pending.write_bits((self.distance.num_codes - 1) as u32, 5);
        pending.write_bits((bl_codes - 4) as u32, 4);
        for &symbol in &CODE_LENGTH_ORDER[..bl_codes] {
            pending.write_bits(self.bit_lengths.lengths[symbol] as u32, 3);
        }

        let bl = self.bit_lengths.codes();
        let mut send = |symbol: usize, extra: u32, bits: u32| {
            bl.write(pending, symbol);
            pending.write_bits(extra, bits);
        };
        rle_code_lengths(&self.literal.lengths[..self.literal.num_codes], &mut send);
        rle_code_lengths(&self.distance.lengths[..self.distance.num_codes], &mut send);
    }

    fn compress_block(
        pending: &mut PendingBuffer,
        tokens: &[Lz77Token],
        lit: Codes<'_>,
        dist: Codes<'_>,
    ) {
        for &token in tokens {
            match token {
                Lz77Token::Literal(byte) => lit.write(pending, byte as usize),
                Lz77Token::Match { length, distance } => {
                    let (lc, bits, extra) = length_to_code(length as usize);
                    lit.write(pending, lc);
                    pending.write_bits(extra, bits);

                    let (dc, bits, extra) = distance_to_code(distance as usize);
                    dist.write(pending, dc);
                    pending.write_bits(extra, bits);
                }
            }
        }
        lit.write(pending, END_OF_BLOCK as usize);
    }
}

impl Default for BlockWriter {
    fn default() -> Self {
        Self::new()
    }
}
