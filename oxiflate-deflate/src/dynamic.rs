//! Dynamic block header decoding (RFC 1951 Section 3.2.7).
//!
//! The header is read incrementally: when the bit reader runs dry the
//! decoder keeps its position and resumes on the next call.

use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanTree, LITLEN_ALPHABET_SIZE,
};
use crate::tables::CODE_LENGTH_ORDER;
use oxiflate_core::bitstream::BitReader;
use oxiflate_core::error::{OxiFlateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// HLIT (5 bits).
    Lnum,
    /// HDIST (5 bits).
    Dnum,
    /// HCLEN (4 bits).
    Blnum,
    /// Code-length code lengths, 3 bits each.
    BlLens,
    /// Literal/length and distance code lengths.
    Lens,
    /// Extra bits of a repeat code.
    Reps { symbol: u16 },
}

/// Resumable reader for a dynamic block's code tables.
#[derive(Debug, Clone)]
pub struct DynHeader {
    state: State,
    lit_count: usize,
    dist_count: usize,
    bl_count: usize,
    bl_lengths: [u8; CODELEN_ALPHABET_SIZE],
    bl_tree: Option<HuffmanTree>,
    lengths: Vec<u8>,
    ptr: usize,
}

impl DynHeader {
    /// Create a reader positioned at the start of a header.
    pub fn new() -> Self {
        Self {
            state: State::Lnum,
            lit_count: 0,
            dist_count: 0,
            bl_count: 0,
            bl_lengths: [0; CODELEN_ALPHABET_SIZE],
            bl_tree: None,
            lengths: Vec::with_capacity(LITLEN_ALPHABET_SIZE + DISTANCE_ALPHABET_SIZE),
            ptr: 0,
        }
    }

    /// Start over for the next dynamic block.
    pub fn reset(&mut self) {
        self.state = State::Lnum;
        self.bl_tree = None;
        self.lengths.clear();
        self.ptr = 0;
    }

    /// Read as much of the header as the reader holds.
    ///
    /// Returns `Ok(true)` once the whole header has been read, `Ok(false)`
    /// if more input is needed.
    pub fn decode(&mut self, reader: &mut BitReader) -> Result<bool> {
        loop {
            match self.state {
                State::Lnum => {
                    let Some(value) = reader.get_bits(5) else {
                        return Ok(false);
                    };
                    self.lit_count = value as usize + 257;
                    if self.lit_count > LITLEN_ALPHABET_SIZE {
                        return Err(corrupt(reader, format!("HLIT too large: {}", self.lit_count)));
                    }
                    self.state = State::Dnum;
                }
                State::Dnum => {
                    let Some(value) = reader.get_bits(5) else {
                        return Ok(false);
                    };
                    self.dist_count = value as usize + 1;
                    if self.dist_count > DISTANCE_ALPHABET_SIZE {
                        return Err(corrupt(reader, format!("HDIST too large: {}", self.dist_count)));
                    }
                    self.state = State::Blnum;
                }
                State::Blnum => {
                    let Some(value) = reader.get_bits(4) else {
                        return Ok(false);
                    };
                    self.bl_count = value as usize + 4;
                    self.bl_lengths = [0; CODELEN_ALPHABET_SIZE];
                    self.ptr = 0;
                    self.state = State::BlLens;
                }
                State::BlLens => {
                    while self.ptr < self.bl_count {
                        let Some(value) = reader.get_bits(3) else {
                            return Ok(false);
                        };
                        self.bl_lengths[CODE_LENGTH_ORDER[self.ptr]] = value as u8;
                        self.ptr += 1;
                    }
                    self.bl_tree = Some(HuffmanTree::from_code_lengths(&self.bl_lengths)?);
                    self.lengths.clear();
                    self.lengths.resize(self.lit_count + self.dist_count, 0);
                    self.ptr = 0;
                    self.state = State::Lens;
                }
                State::Lens => {
                    let Some(tree) = &self.bl_tree else {
                        return Err(OxiFlateError::invalid_state("code-length tree missing"));
                    };
                    while self.ptr < self.lengths.len() {
                        let Some(symbol) = tree.decode(reader)? else {
                            return Ok(false);
                        };
                        if symbol < 16 {
                            self.lengths[self.ptr] = symbol as u8;
                            self.ptr += 1;
                        } else {
                            self.state = State::Reps { symbol };
                            break;
                        }
                    }
                    if self.ptr == self.lengths.len() {
                        return self.finish(reader);
                    }
                }
                State::Reps { symbol } => {
                    let (bits, base) = match symbol {
                        16 => (2, 3),
                        17 => (3, 3),
                        _ => (7, 11),
                    };
                    let Some(extra) = reader.get_bits(bits) else {
                        return Ok(false);
                    };
                    let count = base + extra as usize;

                    let value = match symbol {
                        16 if self.ptr == 0 => {
                            return Err(corrupt(reader, "repeat code with no previous length"));
                        }
                        16 => self.lengths[self.ptr - 1],
                        _ => 0,
                    };
                    if self.ptr + count > self.lengths.len() {
                        return Err(corrupt(reader, "code length repeat overruns the table"));
                    }
                    self.lengths[self.ptr..self.ptr + count].fill(value);
                    self.ptr += count;
                    self.state = State::Lens;
                }
            }
        }
    }

    fn finish(&self, reader: &BitReader) -> Result<bool> {
        if self.lengths[END_OF_BLOCK as usize] == 0 {
            return Err(corrupt(reader, "end-of-block code has zero length"));
        }
        Ok(true)
    }

    /// Build the literal/length and distance decode tables from a
    /// completely read header.
    pub fn build_trees(&self) -> Result<(HuffmanTree, HuffmanTree)> {
        let (lit, dist) = self.lengths.split_at(self.lit_count);
        Ok((
            HuffmanTree::from_code_lengths(lit)?,
            HuffmanTree::from_code_lengths(dist)?,
        ))
    }
}

impl Default for DynHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn corrupt(reader: &BitReader, message: impl Into<String>) -> OxiFlateError {
    OxiFlateError::corrupted(reader.bit_position() / 8, message)
}
