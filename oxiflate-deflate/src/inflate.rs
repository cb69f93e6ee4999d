//! DEFLATE decompression (inflate).
//!
//! This module implements the DEFLATE decompression algorithm as specified
//! in RFC 1951. It supports all three block types:
//! - Type 0: Stored (uncompressed)
//! - Type 1: Fixed Huffman codes
//! - Type 2: Dynamic Huffman codes
//!
//! [`Inflater`] is push-style: input is handed over with
//! [`Inflater::set_input`] and output drained with [`Inflater::inflate`].
//! Running out of input mid-stream is not an error; the call returns what it
//! has and [`Inflater::needs_input`] turns true.

use crate::dynamic::DynHeader;
use crate::huffman::HuffmanTree;
use crate::tables::{
    DISTANCE_BASE, DISTANCE_EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA_BITS, MAX_MATCH,
    fixed_distance_tree, fixed_litlen_tree,
};
use crate::zlib;
use log::{debug, trace};
use oxiflate_core::bitstream::BitReader;
use oxiflate_core::checksum::Adler32;
use oxiflate_core::error::{OxiFlateError, Result};
use oxiflate_core::ringbuffer::OutputWindow;
use oxiflate_core::traits::{DecompressStatus, Decompressor, Format};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// zlib CMF/FLG.
    Header,
    /// zlib preset dictionary id.
    DictionaryId,
    /// Waiting for the caller to supply the dictionary with this Adler-32.
    NeedsDictionary { id: u32 },
    /// Block header (BFINAL, BTYPE).
    Blocks,
    /// Stored block LEN/NLEN.
    StoredLen,
    /// Stored block payload.
    Stored { remaining: usize },
    /// Dynamic block code tables.
    DynHeader,
    /// Literal/length symbols.
    Huffman,
    /// Extra bits of length code `code` (0-28).
    LenBits { code: usize },
    /// Distance symbol for a match of `length` bytes.
    Dist { length: usize },
    /// Extra bits of distance code `code`.
    DistBits { length: usize, code: usize },
    /// zlib Adler-32 trailer.
    Trailer,
    /// Stream complete.
    Finished,
}

#[derive(Debug)]
enum Codes {
    Fixed,
    Dynamic(Box<(HuffmanTree, HuffmanTree)>),
}

/// Streaming DEFLATE decompressor.
#[derive(Debug)]
pub struct Inflater {
    format: Format,
    mode: Mode,
    reader: BitReader,
    window: OutputWindow,
    dyn_header: DynHeader,
    codes: Codes,
    /// Whether the current block is the last one.
    last_block: bool,
    adler: Adler32,
    supplied: u64,
    total_out: u64,
}

impl Inflater {
    /// Create a raw DEFLATE decompressor.
    pub fn new() -> Self {
        Self::with_format(Format::Raw)
    }

    /// Create a decompressor for zlib-framed input.
    pub fn zlib() -> Self {
        Self::with_format(Format::Zlib)
    }

    /// Create a decompressor with explicit framing.
    pub fn with_format(format: Format) -> Self {
        Self {
            format,
            mode: Self::initial_mode(format),
            reader: BitReader::new(),
            window: OutputWindow::new(),
            dyn_header: DynHeader::new(),
            codes: Codes::Fixed,
            last_block: false,
            adler: Adler32::new(),
            supplied: 0,
            total_out: 0,
        }
    }

    fn initial_mode(format: Format) -> Mode {
        match format {
            Format::Raw => Mode::Blocks,
            Format::Zlib => Mode::Header,
        }
    }

    /// Reset to decompress a new stream with the same framing.
    pub fn reset(&mut self) {
        self.mode = Self::initial_mode(self.format);
        self.reader.reset();
        self.window.reset();
        self.dyn_header.reset();
        self.codes = Codes::Fixed;
        self.last_block = false;
        self.adler.reset();
        self.supplied = 0;
        self.total_out = 0;
    }

    /// Stream framing.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Supply the next chunk of compressed input.
    ///
    /// Fails with [`OxiFlateError::InputNotConsumed`] unless
    /// [`needs_input`](Self::needs_input) is true.
    pub fn set_input(&mut self, data: &[u8]) -> Result<()> {
        self.reader.set_input(data)?;
        self.supplied += data.len() as u64;
        Ok(())
    }

    /// True when every supplied byte has been taken into the bit buffer.
    pub fn needs_input(&self) -> bool {
        self.reader.is_needing_input()
    }

    /// True when a zlib stream is waiting for its preset dictionary.
    pub fn needs_dictionary(&self) -> bool {
        matches!(self.mode, Mode::NeedsDictionary { .. })
    }

    /// Adler-32 of the dictionary the stream asks for, if it asks for one.
    pub fn dictionary_id(&self) -> Option<u32> {
        match self.mode {
            Mode::NeedsDictionary { id } => Some(id),
            _ => None,
        }
    }

    /// Supply a preset dictionary.
    ///
    /// For zlib input the dictionary must be the one named by the header.
    /// For raw input it must be set before any output has been produced.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        match (self.format, self.mode) {
            (Format::Zlib, Mode::NeedsDictionary { id }) => {
                let computed = Adler32::checksum(dictionary);
                if computed != id {
                    return Err(OxiFlateError::checksum_mismatch(id, computed));
                }
                self.window.copy_dict(dictionary)?;
                self.mode = Mode::Blocks;
                Ok(())
            }
            (Format::Raw, Mode::Blocks) if self.total_out == 0 => {
                self.window.copy_dict(dictionary)
            }
            _ => Err(OxiFlateError::invalid_state("no dictionary expected now")),
        }
    }

    /// True once the stream is complete and all output has been drained.
    pub fn is_finished(&self) -> bool {
        self.mode == Mode::Finished && self.window.available() == 0
    }

    /// Adler-32 of all output handed out so far.
    pub fn adler(&self) -> u32 {
        self.adler.value()
    }

    /// Compressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.supplied - self.remaining_input() as u64
    }

    /// Decompressed bytes handed out so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Supplied bytes not yet consumed. After the stream ends these are the
    /// bytes that follow it.
    pub fn remaining_input(&self) -> usize {
        self.reader.available_bytes()
    }

    /// Decompress into `output`, returning the number of bytes written.
    ///
    /// Returns fewer bytes than `output` holds when more input (or a
    /// dictionary) is needed, or when the stream has ended.
    pub fn inflate(&mut self, output: &mut [u8]) -> Result<usize> {
        if output.is_empty() {
            return Err(OxiFlateError::buffer_too_small(1, 0));
        }

        let mut written = 0;
        loop {
            written += self.drain(&mut output[written..]);
            if written == output.len() {
                break;
            }
            if !self.decode()? && self.window.available() == 0 {
                break;
            }
        }
        Ok(written)
    }

    fn drain(&mut self, output: &mut [u8]) -> usize {
        let n = self.window.copy_output(output);
        self.adler.update(&output[..n]);
        self.total_out += n as u64;
        n
    }

    /// Advance the state machine. Returns false when nothing more can be
    /// done until input arrives or output is drained.
    fn decode(&mut self) -> Result<bool> {
        match self.mode {
            Mode::Header => self.decode_header(),
            Mode::DictionaryId => {
                let Some(value) = self.reader.get_bits(32) else {
                    return Ok(false);
                };
                let id = value.swap_bytes();
                debug!("zlib stream needs dictionary {:#010x}", id);
                self.mode = Mode::NeedsDictionary { id };
                Ok(false)
            }
            Mode::NeedsDictionary { .. } | Mode::Finished => Ok(false),
            Mode::Blocks => self.decode_block_header(),
            Mode::StoredLen => {
                let Some(value) = self.reader.get_bits(32) else {
                    return Ok(false);
                };
                let len = value & 0xFFFF;
                let nlen = value >> 16;
                if len != !nlen & 0xFFFF {
                    return Err(OxiFlateError::corrupted(
                        self.reader.bit_position() / 8,
                        format!("LEN/NLEN mismatch: {:#06x} vs {:#06x}", len, nlen),
                    ));
                }
                if len == 0 {
                    self.end_block();
                } else {
                    self.mode = Mode::Stored {
                        remaining: len as usize,
                    };
                }
                Ok(true)
            }
            Mode::Stored { remaining } => {
                let copied = self.window.copy_stored(&mut self.reader, remaining);
                if copied == remaining {
                    self.end_block();
                } else {
                    self.mode = Mode::Stored {
                        remaining: remaining - copied,
                    };
                }
                Ok(copied > 0)
            }
            Mode::DynHeader => {
                if !self.dyn_header.decode(&mut self.reader)? {
                    return Ok(false);
                }
                let trees = self.dyn_header.build_trees()?;
                self.codes = Codes::Dynamic(Box::new(trees));
                self.mode = Mode::Huffman;
                Ok(true)
            }
            Mode::Huffman | Mode::LenBits { .. } | Mode::Dist { .. } | Mode::DistBits { .. } => {
                self.decode_huffman()
            }
            Mode::Trailer => {
                // The checksum covers every byte, so wait until all are out.
                if self.window.available() > 0 {
                    return Ok(false);
                }
                let Some(value) = self.reader.get_bits(32) else {
                    return Ok(false);
                };
                let expected = value.swap_bytes();
                let computed = self.adler.value();
                if expected != computed {
                    return Err(OxiFlateError::checksum_mismatch(expected, computed));
                }
                debug!("zlib trailer verified: adler {:#010x}", computed);
                self.mode = Mode::Finished;
                Ok(false)
            }
        }
    }

    fn decode_header(&mut self) -> Result<bool> {
        let Some(value) = self.reader.get_bits(16) else {
            return Ok(false);
        };
        let has_dictionary = zlib::parse_header(value as u8, (value >> 8) as u8)?;
        self.mode = if has_dictionary {
            Mode::DictionaryId
        } else {
            Mode::Blocks
        };
        Ok(true)
    }

    fn decode_block_header(&mut self) -> Result<bool> {
        let Some(value) = self.reader.get_bits(3) else {
            return Ok(false);
        };
        self.last_block = value & 1 == 1;
        let block_type = value >> 1;
        trace!(
            "block header at bit {}: type {}, last={}",
            self.reader.bit_position() - 3,
            block_type,
            self.last_block
        );

        match block_type {
            0 => {
                self.reader.skip_to_byte_boundary();
                self.mode = Mode::StoredLen;
            }
            1 => {
                self.codes = Codes::Fixed;
                self.mode = Mode::Huffman;
            }
            2 => {
                self.dyn_header.reset();
                self.mode = Mode::DynHeader;
            }
            _ => return Err(OxiFlateError::invalid_block_type(block_type)),
        }
        Ok(true)
    }

    /// Decode symbols while the window has room for a maximal match.
    fn decode_huffman(&mut self) -> Result<bool> {
        let (lit_tree, dist_tree): (&HuffmanTree, &HuffmanTree) = match &self.codes {
            Codes::Fixed => (fixed_litlen_tree(), fixed_distance_tree()),
            Codes::Dynamic(trees) => (&trees.0, &trees.1),
        };

        let mut end_of_block = false;
        while !end_of_block && self.window.free_space() >= MAX_MATCH {
            match self.mode {
                Mode::Huffman => {
                    let Some(symbol) = lit_tree.decode(&mut self.reader)? else {
                        return Ok(false);
                    };
                    match symbol {
                        0..=255 => self.window.write_byte(symbol as u8)?,
                        256 => end_of_block = true,
                        257..=285 => {
                            self.mode = Mode::LenBits {
                                code: symbol as usize - 257,
                            };
                        }
                        _ => {
                            return Err(OxiFlateError::corrupted(
                                self.reader.bit_position() / 8,
                                format!("invalid literal/length symbol {}", symbol),
                            ));
                        }
                    }
                }
                Mode::LenBits { code } => {
                    let Some(extra) = self.reader.get_bits(LENGTH_EXTRA_BITS[code] as u32) else {
                        return Ok(false);
                    };
                    self.mode = Mode::Dist {
                        length: LENGTH_BASE[code] as usize + extra as usize,
                    };
                }
                Mode::Dist { length } => {
                    let Some(symbol) = dist_tree.decode(&mut self.reader)? else {
                        return Ok(false);
                    };
                    let code = symbol as usize;
                    if code >= DISTANCE_BASE.len() {
                        return Err(OxiFlateError::corrupted(
                            self.reader.bit_position() / 8,
                            format!("invalid distance symbol {}", symbol),
                        ));
                    }
                    self.mode = Mode::DistBits { length, code };
                }
                Mode::DistBits { length, code } => {
                    let Some(extra) = self.reader.get_bits(DISTANCE_EXTRA_BITS[code] as u32)
                    else {
                        return Ok(false);
                    };
                    let distance = DISTANCE_BASE[code] as usize + extra as usize;
                    self.window.repeat(length, distance)?;
                    self.mode = Mode::Huffman;
                }
                _ => return Ok(false),
            }
        }

        if end_of_block {
            self.end_block();
        }
        Ok(true)
    }

    fn end_block(&mut self) {
        if !self.last_block {
            self.mode = Mode::Blocks;
            return;
        }
        match self.format {
            Format::Raw => {
                let total = self.total_out + self.window.available() as u64;
                debug!("inflate finished: {} bytes", total);
                self.mode = Mode::Finished;
            }
            Format::Zlib => {
                self.reader.skip_to_byte_boundary();
                self.mode = Mode::Trailer;
            }
        }
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Inflater {
    /// Takes all of `input` if the previous input is used up. Once the
    /// stream ends, bytes after it are reported as not consumed.
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)> {
        let mut consumed = 0;
        if !input.is_empty() && self.needs_input() {
            self.set_input(input)?;
            consumed = input.len();
        }

        let produced = if output.is_empty() {
            0
        } else {
            self.inflate(output)?
        };

        let status = if self.is_finished() {
            consumed = consumed.saturating_sub(self.remaining_input());
            DecompressStatus::Done
        } else if self.needs_dictionary() {
            DecompressStatus::NeedsDictionary
        } else if produced == output.len() {
            DecompressStatus::NeedsOutput
        } else {
            DecompressStatus::NeedsInput
        };

        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        Inflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        Inflater::is_finished(self)
    }
}

/// Decompress a complete raw DEFLATE stream.
///
/// Fails with [`OxiFlateError::UnexpectedEof`] if `data` ends before the
/// last block does.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new();
    inflater.decompress_all(data)
}
