//! Bit-level I/O for the DEFLATE encoder and decoder.
//!
//! This module provides [`BitReader`], a push-style reader that the decoder
//! feeds with caller-supplied chunks, and [`PendingBuffer`], the encoder's
//! output accumulator that is drained into caller buffers.
//!
//! # Bit Ordering
//!
//! DEFLATE uses LSB-first ordering within bytes. Bits are packed starting from
//! the least significant bit of each byte, and multi-bit values are stored
//! with their least significant bit first. Huffman codes are the exception:
//! they are transmitted MSB-first, so callers bit-reverse them before writing.
//!
//! # Example
//!
//! ```
//! use oxiflate_core::bitstream::{BitReader, PendingBuffer};
//!
//! // Writing bits
//! let mut pending = PendingBuffer::new();
//! pending.write_bits(0b101, 3);
//! pending.write_bits(0b1100, 4);
//! pending.align_to_byte();
//!
//! let mut output = [0u8; 4];
//! let n = pending.flush_into(&mut output);
//!
//! // Reading bits
//! let mut reader = BitReader::new();
//! reader.set_input(&output[..n]).unwrap();
//! assert_eq!(reader.get_bits(3), Some(0b101));
//! assert_eq!(reader.get_bits(4), Some(0b1100));
//! ```

use crate::error::{OxiFlateError, Result};

/// A bit reader over caller-supplied input chunks.
///
/// Unlike a reader wrapping [`std::io::Read`], this reader never blocks and
/// never fails for lack of data: peeks that cannot be satisfied return `None`
/// and leave the state untouched, so the caller can supply more input and
/// retry the same operation.
#[derive(Debug, Default)]
pub struct BitReader {
    /// Current input chunk.
    input: Vec<u8>,
    /// Next unread byte in `input`.
    pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u32,
    /// Total bits consumed (for error reporting).
    total_bits_read: u64,
}

impl BitReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the next chunk of input.
    ///
    /// Fails with [`OxiFlateError::InputNotConsumed`] if bytes of the previous
    /// chunk have not been pulled into the bit buffer yet.
    pub fn set_input(&mut self, data: &[u8]) -> Result<()> {
        if self.pos < self.input.len() {
            return Err(OxiFlateError::input_not_consumed(self.input.len() - self.pos));
        }
        self.input.clear();
        self.input.extend_from_slice(data);
        self.pos = 0;
        Ok(())
    }

    /// True when every supplied byte has been pulled into the bit buffer.
    pub fn is_needing_input(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Total number of bits consumed so far.
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }

    /// Number of bits that can still be read, buffered or not.
    pub fn available_bits(&self) -> usize {
        self.bits_in_buffer as usize + (self.input.len() - self.pos) * 8
    }

    /// Number of whole bytes that can still be read, buffered or not.
    pub fn available_bytes(&self) -> usize {
        self.available_bits() / 8
    }

    #[inline]
    fn refill(&mut self) {
        while self.bits_in_buffer <= 56 && self.pos < self.input.len() {
            self.buffer |= (self.input[self.pos] as u64) << self.bits_in_buffer;
            self.bits_in_buffer += 8;
            self.pos += 1;
        }
    }

    /// Peek at `count` bits (0-32) without consuming them.
    ///
    /// Returns `None` if fewer than `count` bits are available.
    #[inline]
    pub fn peek_bits(&mut self, count: u32) -> Option<u32> {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");
        if self.bits_in_buffer < count {
            self.refill();
            if self.bits_in_buffer < count {
                return None;
            }
        }
        let mask = (1u64 << count).wrapping_sub(1);
        Some((self.buffer & mask) as u32)
    }

    /// Peek at up to `max` bits, returning the value and how many bits it holds.
    ///
    /// Bits beyond the returned count are zero.
    #[inline]
    pub fn peek_available(&mut self, max: u32) -> (u32, u32) {
        debug_assert!(max <= 32);
        if self.bits_in_buffer < max {
            self.refill();
        }
        let count = self.bits_in_buffer.min(max);
        let mask = (1u64 << count).wrapping_sub(1);
        ((self.buffer & mask) as u32, count)
    }

    /// Consume `count` bits previously returned by a peek.
    #[inline]
    pub fn drop_bits(&mut self, count: u32) {
        debug_assert!(count <= self.bits_in_buffer, "dropping unpeeked bits");
        self.buffer >>= count;
        self.bits_in_buffer -= count;
        self.total_bits_read += count as u64;
    }

    /// Read `count` bits (0-32), or `None` without consuming anything.
    #[inline]
    pub fn get_bits(&mut self, count: u32) -> Option<u32> {
        let value = self.peek_bits(count)?;
        self.drop_bits(count);
        Some(value)
    }

    /// Discard bits up to the next byte boundary.
    pub fn skip_to_byte_boundary(&mut self) {
        let remainder = self.bits_in_buffer % 8;
        self.drop_bits(remainder);
    }

    /// Copy whole bytes into `out`, returning how many were copied.
    ///
    /// The reader must be byte aligned.
    pub fn copy_bytes(&mut self, out: &mut [u8]) -> usize {
        debug_assert_eq!(self.bits_in_buffer % 8, 0, "reader is not byte aligned");

        let mut copied = 0;
        while self.bits_in_buffer >= 8 && copied < out.len() {
            out[copied] = (self.buffer & 0xFF) as u8;
            self.drop_bits(8);
            copied += 1;
        }

        let direct = (out.len() - copied).min(self.input.len() - self.pos);
        out[copied..copied + direct].copy_from_slice(&self.input[self.pos..self.pos + direct]);
        self.pos += direct;
        self.total_bits_read += direct as u64 * 8;
        copied + direct
    }

    /// Drop all buffered state.
    pub fn reset(&mut self) {
        self.input.clear();
        self.pos = 0;
        self.buffer = 0;
        self.bits_in_buffer = 0;
        self.total_bits_read = 0;
    }
}

/// Encoder-side output accumulator.
///
/// Bits are packed LSB-first into whole bytes that wait here until the caller
/// drains them with [`flush_into`](Self::flush_into). Fewer than eight bits
/// are ever left in the bit accumulator after a write.
#[derive(Debug)]
pub struct PendingBuffer {
    /// Completed bytes.
    buf: Vec<u8>,
    /// First byte not yet handed to the caller.
    start: usize,
    /// Bit accumulator (LSB-first).
    bit_buf: u64,
    /// Number of valid bits in the accumulator.
    bit_count: u32,
}

impl PendingBuffer {
    /// Initial capacity, large enough for one maximal stored block.
    pub const DEFAULT_CAPACITY: usize = 1 << 16;

    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an empty buffer with the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            start: 0,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    /// Append `count` bits (0-32) of `value`, LSB-first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");
        let mask = (1u64 << count).wrapping_sub(1);
        self.bit_buf |= (value as u64 & mask) << self.bit_count;
        self.bit_count += count;
        while self.bit_count >= 8 {
            self.buf.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Append a little-endian 16-bit value. The buffer must be byte aligned.
    pub fn write_u16(&mut self, value: u16) {
        debug_assert_eq!(self.bit_count, 0);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a big-endian 16-bit value. The buffer must be byte aligned.
    pub fn write_u16_msb(&mut self, value: u16) {
        debug_assert_eq!(self.bit_count, 0);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Append raw bytes. The buffer must be byte aligned.
    pub fn write_bytes(&mut self, data: &[u8]) {
        debug_assert_eq!(self.bit_count, 0);
        self.buf.extend_from_slice(data);
    }

    /// Pad the partial byte with zero bits.
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            self.buf.push(self.bit_buf as u8);
        }
        self.bit_buf = 0;
        self.bit_count = 0;
    }

    /// Number of bits in the partial byte.
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Number of completed bytes waiting to be drained.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.start
    }

    /// True when no completed bytes are waiting. A partial byte may remain.
    pub fn is_flushed(&self) -> bool {
        self.pending() == 0
    }

    /// Move completed bytes into `out`, oldest first. Returns the count moved.
    pub fn flush_into(&mut self, out: &mut [u8]) -> usize {
        let len = self.pending().min(out.len());
        out[..len].copy_from_slice(&self.buf[self.start..self.start + len]);
        self.start += len;
        if self.start == self.buf.len() {
            self.buf.clear();
            self.start = 0;
        }
        len
    }

    /// Drop all pending output, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.start = 0;
        self.bit_buf = 0;
        self.bit_count = 0;
    }
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
