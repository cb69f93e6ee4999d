//! Circular output window for DEFLATE decompression.
//!
//! The decoder writes literals and replays back-references into this window,
//! and the caller drains finished bytes from it. The same buffer serves as
//! history: a byte stays addressable by back-references after it has been
//! drained, until it is overwritten.

use crate::bitstream::BitReader;
use crate::error::{OxiFlateError, Result};

/// Window size for DEFLATE (32 KB).
pub const WINDOW_SIZE: usize = 1 << 15;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// A fixed 32 KB circular buffer holding decoded history and undrained output.
///
/// `filled` counts bytes written but not yet handed to the caller and can
/// never exceed [`WINDOW_SIZE`]. Writes that would break that bound fail with
/// [`OxiFlateError::WindowOverflow`] rather than overwrite undrained output.
#[derive(Debug, Clone)]
pub struct OutputWindow {
    window: Vec<u8>,
    /// Next write position.
    end: usize,
    /// Bytes written but not yet drained.
    filled: usize,
    /// Bytes addressable by back-references (capped at the window size).
    history: usize,
}

impl OutputWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            window: vec![0; WINDOW_SIZE],
            end: 0,
            filled: 0,
            history: 0,
        }
    }

    /// Append one literal byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.filled == WINDOW_SIZE {
            return Err(OxiFlateError::window_overflow(1, 0));
        }
        self.push(byte);
        Ok(())
    }

    #[inline]
    fn push(&mut self, byte: u8) {
        self.window[self.end] = byte;
        self.end = (self.end + 1) & WINDOW_MASK;
        self.filled += 1;
        if self.history < WINDOW_SIZE {
            self.history += 1;
        }
    }

    /// Replay `len` bytes starting `dist` bytes behind the write position.
    ///
    /// When `dist < len` the copy overlaps its own output and is performed
    /// byte by byte, which produces the repeating pattern DEFLATE expects.
    pub fn repeat(&mut self, len: usize, dist: usize) -> Result<()> {
        if dist == 0 || dist > self.history {
            return Err(OxiFlateError::invalid_distance(dist, self.history));
        }
        let free = self.free_space();
        if len > free {
            return Err(OxiFlateError::window_overflow(len, free));
        }

        let mut src = self.end.wrapping_sub(dist) & WINDOW_MASK;
        let dst = self.end;
        let wraps = src + len > WINDOW_SIZE || dst + len > WINDOW_SIZE;

        if dist < len || wraps {
            for _ in 0..len {
                let byte = self.window[src];
                self.push(byte);
                src = (src + 1) & WINDOW_MASK;
            }
        } else {
            self.window.copy_within(src..src + len, dst);
            self.end = (dst + len) & WINDOW_MASK;
            self.filled += len;
            self.history = (self.history + len).min(WINDOW_SIZE);
        }
        Ok(())
    }

    /// Copy up to `len` bytes of a stored block straight from the reader.
    ///
    /// Returns the number of bytes copied, limited by free space and by the
    /// input available.
    pub fn copy_stored(&mut self, input: &mut BitReader, len: usize) -> usize {
        let len = len.min(self.free_space()).min(input.available_bytes());
        let mut copied = 0;
        while copied < len {
            let chunk = (len - copied).min(WINDOW_SIZE - self.end);
            let got = input.copy_bytes(&mut self.window[self.end..self.end + chunk]);
            self.end = (self.end + got) & WINDOW_MASK;
            self.filled += got;
            self.history = (self.history + got).min(WINDOW_SIZE);
            copied += got;
            if got < chunk {
                break;
            }
        }
        copied
    }

    /// Preload history from a preset dictionary.
    ///
    /// Dictionary bytes are addressable by back-references but are never
    /// returned by [`copy_output`](Self::copy_output). Only the last
    /// [`WINDOW_SIZE`] bytes are kept.
    pub fn copy_dict(&mut self, dict: &[u8]) -> Result<()> {
        if self.filled > 0 || self.history > 0 {
            return Err(OxiFlateError::invalid_state(
                "dictionary must be set before any output",
            ));
        }
        let tail = &dict[dict.len().saturating_sub(WINDOW_SIZE)..];
        self.window[..tail.len()].copy_from_slice(tail);
        self.end = tail.len() & WINDOW_MASK;
        self.history = tail.len();
        Ok(())
    }

    /// Room left before undrained output would be overwritten.
    pub fn free_space(&self) -> usize {
        WINDOW_SIZE - self.filled
    }

    /// Bytes ready to be drained.
    pub fn available(&self) -> usize {
        self.filled
    }

    /// Drain up to `out.len()` bytes, oldest first. Returns the count copied.
    pub fn copy_output(&mut self, out: &mut [u8]) -> usize {
        let len = out.len().min(self.filled);
        let start = self.end.wrapping_sub(self.filled) & WINDOW_MASK;
        let first = len.min(WINDOW_SIZE - start);
        out[..first].copy_from_slice(&self.window[start..start + first]);
        out[first..len].copy_from_slice(&self.window[..len - first]);
        self.filled -= len;
        len
    }

    /// Forget all history and pending output, keeping the allocation.
    pub fn reset(&mut self) {
        self.end = 0;
        self.filled = 0;
        self.history = 0;
    }
}

impl Default for OutputWindow {
    fn default() -> Self {
        Self::new()
    }
}
