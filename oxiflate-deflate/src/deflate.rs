//! DEFLATE compression (RFC 1951), optionally zlib-framed (RFC 1950).
//!
//! [`Deflater`] is a push-style streaming encoder: the caller supplies input
//! with [`Deflater::set_input`], drains output with [`Deflater::deflate`],
//! and ends the stream with [`Deflater::finish`].

use crate::engine::DeflaterEngine;
use crate::zlib;
use log::debug;
use oxiflate_core::checksum::Adler32;
use oxiflate_core::error::{OxiFlateError, Result};
use oxiflate_core::traits::{
    CompressStatus, CompressionLevel, Compressor, DeflateStrategy, FlushMode, Format,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Busy,
    Flushing { full: bool },
    Finishing,
    Finished,
}

/// Streaming DEFLATE compressor.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::{Deflater, inflate};
///
/// let mut deflater = Deflater::new(6);
/// deflater.set_input(b"hello hello hello hello").unwrap();
/// deflater.finish();
///
/// let mut out = vec![0u8; 64];
/// let n = deflater.deflate(&mut out).unwrap();
/// assert!(deflater.is_finished());
/// assert_eq!(inflate(&out[..n]).unwrap(), b"hello hello hello hello");
/// ```
#[derive(Debug)]
pub struct Deflater {
    engine: DeflaterEngine,
    format: Format,
    level: CompressionLevel,
    strategy: DeflateStrategy,
    stage: Stage,
    /// Set once the first output call has happened (and the zlib header,
    /// if any, is written).
    started: bool,
    dictionary_id: Option<u32>,
    total_out: u64,
}

impl Deflater {
    /// Create a raw DEFLATE compressor with the given level (0-9, clamped).
    pub fn new(level: u8) -> Self {
        Self::with_format(level, Format::Raw)
    }

    /// Create a zlib-framed compressor with the given level (0-9, clamped).
    pub fn zlib(level: u8) -> Self {
        Self::with_format(level, Format::Zlib)
    }

    /// Create a compressor with explicit framing.
    pub fn with_format(level: u8, format: Format) -> Self {
        let level = CompressionLevel::new(level);
        let strategy = DeflateStrategy::default();
        Self {
            engine: DeflaterEngine::new(level, strategy),
            format,
            level,
            strategy,
            stage: Stage::Busy,
            started: false,
            dictionary_id: None,
            total_out: 0,
        }
    }

    /// Reset to compress a new stream with the same settings.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.stage = Stage::Busy;
        self.started = false;
        self.dictionary_id = None;
        self.total_out = 0;
    }

    /// Stream framing.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Current compression level.
    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Supply the next chunk of input.
    ///
    /// The previous chunk must have been taken completely (see
    /// [`needs_input`](Self::needs_input)), and the stream must not be
    /// finishing.
    pub fn set_input(&mut self, data: &[u8]) -> Result<()> {
        if matches!(self.stage, Stage::Finishing | Stage::Finished) {
            return Err(OxiFlateError::invalid_state("input supplied after finish"));
        }
        self.engine.set_input(data)
    }

    /// True when all supplied input has been taken.
    pub fn needs_input(&self) -> bool {
        self.engine.needs_input()
    }

    /// Request a flush. The flush takes effect in later
    /// [`deflate`](Self::deflate) calls, once all supplied input is taken.
    pub fn flush(&mut self, mode: FlushMode) {
        match mode {
            FlushMode::None => {}
            FlushMode::Sync | FlushMode::Full if self.stage == Stage::Busy => {
                self.stage = Stage::Flushing {
                    full: mode == FlushMode::Full,
                };
            }
            FlushMode::Sync | FlushMode::Full => {}
            FlushMode::Finish => self.finish(),
        }
    }

    /// End the stream once all supplied input is compressed.
    pub fn finish(&mut self) {
        if self.stage != Stage::Finished {
            self.stage = Stage::Finishing;
        }
    }

    /// True once the stream is complete and all output has been drained.
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished && self.engine.pending_ref().pending() == 0
    }

    /// Change the compression level. Takes effect for the following input.
    pub fn set_level(&mut self, level: u8) {
        let level = CompressionLevel::new(level);
        if level != self.level {
            self.level = level;
            self.engine.set_level(level);
        }
    }

    /// Change the match-selection strategy.
    pub fn set_strategy(&mut self, strategy: DeflateStrategy) {
        self.strategy = strategy;
        self.engine.set_strategy(strategy);
    }

    /// Current strategy.
    pub fn strategy(&self) -> DeflateStrategy {
        self.strategy
    }

    /// Preload a preset dictionary.
    ///
    /// Only allowed before the first call to [`deflate`](Self::deflate). In
    /// zlib format the header then carries the dictionary's Adler-32.
    ///
    /// # Returns
    ///
    /// The Adler-32 of the dictionary.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<u32> {
        if self.started || self.total_in() > 0 {
            return Err(OxiFlateError::invalid_state(
                "dictionary must be set before compression starts",
            ));
        }
        let id = Adler32::checksum(dictionary);
        self.engine.set_dictionary(dictionary);
        self.dictionary_id = Some(id);
        Ok(id)
    }

    /// Adler-32 of all input taken so far (the dictionary excluded).
    pub fn adler(&self) -> u32 {
        self.engine.adler()
    }

    /// Number of input bytes taken so far.
    pub fn total_in(&self) -> u64 {
        self.engine.total_in()
    }

    /// Number of compressed bytes handed out so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Compress into `output`, returning the number of bytes written.
    ///
    /// Returns fewer bytes than `output` holds only when more input is
    /// needed or the stream is finished.
    pub fn deflate(&mut self, output: &mut [u8]) -> Result<usize> {
        if output.is_empty() {
            return Err(OxiFlateError::buffer_too_small(1, 0));
        }

        if !self.started {
            self.started = true;
            if self.format == Format::Zlib {
                let header = zlib::header(self.level, self.dictionary_id.is_some());
                debug!("zlib header {:#06x}", header);
                let pending = self.engine.pending();
                pending.write_u16_msb(header);
                if let Some(id) = self.dictionary_id {
                    pending.write_u16_msb((id >> 16) as u16);
                    pending.write_u16_msb(id as u16);
                }
            }
        }

        let mut written = 0;
        loop {
            written += self.engine.pending().flush_into(&mut output[written..]);
            if written == output.len() || self.stage == Stage::Finished {
                break;
            }

            let flushing = self.stage != Stage::Busy;
            let finishing = self.stage == Stage::Finishing;
            if self.engine.deflate(flushing, finishing) {
                continue;
            }

            match self.stage {
                Stage::Busy => break,
                Stage::Flushing { full } => {
                    self.engine.write_sync_marker();
                    if full {
                        self.engine.clear_hash();
                    }
                    self.stage = Stage::Busy;
                }
                Stage::Finishing => {
                    let pending = self.engine.pending();
                    pending.align_to_byte();
                    if self.format == Format::Zlib {
                        let adler = self.engine.adler();
                        let pending = self.engine.pending();
                        pending.write_u16_msb((adler >> 16) as u16);
                        pending.write_u16_msb(adler as u16);
                    }
                    debug!(
                        "deflate finished: {} bytes in, adler {:#010x}",
                        self.engine.total_in(),
                        self.engine.adler()
                    );
                    self.stage = Stage::Finished;
                }
                Stage::Finished => break,
            }
        }

        self.total_out += written as u64;
        Ok(written)
    }

    /// Compress all of `data` and finish the stream.
    pub fn compress_to_vec(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.compress_all(data)
    }
}

impl Default for Deflater {
    fn default() -> Self {
        Self::new(CompressionLevel::DEFAULT.level())
    }
}

impl Compressor for Deflater {
    /// Takes all of `input` at once if the previous input is used up.
    ///
    /// A `Sync` or `Full` flush applies to the input taken by the same call.
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        if self.is_finished() {
            return Ok((0, 0, CompressStatus::Done));
        }

        let mut consumed = 0;
        if !input.is_empty() && self.needs_input() {
            self.set_input(input)?;
            consumed = input.len();
        }

        match flush {
            FlushMode::Finish => self.finish(),
            FlushMode::Sync | FlushMode::Full if consumed > 0 => self.flush(flush),
            _ => {}
        }

        let produced = self.deflate(output)?;
        let status = if self.is_finished() {
            CompressStatus::Done
        } else if produced == output.len() {
            CompressStatus::NeedsOutput
        } else {
            CompressStatus::NeedsInput
        };

        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        Deflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        Deflater::is_finished(self)
    }
}

/// Compress data using raw DEFLATE.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut deflater = Deflater::new(level);
    deflater.compress_to_vec(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;

    #[test]
    fn test_deflate_stored() {
        let input = b"Hello, World!";
        let compressed = deflate(input, 0).unwrap();

        // One final stored block: header, LEN, NLEN, payload.
        assert_eq!(compressed.len(), 1 + 4 + input.len());
        assert_eq!(compressed[0], 0x01);
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_deflate_compressed() {
        let input = b"AAAAAAAAAABBBBBBBBBBCCCCCCCCCC";
        let compressed = deflate(input, 6).unwrap();

        assert!(
            compressed.len() < input.len(),
            "Compressed {} bytes to {} bytes",
            input.len(),
            compressed.len()
        );
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_deflate_empty() {
        for level in [0, 1, 6, 9] {
            let compressed = deflate(b"", level).unwrap();
            assert!(!compressed.is_empty());
            assert!(inflate(&compressed).unwrap().is_empty());
        }
        // Empty fixed block: BFINAL=1, BTYPE=01, EOB.
        assert_eq!(deflate(b"", 6).unwrap(), [0x03, 0x00]);
    }

    #[test]
    fn test_deflate_roundtrip() {
        let inputs = [
            b"Hello".to_vec(),
            b"The quick brown fox jumps over the lazy dog".to_vec(),
            vec![0u8; 1000],
            (0..=255).collect::<Vec<u8>>(),
        ];

        for input in &inputs {
            for level in [0, 1, 6, 9] {
                let compressed = deflate(input, level).unwrap();
                let decompressed = inflate(&compressed).unwrap();
                assert_eq!(
                    &decompressed,
                    input,
                    "Roundtrip failed for level {} with {} bytes",
                    level,
                    input.len()
                );
            }
        }
    }

    #[test]
    fn test_small_output_buffer() {
        let input: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        let mut deflater = Deflater::new(6);
        deflater.set_input(&input).unwrap();
        deflater.finish();

        let mut compressed = Vec::new();
        let mut buf = [0u8; 7];
        while !deflater.is_finished() {
            let n = deflater.deflate(&mut buf).unwrap();
            compressed.extend_from_slice(&buf[..n]);
        }

        assert_eq!(deflater.total_out(), compressed.len() as u64);
        assert_eq!(deflater.total_in(), input.len() as u64);
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_sync_flush_marker() {
        let mut deflater = Deflater::new(6);
        deflater.set_input(b"partial message").unwrap();
        deflater.flush(FlushMode::Sync);

        let mut out = vec![0u8; 256];
        let n = deflater.deflate(&mut out).unwrap();
        assert_eq!(&out[n - 4..n], &[0x00, 0x00, 0xFF, 0xFF]);
        assert!(!deflater.is_finished());
    }

    #[test]
    fn test_input_after_finish_rejected() {
        let mut deflater = Deflater::new(6);
        deflater.finish();
        assert!(matches!(
            deflater.set_input(b"late"),
            Err(OxiFlateError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_empty_output_rejected() {
        let mut deflater = Deflater::new(6);
        assert!(matches!(
            deflater.deflate(&mut []),
            Err(OxiFlateError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_dictionary_after_start_rejected() {
        let mut deflater = Deflater::new(6);
        let mut out = [0u8; 16];
        deflater.deflate(&mut out).unwrap();
        assert!(deflater.set_dictionary(b"dictionary").is_err());
    }

    #[test]
    fn test_zlib_framing() {
        let mut deflater = Deflater::zlib(6);
        let compressed = deflater.compress_to_vec(b"abc").unwrap();
        assert_eq!(&compressed[..2], &[0x78, 0x9C]);
        let trailer = &compressed[compressed.len() - 4..];
        assert_eq!(trailer, Adler32::checksum(b"abc").to_be_bytes());
    }

    #[test]
    fn test_compressor_trait() {
        let input = b"streaming through the trait, streaming through the trait";
        let mut deflater = Deflater::default();
        let compressed = deflater.compress_all(input).unwrap();
        assert!(Compressor::is_finished(&deflater));
        assert_eq!(inflate(&compressed).unwrap(), input);

        Compressor::reset(&mut deflater);
        assert_eq!(deflater.total_in(), 0);
        assert_eq!(deflater.compress_all(input).unwrap(), compressed);
    }
}
