//! Deflate engine: input intake, match/literal decisions, block sequencing.
//!
//! Each compression level selects one of three policies:
//!
//! - **Stored** (level 0): input is copied into stored blocks.
//! - **Fast** (levels 1-3): greedy matching, every match found is taken.
//! - **Slow** (levels 4-9): lazy matching, a match is held back for one
//!   position in case the next position starts a longer one.
//!
//! The engine only produces bits into the block writer's pending buffer;
//! draining them and stream framing belong to [`crate::deflate::Deflater`].

use crate::block::{BlockWriter, MAX_STORED_BLOCK};
use crate::lz77::{MAX_DIST, MIN_LOOKAHEAD, Match, MatchFinder, SearchParams, WSIZE};
use crate::tables::MIN_MATCH;
use log::{debug, trace};
use oxiflate_core::bitstream::PendingBuffer;
use oxiflate_core::checksum::Adler32;
use oxiflate_core::error::{OxiFlateError, Result};
use oxiflate_core::traits::{CompressionLevel, DeflateStrategy};

/// Length-3 matches farther back than this are not worth a back-reference.
const TOO_FAR: usize = 4096;

/// Longest match the lazy policy still filters under [`DeflateStrategy::Filtered`].
const FILTERED_MAX_LENGTH: usize = 5;

/// Literal/match decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFunction {
    /// Stored blocks only.
    Stored,
    /// Greedy matching.
    Fast,
    /// Lazy matching.
    Slow,
}

/// Tuning for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Reduce the chain budget once a match this long is in hand.
    pub good_length: u16,
    /// Fast: insert every position of matches up to this length.
    /// Slow: do not look for a longer match past this length.
    pub max_lazy: u16,
    /// Stop searching at a match this long.
    pub nice_length: u16,
    /// Maximum hash chain links followed per search.
    pub max_chain: u16,
    /// Policy used at this level.
    pub func: CompressionFunction,
}

const fn config(
    good_length: u16,
    max_lazy: u16,
    nice_length: u16,
    max_chain: u16,
    func: CompressionFunction,
) -> CompressionConfig {
    CompressionConfig {
        good_length,
        max_lazy,
        nice_length,
        max_chain,
        func,
    }
}

/// Per-level tuning, indexed by level 0-9.
pub const COMPRESSION_CONFIGS: [CompressionConfig; 10] = [
    config(0, 0, 0, 0, CompressionFunction::Stored),
    config(4, 4, 8, 4, CompressionFunction::Fast),
    config(4, 5, 16, 8, CompressionFunction::Fast),
    config(4, 6, 32, 32, CompressionFunction::Fast),
    config(4, 4, 16, 16, CompressionFunction::Slow),
    config(8, 16, 32, 32, CompressionFunction::Slow),
    config(8, 16, 128, 128, CompressionFunction::Slow),
    config(8, 32, 128, 256, CompressionFunction::Slow),
    config(32, 128, 258, 1024, CompressionFunction::Slow),
    config(32, 258, 258, 4096, CompressionFunction::Slow),
];

impl CompressionConfig {
    /// Tuning for `level`.
    pub fn for_level(level: CompressionLevel) -> Self {
        COMPRESSION_CONFIGS[level.level() as usize]
    }

    fn search_params(&self) -> SearchParams {
        SearchParams {
            good_length: self.good_length as usize,
            nice_length: self.nice_length as usize,
            max_chain: self.max_chain as usize,
        }
    }
}

/// What the lazy policy holds for the byte just behind `strstart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lazy {
    /// Nothing undecided.
    Idle,
    /// The byte has no usable match and becomes a literal.
    Literal,
    /// The byte starts this match, unless the next position beats it.
    Match(Match),
}

/// The compressor core shared by every framing.
#[derive(Debug)]
pub struct DeflaterEngine {
    finder: MatchFinder,
    blocks: BlockWriter,
    config: CompressionConfig,
    strategy: DeflateStrategy,
    lazy: Lazy,
    /// Window position where the current block's raw bytes start. Negative
    /// once the start has been slid out of the window.
    block_start: isize,
    input: Vec<u8>,
    input_pos: usize,
    adler: Adler32,
    total_in: u64,
}

impl DeflaterEngine {
    /// Create an engine for `level` and `strategy`.
    pub fn new(level: CompressionLevel, strategy: DeflateStrategy) -> Self {
        let config = CompressionConfig::for_level(level);
        Self {
            finder: MatchFinder::new(config.search_params()),
            blocks: BlockWriter::new(),
            config,
            strategy,
            lazy: Lazy::Idle,
            block_start: 1,
            input: Vec::new(),
            input_pos: 0,
            adler: Adler32::new(),
            total_in: 0,
        }
    }

    /// Return to the initial state, keeping level and strategy.
    pub fn reset(&mut self) {
        self.finder.reset();
        self.blocks.reset();
        self.lazy = Lazy::Idle;
        self.block_start = 1;
        self.input.clear();
        self.input_pos = 0;
        self.adler.reset();
        self.total_in = 0;
    }

    /// Adler-32 of all input taken so far.
    pub fn adler(&self) -> u32 {
        self.adler.value()
    }

    /// Number of input bytes taken so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Pending compressed output.
    pub fn pending(&mut self) -> &mut PendingBuffer {
        self.blocks.pending()
    }

    /// Read-only view of the pending output.
    pub fn pending_ref(&self) -> &PendingBuffer {
        self.blocks.pending_ref()
    }

    /// Supply the next input chunk.
    pub fn set_input(&mut self, data: &[u8]) -> Result<()> {
        if !self.needs_input() {
            return Err(OxiFlateError::input_not_consumed(
                self.input.len() - self.input_pos,
            ));
        }
        self.input.clear();
        self.input.extend_from_slice(data);
        self.input_pos = 0;
        Ok(())
    }

    /// True when every supplied input byte has been taken into the window.
    pub fn needs_input(&self) -> bool {
        self.input_pos == self.input.len()
    }

    /// Load a preset dictionary. Must precede all input.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) {
        self.finder.set_dictionary(dictionary);
        self.block_start = self.finder.strstart as isize;
    }

    /// Change the policy knobs. A change of compression function first
    /// flushes the bytes already decided under the old one.
    pub fn set_level(&mut self, level: CompressionLevel) {
        let config = CompressionConfig::for_level(level);
        if config.func != self.config.func {
            debug!(
                "switching compression function {:?} -> {:?}",
                self.config.func, config.func
            );
            match self.config.func {
                CompressionFunction::Stored => {
                    let start = self.block_start as usize;
                    if self.finder.strstart > start {
                        let stored = &self.finder.window()[start..self.finder.strstart];
                        self.blocks.flush_stored_block(stored, false);
                        self.block_start = self.finder.strstart as isize;
                    }
                    if self.finder.lookahead >= MIN_MATCH - 1 {
                        self.finder.update_hash();
                    }
                }
                CompressionFunction::Fast => self.flush_pending_block(false),
                CompressionFunction::Slow => {
                    if self.lazy != Lazy::Idle {
                        let literal = self.finder.byte_at(self.finder.strstart - 1);
                        self.blocks.tally_lit(literal);
                    }
                    self.lazy = Lazy::Idle;
                    self.flush_pending_block(false);
                }
            }
        }
        self.config = config;
        self.finder.set_params(config.search_params());
    }

    /// Change the match-selection strategy.
    pub fn set_strategy(&mut self, strategy: DeflateStrategy) {
        self.strategy = strategy;
    }

    /// Forget match history so no later match reaches back past this point.
    pub fn clear_hash(&mut self) {
        self.finder.clear_hash();
    }

    /// Write an empty stored block, leaving the output byte-aligned.
    pub fn write_sync_marker(&mut self) {
        self.blocks.flush_stored_block(&[], false);
    }

    /// Run the current policy until it needs more input or has produced
    /// output.
    ///
    /// `flush` forces all taken input out as blocks once the supplied input
    /// is exhausted; `finish` makes the final block the last one. Returns
    /// false when no further progress is possible without more input (or,
    /// when finishing, once the last block has been written).
    pub fn deflate(&mut self, flush: bool, finish: bool) -> bool {
        loop {
            self.fill_window();
            let can_flush = flush && self.needs_input();
            let progress = match self.config.func {
                CompressionFunction::Stored => self.deflate_stored(can_flush, finish),
                CompressionFunction::Fast => self.deflate_fast(can_flush, finish),
                CompressionFunction::Slow => self.deflate_slow(can_flush, finish),
            };
            if !(progress && self.blocks.pending_ref().is_flushed()) {
                return progress;
            }
        }
    }

    fn fill_window(&mut self) {
        if self.finder.needs_slide() {
            self.slide_window();
        }

        if self.finder.lookahead < MIN_LOOKAHEAD && !self.needs_input() {
            let rest = &self.input[self.input_pos..];
            let taken = self.finder.fill_from(rest);
            self.adler.update(&rest[..taken]);
            self.input_pos += taken;
            self.total_in += taken as u64;
        }

        if self.finder.lookahead >= MIN_MATCH {
            self.finder.update_hash();
        }
    }

    fn slide_window(&mut self) {
        trace!("sliding window at {}", self.finder.strstart);
        self.finder.slide_window();
        self.block_start -= WSIZE as isize;
    }

    /// Flush the tallied symbols as one block covering everything decided.
    fn flush_pending_block(&mut self, last: bool) {
        let len = (self.finder.strstart as isize - self.block_start) as usize
            - (self.lazy != Lazy::Idle) as usize;
        if len == 0 && !last {
            return;
        }
        let stored = usize::try_from(self.block_start)
            .ok()
            .map(|start| &self.finder.window()[start..start + len]);
        self.blocks.flush_block(stored, last);
        self.block_start += len as isize;
    }

    /// Candidate for the match finder at `strstart`, or `None` if matching is
    /// off or the chain head is out of reach.
    fn search(&self, head: usize, prev_length: usize) -> Option<Match> {
        if head == 0
            || self.strategy == DeflateStrategy::HuffmanOnly
            || self.finder.strstart - head > MAX_DIST
        {
            return None;
        }
        self.finder.find_longest_match(head, prev_length)
    }

    fn deflate_stored(&mut self, flush: bool, finish: bool) -> bool {
        if !flush && self.finder.lookahead == 0 {
            return false;
        }

        self.finder.consume_lookahead();
        let mut stored_len = (self.finder.strstart as isize - self.block_start) as usize;

        if stored_len >= MAX_STORED_BLOCK
            || (self.block_start < WSIZE as isize && stored_len >= MAX_DIST)
            || flush
        {
            let mut last = finish && flush;
            if stored_len > MAX_STORED_BLOCK {
                stored_len = MAX_STORED_BLOCK;
                last = false;
            }
            if stored_len == 0 && !last {
                return false;
            }

            let start = self.block_start as usize;
            self.blocks
                .flush_stored_block(&self.finder.window()[start..start + stored_len], last);
            self.block_start += stored_len as isize;
            return !last;
        }

        true
    }

    fn deflate_fast(&mut self, flush: bool, finish: bool) -> bool {
        if self.finder.lookahead < MIN_LOOKAHEAD && !flush {
            return false;
        }

        while self.finder.lookahead >= MIN_LOOKAHEAD || flush {
            if self.finder.lookahead == 0 {
                self.flush_pending_block(finish);
                return false;
            }

            if self.finder.needs_slide() {
                self.slide_window();
            }

            let found = if self.finder.lookahead >= MIN_MATCH {
                let head = self.finder.insert_string();
                self.search(head, MIN_MATCH - 1)
            } else {
                None
            };

            match found {
                Some(m) => {
                    self.blocks.tally_dist(m.distance, m.length);
                    self.finder.lookahead -= m.length;
                    if m.length <= self.config.max_lazy as usize
                        && self.finder.lookahead >= MIN_MATCH
                    {
                        for _ in 1..m.length {
                            self.finder.strstart += 1;
                            self.finder.insert_string();
                        }
                        self.finder.strstart += 1;
                    } else {
                        self.finder.strstart += m.length;
                        if self.finder.lookahead >= MIN_MATCH - 1 {
                            self.finder.update_hash();
                        }
                    }
                }
                None => {
                    let literal = self.finder.byte_at(self.finder.strstart);
                    self.blocks.tally_lit(literal);
                    self.finder.advance();
                }
            }

            if self.blocks.is_full() {
                let last = finish && self.finder.lookahead == 0;
                self.flush_pending_block(last);
                return !last;
            }
        }

        true
    }

    fn deflate_slow(&mut self, flush: bool, finish: bool) -> bool {
        if self.finder.lookahead < MIN_LOOKAHEAD && !flush {
            return false;
        }

        while self.finder.lookahead >= MIN_LOOKAHEAD || flush {
            if self.finder.lookahead == 0 {
                // A held match always leaves lookahead behind it.
                debug_assert!(!matches!(self.lazy, Lazy::Match(_)));
                if self.lazy != Lazy::Idle {
                    let literal = self.finder.byte_at(self.finder.strstart - 1);
                    self.blocks.tally_lit(literal);
                }
                self.lazy = Lazy::Idle;
                self.flush_pending_block(finish);
                return false;
            }

            if self.finder.needs_slide() {
                self.slide_window();
            }

            let prev_length = match self.lazy {
                Lazy::Match(m) => m.length,
                _ => MIN_MATCH - 1,
            };

            let mut current = None;
            if self.finder.lookahead >= MIN_MATCH {
                let head = self.finder.insert_string();
                if prev_length < self.config.max_lazy as usize {
                    current = self.search(head, prev_length);
                }
                current = current.filter(|m| {
                    let weak = self.strategy == DeflateStrategy::Filtered
                        || (m.length == MIN_MATCH && m.distance > TOO_FAR);
                    m.length > FILTERED_MAX_LENGTH || !weak
                });
            }

            match (self.lazy, current) {
                (Lazy::Match(m), None) => {
                    // The held match wins; hash the rest of it and skip it.
                    self.blocks.tally_dist(m.distance, m.length);
                    for _ in 0..m.length - 2 {
                        self.finder.advance();
                        if self.finder.lookahead >= MIN_MATCH {
                            self.finder.insert_string();
                        }
                    }
                    self.finder.advance();
                    self.lazy = Lazy::Idle;
                }
                (held, current) => {
                    if held != Lazy::Idle {
                        let literal = self.finder.byte_at(self.finder.strstart - 1);
                        self.blocks.tally_lit(literal);
                    }
                    self.lazy = current.map_or(Lazy::Literal, Lazy::Match);
                    self.finder.advance();
                }
            }

            if self.blocks.is_full() {
                let last = finish && self.finder.lookahead == 0 && self.lazy == Lazy::Idle;
                self.flush_pending_block(last);
                return !last;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;

    fn run(level: u8, strategy: DeflateStrategy, data: &[u8]) -> Vec<u8> {
        let mut engine = DeflaterEngine::new(CompressionLevel::new(level), strategy);
        let mut out = Vec::new();
        for chunk in data.chunks(10_000) {
            engine.set_input(chunk).unwrap();
            while engine.deflate(false, false) {
                drain(&mut engine, &mut out);
            }
            drain(&mut engine, &mut out);
        }
        while engine.deflate(true, true) {
            drain(&mut engine, &mut out);
        }
        engine.pending().align_to_byte();
        drain(&mut engine, &mut out);
        out
    }

    fn drain(engine: &mut DeflaterEngine, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4096];
        loop {
            let n = engine.pending().flush_into(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        let text = b"the quick brown fox jumps over the lazy dog; ";
        (0..len)
            .map(|i| text[i % text.len()] ^ ((i / 997) as u8 & 1))
            .collect()
    }

    #[test]
    fn test_search_never_reaches_past_max_dist() {
        let mut data = b"0123456789".to_vec();
        data.resize(MAX_DIST + 10, b'z');
        data.extend_from_slice(b"0123456789");

        let mut engine = DeflaterEngine::new(CompressionLevel::BEST, DeflateStrategy::Default);
        let finder = &mut engine.finder;
        finder.fill_from(&data);
        finder.update_hash();
        while finder.strstart < MAX_DIST + 11 {
            finder.insert_string();
            finder.advance();
        }
        let head = finder.insert_string();
        assert_eq!(head, 1);
        // The chain still links the old copy; the engine must not use it.
        assert!(finder.find_longest_match(head, 0).is_some());
        assert_eq!(engine.search(head, 0), None);
    }

    #[test]
    fn test_config_table() {
        for level in 0..=9u8 {
            let config = CompressionConfig::for_level(CompressionLevel::new(level));
            let expected = match level {
                0 => CompressionFunction::Stored,
                1..=3 => CompressionFunction::Fast,
                _ => CompressionFunction::Slow,
            };
            assert_eq!(config.func, expected, "level {}", level);
            assert!(config.nice_length as usize <= crate::tables::MAX_MATCH);
        }
    }

    #[test]
    fn test_every_level_roundtrips() {
        let data = sample(3 * WSIZE + 123);
        for level in 0..=9 {
            let compressed = run(level, DeflateStrategy::Default, &data);
            assert_eq!(inflate(&compressed).unwrap(), data, "level {}", level);
        }
    }

    #[test]
    fn test_strategies_roundtrip() {
        let data = sample(50_000);
        for strategy in [DeflateStrategy::Filtered, DeflateStrategy::HuffmanOnly] {
            let compressed = run(6, strategy, &data);
            assert_eq!(inflate(&compressed).unwrap(), data, "{:?}", strategy);
        }
    }

    #[test]
    fn test_huffman_only_is_worse_on_repeats() {
        let data = sample(20_000);
        let matched = run(6, DeflateStrategy::Default, &data);
        let literal = run(6, DeflateStrategy::HuffmanOnly, &data);
        assert!(matched.len() < literal.len());
    }

    #[test]
    fn test_level_switch_mid_stream() {
        let data = sample(100_000);
        let mut engine = DeflaterEngine::new(CompressionLevel::new(0), DeflateStrategy::Default);
        let mut out = Vec::new();
        for (i, chunk) in data.chunks(7_000).enumerate() {
            engine.set_level(CompressionLevel::new((i % 10) as u8));
            engine.set_input(chunk).unwrap();
            while engine.deflate(false, false) {
                drain(&mut engine, &mut out);
            }
            drain(&mut engine, &mut out);
        }
        while engine.deflate(true, true) {
            drain(&mut engine, &mut out);
        }
        engine.pending().align_to_byte();
        drain(&mut engine, &mut out);

        assert_eq!(inflate(&out).unwrap(), data);
        assert_eq!(engine.total_in(), data.len() as u64);
        assert_eq!(engine.adler(), Adler32::checksum(&data));
    }

    #[test]
    fn test_stored_finish_with_input_queued() {
        let data = sample(2 * MAX_STORED_BLOCK + 99);
        let mut engine = DeflaterEngine::new(CompressionLevel::NONE, DeflateStrategy::Default);
        let mut out = Vec::new();
        engine.set_input(&data).unwrap();
        while engine.deflate(true, true) {
            drain(&mut engine, &mut out);
        }
        engine.pending().align_to_byte();
        drain(&mut engine, &mut out);

        assert!(engine.needs_input());
        assert_eq!(inflate(&out).unwrap(), data);
        assert_eq!(engine.total_in(), data.len() as u64);
    }

    #[test]
    fn test_set_input_before_consumed() {
        let mut engine = DeflaterEngine::new(CompressionLevel::DEFAULT, DeflateStrategy::Default);
        engine.set_input(&[0u8; 1000]).unwrap();
        assert!(matches!(
            engine.set_input(b"more"),
            Err(OxiFlateError::InputNotConsumed { .. })
        ));
    }
}
