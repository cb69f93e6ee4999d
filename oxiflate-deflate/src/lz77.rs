//! LZ77 match finding for DEFLATE.
//!
//! The encoder keeps a sliding window of twice the DEFLATE history size.
//! Input is appended at the end of the lookahead; once the scan position
//! reaches the upper half, the upper half is slid down and every stored
//! position is rebased.
//!
//! # Hash chains
//!
//! Every 3-byte string that has been scanned is inserted into a hash table:
//! `head[h]` holds the most recent position with hash `h`, and
//! `prev[pos & WMASK]` links each position to the previous one with the same
//! hash. Position 0 is never inserted, so a chain entry of 0 means "none".

use crate::tables::{MAX_MATCH, MIN_MATCH};

/// DEFLATE history size (32 KB).
pub const WSIZE: usize = 1 << 15;

/// Mask for indexing `prev` by window position.
pub const WMASK: usize = WSIZE - 1;

const HASH_BITS: usize = 15;

/// Number of hash buckets.
pub const HASH_SIZE: usize = 1 << HASH_BITS;

const HASH_MASK: usize = HASH_SIZE - 1;

/// Shift per byte so that the hash covers exactly `MIN_MATCH` bytes.
const HASH_SHIFT: usize = HASH_BITS.div_ceil(MIN_MATCH);

/// Lookahead the match finder wants available before searching.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;

/// Farthest back a match may start.
pub const MAX_DIST: usize = WSIZE - MIN_LOOKAHEAD;

/// A token produced by LZ77 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back in the window (1-32768).
        distance: u16,
    },
}

/// A match found by [`MatchFinder::find_longest_match`].
///
/// The distance is relative to the position the search ran at, so a
/// pending match stays valid across a window slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Distance back from the search position.
    pub distance: usize,
    /// Match length (3-258).
    pub length: usize,
}

/// Search effort knobs for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Quarter the chain budget once a match this long is in hand.
    pub good_length: usize,
    /// Stop searching as soon as a match this long is found.
    pub nice_length: usize,
    /// Maximum number of chain links to follow.
    pub max_chain: usize,
}

/// Sliding window with hash chains.
#[derive(Debug)]
pub struct MatchFinder {
    window: Vec<u8>,
    head: Vec<u16>,
    prev: Vec<u16>,
    /// Rolling hash of the string at `strstart`.
    ins_h: usize,
    /// Current scan position.
    pub(crate) strstart: usize,
    /// Bytes available at and after `strstart`.
    pub(crate) lookahead: usize,
    params: SearchParams,
}

impl MatchFinder {
    /// Create an empty finder. The scan starts at position 1.
    pub fn new(params: SearchParams) -> Self {
        Self {
            window: vec![0; 2 * WSIZE],
            head: vec![0; HASH_SIZE],
            prev: vec![0; WSIZE],
            ins_h: 0,
            strstart: 1,
            lookahead: 0,
            params,
        }
    }

    /// Forget all history and buffered input.
    pub fn reset(&mut self) {
        self.clear_hash();
        self.prev.fill(0);
        self.ins_h = 0;
        self.strstart = 1;
        self.lookahead = 0;
    }

    /// Forget the hash chains so no later match can reach earlier data.
    pub fn clear_hash(&mut self) {
        self.head.fill(0);
    }

    /// Replace the search effort knobs.
    pub fn set_params(&mut self, params: SearchParams) {
        self.params = params;
    }

    /// The whole window.
    pub fn window(&self) -> &[u8] {
        &self.window
    }

    /// Byte at `pos`.
    #[inline]
    pub fn byte_at(&self, pos: usize) -> u8 {
        self.window[pos]
    }

    /// True when the scan position has reached the point where the window
    /// must slide before more input can be appended.
    pub fn needs_slide(&self) -> bool {
        self.strstart >= WSIZE + MAX_DIST
    }

    /// Move the upper half of the window down and rebase every position.
    pub fn slide_window(&mut self) {
        self.window.copy_within(WSIZE.., 0);
        self.strstart -= WSIZE;

        for entry in self.head.iter_mut().chain(self.prev.iter_mut()) {
            let pos = *entry as usize;
            *entry = if pos >= WSIZE { (pos - WSIZE) as u16 } else { 0 };
        }
    }

    /// Append input after the lookahead. Returns the number of bytes taken.
    pub fn fill_from(&mut self, input: &[u8]) -> usize {
        let end = self.strstart + self.lookahead;
        let n = (self.window.len() - end).min(input.len());
        self.window[end..end + n].copy_from_slice(&input[..n]);
        self.lookahead += n;
        n
    }

    /// Skip the lookahead without hashing it, as stored blocks do.
    pub fn consume_lookahead(&mut self) {
        self.strstart += self.lookahead;
        self.lookahead = 0;
    }

    /// Advance the scan position by one byte.
    #[inline]
    pub fn advance(&mut self) {
        self.strstart += 1;
        self.lookahead -= 1;
    }

    /// Prime the rolling hash from the two bytes at `strstart`.
    #[inline]
    pub fn update_hash(&mut self) {
        self.ins_h = ((self.window[self.strstart] as usize) << HASH_SHIFT)
            ^ self.window[self.strstart + 1] as usize;
    }

    /// Insert the string at `strstart` and return the previous chain head
    /// for its hash (0 when there is none).
    #[inline]
    pub fn insert_string(&mut self) -> usize {
        let next = self.window[self.strstart + MIN_MATCH - 1] as usize;
        self.ins_h = ((self.ins_h << HASH_SHIFT) ^ next) & HASH_MASK;
        let head = self.head[self.ins_h];
        self.prev[self.strstart & WMASK] = head;
        self.head[self.ins_h] = self.strstart as u16;
        head as usize
    }

    /// Load a preset dictionary at the scan position and hash all of it.
    ///
    /// Only the last [`MAX_DIST`] bytes are reachable, so only those are
    /// kept. Dictionaries shorter than a minimal match add nothing.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) {
        if dictionary.len() < MIN_MATCH {
            return;
        }
        let dictionary = &dictionary[dictionary.len().saturating_sub(MAX_DIST)..];

        let start = self.strstart;
        self.window[start..start + dictionary.len()].copy_from_slice(dictionary);
        self.update_hash();
        for _ in 0..dictionary.len() - (MIN_MATCH - 1) {
            self.insert_string();
            self.strstart += 1;
        }
        self.strstart += MIN_MATCH - 1;
    }

    /// Chain-walk from `cur_match` for a match at `strstart` strictly longer
    /// than `prev_length`.
    ///
    /// The search stops at the chain budget, at a match of `nice_length`
    /// bytes, or when the chain leaves the reachable history. Matches never
    /// extend past the lookahead.
    pub fn find_longest_match(&self, mut cur_match: usize, prev_length: usize) -> Option<Match> {
        let scan = self.strstart;
        let max_len = MAX_MATCH.min(self.lookahead);
        let mut best_len = prev_length.max(MIN_MATCH - 1);
        if best_len >= max_len {
            return None;
        }

        let mut chain = self.params.max_chain;
        if best_len >= self.params.good_length {
            chain >>= 2;
        }
        let nice = self.params.nice_length.min(self.lookahead);
        let limit = scan.saturating_sub(MAX_DIST);
        let window = &self.window;
        let mut best = None;

        loop {
            debug_assert!(cur_match < scan, "chain must point backwards");

            // A longer match must agree at the end of the current best.
            if window[cur_match + best_len] == window[scan + best_len]
                && window[cur_match + best_len - 1] == window[scan + best_len - 1]
                && window[cur_match] == window[scan]
                && window[cur_match + 1] == window[scan + 1]
            {
                let len = window[scan..scan + max_len]
                    .iter()
                    .zip(&window[cur_match..cur_match + max_len])
                    .take_while(|(a, b)| a == b)
                    .count();

                if len > best_len {
                    best_len = len;
                    best = Some(Match {
                        distance: scan - cur_match,
                        length: len,
                    });
                    if len >= nice {
                        break;
                    }
                }
            }

            cur_match = self.prev[cur_match & WMASK] as usize;
            chain -= 1;
            if cur_match <= limit || chain == 0 {
                break;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: SearchParams = SearchParams {
        good_length: 8,
        nice_length: 258,
        max_chain: 4096,
    };

    fn loaded(data: &[u8]) -> MatchFinder {
        let mut finder = MatchFinder::new(PARAMS);
        assert_eq!(finder.fill_from(data), data.len());
        finder.update_hash();
        finder
    }

    /// Insert every string before `pos`, then search at `pos`.
    fn search_at(finder: &mut MatchFinder, pos: usize) -> Option<Match> {
        while finder.strstart < pos {
            finder.insert_string();
            finder.advance();
        }
        let head = finder.insert_string();
        if head == 0 {
            return None;
        }
        finder.find_longest_match(head, 0)
    }

    #[test]
    fn test_no_match_in_distinct_bytes() {
        let mut finder = loaded(b"abcdefghijklmnop");
        assert_eq!(search_at(&mut finder, 10), None);
    }

    #[test]
    fn test_finds_repeat() {
        let mut finder = loaded(b"abcdefabcdefXYZ");
        // "abcdef" at 1 reappears at 7.
        let m = search_at(&mut finder, 7).unwrap();
        assert_eq!(m, Match { distance: 6, length: 6 });
    }

    #[test]
    fn test_overlapping_run() {
        let mut finder = loaded(&[b'a'; 20]);
        let m = search_at(&mut finder, 2).unwrap();
        assert_eq!(m.distance, 1);
        assert_eq!(m.length, 19);
    }

    #[test]
    fn test_match_clamped_to_lookahead() {
        let mut finder = loaded(&[b'x'; 12]);
        let m = search_at(&mut finder, 5).unwrap();
        assert!(m.length <= finder.lookahead);
    }

    #[test]
    fn test_must_beat_previous_length() {
        let mut finder = loaded(b"abcdefabcdefXYZ");
        while finder.strstart < 7 {
            finder.insert_string();
            finder.advance();
        }
        let head = finder.insert_string();
        assert_eq!(finder.find_longest_match(head, 6), None);
        assert!(finder.find_longest_match(head, 5).is_some());
    }

    #[test]
    fn test_slide_rebases_chains() {
        let mut finder = MatchFinder::new(PARAMS);
        let data: Vec<u8> = (0..2 * WSIZE).map(|i| (i % 251) as u8).collect();
        finder.fill_from(&data);
        finder.update_hash();
        while !finder.needs_slide() {
            finder.insert_string();
            finder.advance();
        }
        let before = finder.strstart;
        finder.slide_window();
        assert_eq!(finder.strstart, before - WSIZE);
        assert!(finder.head.iter().all(|&p| (p as usize) < finder.strstart));
        assert_eq!(finder.byte_at(finder.strstart), data[before - 1]);
    }

    #[test]
    fn test_dictionary_is_searchable() {
        let mut finder = MatchFinder::new(PARAMS);
        finder.set_dictionary(b"hello world");
        assert_eq!(finder.strstart, 1 + 11);
        finder.fill_from(b"world!");
        finder.update_hash();
        let head = finder.insert_string();
        assert_ne!(head, 0);
        let m = finder.find_longest_match(head, 0).unwrap();
        assert_eq!(m, Match { distance: 5, length: 5 });
    }

    #[test]
    fn test_short_dictionary_ignored() {
        let mut finder = MatchFinder::new(PARAMS);
        finder.set_dictionary(b"ab");
        assert_eq!(finder.strstart, 1);
    }
}
