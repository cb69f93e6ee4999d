//! Edge case tests for DEFLATE compression.

use oxiflate_core::checksum::Adler32;
use oxiflate_core::traits::{
    CompressStatus, Compressor, DecompressStatus, Decompressor, DeflateStrategy, FlushMode,
};
use oxiflate_deflate::huffman::{HuffmanBuilder, HuffmanTree, MAX_CODE_LENGTH};
use oxiflate_deflate::lz77::WSIZE;
use oxiflate_deflate::{
    Deflater, Inflater, OxiFlateError, deflate, inflate, zlib_compress, zlib_decompress,
};
use rand::{Rng, SeedableRng};

fn pattern(len: usize, period: usize) -> Vec<u8> {
    let pattern: Vec<u8> = (0..period).map(|i| b'A' + (i * 7 % 26) as u8).collect();
    pattern.iter().copied().cycle().take(len).collect()
}

#[test]
fn test_empty_input() {
    let compressed = deflate(b"", 6).unwrap();
    // A single final fixed block holding only end-of-block.
    assert_eq!(compressed, [0x03, 0x00]);
    assert!(inflate(&compressed).unwrap().is_empty());

    for level in 0..=9 {
        let compressed = deflate(b"", level).unwrap();
        assert!(inflate(&compressed).unwrap().is_empty(), "level {}", level);
    }
}

#[test]
fn test_single_byte() {
    let input = b"A";
    let compressed = deflate(input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
}

#[test]
fn test_twenty_a_uses_back_reference() {
    let input = [b'a'; 20];
    let compressed = deflate(&input, 9).unwrap();
    assert_eq!(inflate(&compressed).unwrap(), input);
    // One literal plus one match fits in a few bytes; twenty literals cannot.
    assert!(compressed.len() < 8, "got {} bytes", compressed.len());
}

#[test]
fn test_random_100k_level_6() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED);
    let mut input = vec![0u8; 100_000];
    rng.fill(&mut input[..]);

    let compressed = deflate(&input, 6).unwrap();
    assert_eq!(inflate(&compressed).unwrap(), input);
    // Stored fallback bounds the expansion to the block framing.
    assert!(compressed.len() < input.len() + input.len() / 1000 + 64);
}

#[test]
fn test_window_slide_with_short_period() {
    let input = pattern(2 * WSIZE + 10, 50);
    for level in [1, 6, 9] {
        let compressed = deflate(&input, level).unwrap();
        assert!(compressed.len() < input.len() / 20);
        assert_eq!(inflate(&compressed).unwrap(), input, "level {}", level);
    }
}

#[test]
fn test_three_windows_roundtrip() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let words: [&[u8]; 6] = [b"alpha ", b"beta ", b"gamma ", b"delta ", b"\x00\xFF", b"\n"];
    let mut input = Vec::new();
    while input.len() < 3 * WSIZE + 1234 {
        input.extend_from_slice(words[rng.gen_range(0..words.len())]);
    }
    for level in 0..=9 {
        let compressed = deflate(&input, level).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input, "level {}", level);
    }
}

#[test]
fn test_stored_level_spans_many_blocks() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(65_535);
    let mut input = vec![0u8; 100_000];
    rng.fill(&mut input[..]);

    let compressed = deflate(&input, 0).unwrap();
    assert_eq!(inflate(&compressed).unwrap(), input);
    // Only block framing on top of the raw bytes.
    assert!(compressed.len() <= input.len() + 5 * 8);

    let compressed = zlib_compress(&input, 0).unwrap();
    assert_eq!(zlib_decompress(&compressed).unwrap(), input);

    let mut deflater = Deflater::new(0);
    let mut out = vec![0u8; input.len() + 64];
    let (consumed, produced, status) = deflater
        .compress(&input, &mut out, FlushMode::Finish)
        .unwrap();
    assert_eq!(consumed, input.len());
    assert_eq!(status, CompressStatus::Done);
    assert_eq!(inflate(&out[..produced]).unwrap(), input);
}

#[test]
fn test_fixed_block_decodes() {
    // "Hello" in a single final fixed-Huffman block.
    let compressed = [0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x07, 0x00];
    assert_eq!(inflate(&compressed).unwrap(), b"Hello");
}

#[test]
fn test_all_zeros() {
    let input = vec![0u8; 1000];
    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
    assert!(compressed.len() < input.len() / 10);
}

#[test]
fn test_all_same_byte() {
    let input = vec![255u8; 5000];
    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
    assert!(compressed.len() < input.len() / 20);
}

#[test]
fn test_max_match_length() {
    let input = vec![42u8; 258 * 10];
    let compressed = deflate(&input, 9).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
}

#[test]
fn test_binary_data() {
    let input: Vec<u8> = (0..=255).cycle().take(5000).collect();
    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
}

#[test]
fn test_long_distance_match() {
    let mut input = vec![0u8; 32768];
    let marker = b"PATTERN_TO_MATCH";
    input[0..marker.len()].copy_from_slice(marker);
    input[32768 - marker.len()..32768].copy_from_slice(marker);

    for level in [1, 9] {
        let compressed = deflate(&input, level).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input);
    }
}

#[test]
fn test_utf8_text() {
    let input = "Ünïcödé tëxt, 日本語のテキスト, and emoji 🦀🦀🦀 repeated. ".repeat(40);
    let compressed = deflate(input.as_bytes(), 6).unwrap();
    assert_eq!(inflate(&compressed).unwrap(), input.as_bytes());
}

#[test]
fn test_level_monotonicity_on_repetitive_input() {
    let input = pattern(50_000, 37);
    let stored = deflate(&input, 0).unwrap().len();
    let fast = deflate(&input, 1).unwrap().len();
    let best = deflate(&input, 9).unwrap().len();
    assert!(best <= fast, "{} > {}", best, fast);
    assert!(fast <= stored, "{} > {}", fast, stored);
}

#[test]
fn test_levels_and_strategies_roundtrip() {
    let input = pattern(40_000, 333);
    for level in 0..=9 {
        for strategy in [
            DeflateStrategy::Default,
            DeflateStrategy::Filtered,
            DeflateStrategy::HuffmanOnly,
        ] {
            let mut deflater = Deflater::new(level);
            deflater.set_strategy(strategy);
            let compressed = deflater.compress_to_vec(&input).unwrap();
            assert_eq!(
                inflate(&compressed).unwrap(),
                input,
                "level {} strategy {:?}",
                level,
                strategy
            );
        }
    }
}

#[test]
fn test_byte_at_a_time_decode() {
    let input = pattern(3 * WSIZE, 1000);
    let compressed = deflate(&input, 6).unwrap();

    let mut inflater = Inflater::new();
    let mut output = Vec::new();
    let mut buf = [0u8; 517];
    for byte in &compressed {
        inflater.set_input(std::slice::from_ref(byte)).unwrap();
        loop {
            let n = inflater.inflate(&mut buf).unwrap();
            output.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                break;
            }
        }
    }
    assert!(inflater.is_finished());
    assert_eq!(output, input);
    assert_eq!(inflater.total_in(), compressed.len() as u64);
}

#[test]
fn test_sync_flush_makes_prefix_decodable() {
    let first = b"first half of the message, ".repeat(20);
    let second = b"second half of the message.".repeat(20);

    let mut deflater = Deflater::new(6);
    let mut out = vec![0u8; 4096];
    let (consumed, produced, status) = deflater
        .compress(&first, &mut out, FlushMode::Sync)
        .unwrap();
    assert_eq!(consumed, first.len());
    assert_eq!(status, CompressStatus::NeedsInput);
    assert_eq!(&out[produced - 4..produced], &[0x00, 0x00, 0xFF, 0xFF]);

    let mut inflater = Inflater::new();
    let mut decoded = vec![0u8; 4096];
    let (_, n, status) = inflater
        .decompress(&out[..produced], &mut decoded)
        .unwrap();
    assert_eq!(status, DecompressStatus::NeedsInput);
    assert_eq!(&decoded[..n], &first[..]);

    let mut stream = out[..produced].to_vec();
    stream.extend(deflater.compress_to_vec(&second).unwrap());
    let mut expected = first.clone();
    expected.extend_from_slice(&second);
    assert_eq!(inflate(&stream).unwrap(), expected);
}

#[test]
fn test_full_flush_cuts_history() {
    let block = b"a block of text that repeats exactly ".repeat(4);

    let sizes: Vec<usize> = [FlushMode::Sync, FlushMode::Full]
        .into_iter()
        .map(|mode| {
            let mut deflater = Deflater::new(6);
            let mut out = vec![0u8; 8192];
            let (_, produced, _) = deflater.compress(&block, &mut out, mode).unwrap();
            let mut stream = out[..produced].to_vec();
            stream.extend(deflater.compress_to_vec(&block).unwrap());
            let mut expected = block.clone();
            expected.extend_from_slice(&block);
            assert_eq!(inflate(&stream).unwrap(), expected);
            stream.len()
        })
        .collect();

    // After a full flush the second copy cannot refer back to the first.
    assert!(sizes[0] < sizes[1], "{:?}", sizes);
}

#[test]
fn test_raw_dictionary() {
    let dictionary = b"lorem ipsum dolor sit amet consectetur";
    let input = b"dolor sit amet, lorem ipsum consectetur";

    let mut deflater = Deflater::new(9);
    deflater.set_dictionary(dictionary).unwrap();
    let compressed = deflater.compress_to_vec(input).unwrap();
    assert!(compressed.len() < deflate(input, 9).unwrap().len());

    // Without the dictionary the first back-reference points before the start.
    assert!(matches!(
        inflate(&compressed),
        Err(OxiFlateError::InvalidDistance { .. })
    ));

    let mut inflater = Inflater::new();
    inflater.set_dictionary(dictionary).unwrap();
    assert_eq!(inflater.decompress_all(&compressed).unwrap(), input);
}

#[test]
fn test_zlib_stream_dictionary_handshake() {
    let dictionary = b"shared vocabulary shared vocabulary";
    let input = b"vocabulary that is shared";

    let mut deflater = Deflater::zlib(6);
    let id = deflater.set_dictionary(dictionary).unwrap();
    assert_eq!(id, Adler32::checksum(dictionary));
    let compressed = deflater.compress_to_vec(input).unwrap();

    let mut inflater = Inflater::zlib();
    let mut out = vec![0u8; 256];
    let (_, produced, status) = inflater.decompress(&compressed, &mut out).unwrap();
    assert_eq!(produced, 0);
    assert_eq!(status, DecompressStatus::NeedsDictionary);
    assert_eq!(inflater.dictionary_id(), Some(id));

    inflater.set_dictionary(dictionary).unwrap();
    let mut output = Vec::new();
    loop {
        let n = inflater.inflate(&mut out).unwrap();
        output.extend_from_slice(&out[..n]);
        if n == 0 {
            break;
        }
    }
    assert!(inflater.is_finished());
    assert_eq!(output, input);
    assert_eq!(inflater.adler(), Adler32::checksum(input));
}

#[test]
fn test_truncated_stream() {
    let input = pattern(10_000, 91);
    let compressed = deflate(&input, 6).unwrap();
    let truncated = &compressed[..compressed.len() / 2];
    assert!(matches!(
        inflate(truncated),
        Err(OxiFlateError::UnexpectedEof { .. })
    ));
}

#[test]
fn test_corrupt_streams_are_errors() {
    // Reserved block type 11.
    assert!(matches!(
        inflate(&[0x07]),
        Err(OxiFlateError::InvalidBlockType { block_type: 3 })
    ));
    // Stored block whose NLEN is not the complement of LEN.
    assert!(inflate(&[0x01, 0x05, 0x00, 0x00, 0x00]).is_err());

    let input = pattern(5000, 77);
    let compressed = deflate(&input, 6).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let mut damaged = compressed.clone();
        let at = rng.gen_range(0..damaged.len());
        damaged[at] ^= 1 << rng.gen_range(0..8);
        // Either an error or some output; never a panic.
        let _ = inflate(&damaged);
    }

    // The Adler-32 trailer catches anything that decodes to other bytes.
    let compressed = zlib_compress(&input, 6).unwrap();
    for _ in 0..200 {
        let mut damaged = compressed.clone();
        let at = rng.gen_range(0..damaged.len());
        damaged[at] ^= 1 << rng.gen_range(0..8);
        if let Ok(output) = zlib_decompress(&damaged) {
            assert_eq!(output, input, "flip at byte {} accepted", at);
        }
    }
}

#[test]
fn test_deterministic_output() {
    let input = pattern(70_000, 123);
    for level in 0..=9 {
        assert_eq!(deflate(&input, level).unwrap(), deflate(&input, level).unwrap());
    }
}

#[test]
fn test_huffman_lengths_satisfy_kraft() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    for _ in 0..50 {
        let mut builder = HuffmanBuilder::new(286, MAX_CODE_LENGTH as u8);
        for symbol in 0..286u16 {
            if rng.gen_bool(0.6) {
                // Skewed counts push some codes to the length limit.
                builder.add_count(symbol, 1 << rng.gen_range(0..20));
            }
        }
        let lengths = builder.build_lengths();
        assert!(lengths.iter().all(|&len| len as usize <= MAX_CODE_LENGTH));

        let kraft: u64 = lengths
            .iter()
            .filter(|&&len| len > 0)
            .map(|&len| 1u64 << (MAX_CODE_LENGTH - len as usize))
            .sum();
        assert_eq!(kraft, 1 << MAX_CODE_LENGTH);

        let tree = HuffmanTree::from_code_lengths(&lengths).unwrap();
        assert_eq!(tree, HuffmanTree::from_code_lengths(&lengths).unwrap());
    }
}
