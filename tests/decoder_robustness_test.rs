//! Robustness tests for the block decoder on seeded random input.
//!
//! Words are drawn around every tag's type bits so that all multi-word
//! records (trigger time, raw data runs, pulse parameter sub-records) are
//! truncated and interleaved in every possible way.

use pulsedata_rs::reader::decoder::{classify, decode, F250Decoder, Tag, Word};
use rand::prelude::*;
use rand::rngs::StdRng;

/// High bits of every tag plus the two sub-record patterns
const PREFIXES: [(Word, Word); 14] = [
    (0x8000_0000, 0x07FF_FFFF), // block header
    (0x8800_0000, 0x07FF_FFFF), // block trailer
    (0x9000_0000, 0x07FF_FFFF), // event header
    (0x9800_0000, 0x07FF_FFFF), // trigger time
    (0xA000_0000, 0x0780_00FF), // window raw data (reserved bits clear)
    (0xB000_0000, 0x07E0_03FF), // pulse raw data (reserved bits clear)
    (0xB800_0000, 0x07FF_FFFF), // pulse integral
    (0xC000_0000, 0x07F8_7FFF), // pulse time
    (0xC800_0000, 0x07FF_FFFF), // pulse parameters
    (0xD000_0000, 0x07FF_FFFF), // pulse peak
    (0xF800_0000, 0x07FF_FFFF), // filler
    (0x4000_0000, 0x3FFF_FFFF), // pulse parameter integral sub-word
    (0x0000_0000, 0x3FFF_FFFF), // pulse parameter time sub-word / samples
    (0x0000_0000, 0x0FFF_0FFF), // valid sample pair
];

fn random_word(rng: &mut StdRng) -> Word {
    if rng.gen_bool(0.1) {
        return rng.gen();
    }
    let (prefix, free_bits) = PREFIXES[rng.gen_range(0..PREFIXES.len())];
    prefix | (rng.gen::<Word>() & free_bits)
}

fn random_block(rng: &mut StdRng, max_len: usize) -> Vec<Word> {
    let len = rng.gen_range(0..=max_len);
    (0..len).map(|_| random_word(rng)).collect()
}

#[test]
fn test_random_blocks_terminate_with_bounded_output() {
    let mut rng = StdRng::seed_from_u64(250);
    let decoder = F250Decoder::with_defaults();

    for _ in 0..2000 {
        let block = random_block(&mut rng, 64);
        let (lines, _) = decoder.decode_with_state(&block);

        // A word yields at most two lines (a sample pair, or a header plus
        // a truncation diagnostic)
        assert!(
            lines.len() <= 2 * block.len(),
            "{} lines for {} words: {:08x?}",
            lines.len(),
            block.len(),
            block
        );
        assert!(lines.iter().all(|l| !l.text.is_empty()));
    }
}

#[test]
fn test_random_blocks_with_invalid_samples_shown() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut decoder = F250Decoder::with_defaults();
    decoder.set_show_invalid_samples(true);

    for _ in 0..500 {
        let block = random_block(&mut rng, 32);
        let lines = decoder.decode(&block);
        assert!(lines.len() <= 2 * block.len());
    }
}

#[test]
fn test_unrecognized_words_each_yield_one_error() {
    let mut rng = StdRng::seed_from_u64(11);
    let block: Vec<Word> = (0..1000)
        .map(|_| rng.gen::<Word>())
        .filter(|w| classify(*w) == Tag::Unrecognized)
        // keep out words that a preceding word could claim as its run
        .filter(|w| w & 0xC000_C000 != 0 && w & 0xC000_0000 != 0x4000_0000)
        .collect();
    assert!(!block.is_empty());

    let lines = decode(&block);
    assert_eq!(lines.len(), block.len());
    assert!(lines.iter().all(|l| l.is_error() && l.tag == Tag::Unrecognized));
}

#[test]
fn test_sample_index_tracks_last_sample() {
    let mut rng = StdRng::seed_from_u64(3);
    let decoder = F250Decoder::with_defaults();

    for _ in 0..200 {
        let width = rng.gen_range(1..=16u32);
        let mut block = vec![0xA000_0000 | width];
        for _ in 0..width {
            block.push(rng.gen::<Word>() & 0x0FFF_0FFF);
        }
        let (lines, state) = decoder.decode_with_state(&block);
        assert_eq!(lines.len(), 1 + 2 * width as usize);
        assert_eq!(state.last_sample_index, Some(2 * width as usize - 1));
    }
}
