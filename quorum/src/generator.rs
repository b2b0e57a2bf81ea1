use quorum_core::{DEFAULT_KEY_LEN, DEFAULT_VALUE_LEN};
use rand::distributions::{Alphanumeric, DistString};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const KEY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Knuth's multiplicative hash constant, spreads sequential indices over the key space.
const KNUTH_MULTIPLIER: u64 = 2_654_435_761;
const KEY_SUFFIX_SPACE: u64 = 10_000;

/// Synthetic keys and values for load generation.
///
/// Random output is drawn from the wrapped generator, so a seeded generator reproduces the same
/// workload.
pub struct SampleGenerator<R = SmallRng> {
    rng: R,
    key_len: usize,
    value_len: usize,
}

impl SampleGenerator<SmallRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(SmallRng::from_entropy())
    }
}

impl<R: Rng> SampleGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            key_len: DEFAULT_KEY_LEN,
            value_len: DEFAULT_VALUE_LEN,
        }
    }

    pub fn key_len(mut self, len: usize) -> Self {
        self.key_len = len;
        self
    }

    pub fn value_len(mut self, len: usize) -> Self {
        self.value_len = len;
        self
    }

    /// Random lowercase alphanumeric key.
    pub fn random_key(&mut self) -> String {
        (0..self.key_len)
            .map(|_| KEY_CHARSET[self.rng.gen_range(0..KEY_CHARSET.len())] as char)
            .collect()
    }

    /// Random mixed-case alphanumeric value.
    pub fn random_value(&mut self) -> String {
        Alphanumeric.sample_string(&mut self.rng, self.value_len)
    }

    pub fn random_pairs(&mut self, count: usize) -> Vec<(String, String)> {
        (0..count)
            .map(|_| (self.random_key(), self.random_value()))
            .collect()
    }

    /// Deterministic keys `0..count` paired with random values.
    pub fn indexed_pairs(&mut self, count: usize) -> Vec<(String, String)> {
        (0..count)
            .map(|idx| (indexed_key(idx as u64), self.random_value()))
            .collect()
    }

    /// `count` keys drawn uniformly with replacement from `keys`.
    pub fn sample_with_replacement(&mut self, keys: &[String], count: usize) -> Vec<String> {
        if keys.is_empty() {
            return vec![];
        }
        (0..count)
            .map(|_| keys[self.rng.gen_range(0..keys.len())].clone())
            .collect()
    }

    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }
}

/// Key for a given index, stable across runs so a read phase can find what a write phase stored
/// without sharing state.
pub fn indexed_key(index: u64) -> String {
    let suffix = index.wrapping_mul(KNUTH_MULTIPLIER) % KEY_SUFFIX_SPACE;
    format!("key-{index}-{suffix}")
}
