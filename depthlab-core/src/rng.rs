//! Deterministic RNG streams.
//!
//! A run seed is expanded into named sub-seeds, one per `(stream, index)`
//! pair, via BLAKE3. Derivation is hash-based, so the random stopping policy,
//! the dev/test shuffle and the bootstrap resampler never share state and
//! draw the same numbers whatever order they run in.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stream used by the random stopping policy.
pub const RANDOM_STOP_STREAM: &str = "random_stop";
/// Stream used by the dev/test shuffle.
pub const SPLIT_STREAM: &str = "dev_test_split";
/// Stream used by the paired bootstrap.
pub const BOOTSTRAP_STREAM: &str = "paired_bootstrap";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStreams {
    seed: u64,
}

impl RngStreams {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sub-seed for a named stream.
    pub fn sub_seed(&self, stream: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    pub fn rng_for(&self, stream: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, index))
    }
}
