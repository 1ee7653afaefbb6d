#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Audio timing constants threaded through construction.
///
/// Everything that produces or consumes samples takes one of these instead
/// of reading module-level constants, so one process can host graphs with
/// different rates or block sizes side by side.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Samples per second (e.g., 44_100).
    pub sample_rate: u32,
    /// Frames processed as one unit by block-based components.
    pub block_size: usize,
    /// Capacity of each channel's time ring, in samples. Must be at least
    /// one block so a full block can be pulled without evicting itself.
    pub ring_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 128,
            ring_capacity: 512,
        }
    }
}

impl AudioConfig {
    /// Config with the given rate and block size, ring capacity 4x the block.
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        Self {
            sample_rate,
            block_size,
            ring_capacity: block_size * 4,
        }
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        assert!(
            capacity >= self.block_size,
            "ring capacity must hold at least one block"
        );
        self.ring_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_rates() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.block_size, 128);
        assert!(config.ring_capacity >= config.block_size);
    }

    #[test]
    fn ring_capacity_scales_with_block() {
        let config = AudioConfig::new(48_000, 64);
        assert_eq!(config.ring_capacity, 256);
    }
}
