//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, NFrames, Result};

/// Sample rate and block sizes shared by everything in a graph.
///
/// Passed by reference to `prepare_for_processing`; buffers are sized to
/// `max_block_length` so any cycle up to that length runs without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Nominal frames per cycle.
    pub block_length: NFrames,
    /// Largest cycle the backend may request.
    pub max_block_length: NFrames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_length: 256,
            max_block_length: 4096,
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: u32, block_length: NFrames) -> Self {
        Self {
            sample_rate,
            block_length,
            max_block_length: block_length.max(Self::default().max_block_length),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(8000..=384000).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_length == 0 {
            return Err(Error::InvalidConfig("block_length must be > 0".into()));
        }
        if self.block_length > self.max_block_length {
            return Err(Error::InvalidConfig(format!(
                "block_length {} exceeds max_block_length {}",
                self.block_length, self.max_block_length
            )));
        }
        Ok(())
    }
}

/// How the scheduler executes ready nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 0 runs every node on the calling thread.
    pub worker_threads: usize,
}
