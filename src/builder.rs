//! Builder for configuring and constructing an `OstinatoEngine`.

use crate::core::{EngineConfig, NFrames, SchedulerConfig};
use crate::{OstinatoEngine, Result};

/// # Example
///
/// ```
/// use ostinato::prelude::*;
///
/// let engine = OstinatoEngine::builder()
///     .sample_rate(44100)
///     .block_length(512)
///     .worker_threads(2)
///     .build()
///     .unwrap();
///
/// assert_eq!(engine.config().block_length, 512);
/// ```
#[derive(Debug, Clone)]
pub struct OstinatoEngineBuilder {
    config: EngineConfig,
    scheduler: SchedulerConfig,
}

impl Default for OstinatoEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl OstinatoEngineBuilder {
    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 256. Raises `max_block_length` if needed.
    pub fn block_length(mut self, block_length: NFrames) -> Self {
        self.config.block_length = block_length;
        self.config.max_block_length = self.config.max_block_length.max(block_length);
        self
    }

    /// Default: 4096
    pub fn max_block_length(mut self, max_block_length: NFrames) -> Self {
        self.config.max_block_length = max_block_length;
        self
    }

    /// Default: 0 (every node runs on the audio thread)
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.scheduler.worker_threads = count;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<OstinatoEngine> {
        self.config.validate()?;
        OstinatoEngine::from_parts(self.config, self.scheduler)
    }
}
