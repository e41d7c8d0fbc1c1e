//! # Simulated Filesystem Configuration
//!
//! Latencies are counted in engine polls rather than wall-clock time: the
//! engine only makes progress when its owner calls `poll`, so a poll is the
//! natural unit of delay. A latency range with `start == end` always yields
//! `start`; a latency of zero means the work happens synchronously inside the
//! triggering call.
//!
//! | Parameter | Config Field | Default | What it exercises |
//! |-----------|--------------|---------|-------------------|
//! | Mount time | `mount_polls` | 4 | Callers waiting for `Ready` |
//! | Callback delay | `op_latency` | 1-4 polls | Deferred completions |
//! | Inline callbacks | `inline_completion_probability` | 25% | Callback-before-return ordering |
//! | Create failure | `create_failure_probability` | 0% | Failed mkdir/open handling |
//! | Short writes | `partial_write_probability` | 5% | Partial write accounting |
//! | Sector flush | `sector_write_latency` | 0-3 polls | Writes stalled by in-flight flushes |
//! | Sector load | `sector_read_latency` | 0-3 polls | Zero-byte reads before end-of-file |
//! | Close | `close_latency` | 0-2 polls | Close polled to completion |
//!
//! ## Configuration Examples
//!
//! ```rust
//! use fillcheck_sim::SimFsConfiguration;
//!
//! // Everything synchronous, nothing injected
//! let config = SimFsConfiguration::fast_local();
//!
//! // Randomized parameters derived from a seed
//! let config = SimFsConfiguration::random_for_seed(42);
//! ```

use fillcheck_core::{EngineError, EngineResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;

/// Configuration for the simulated filesystem engine.
#[derive(Debug, Clone)]
pub struct SimFsConfiguration {
    /// Seed for the engine's deterministic RNG.
    pub seed: u64,

    /// Polls spent in `Initializing` before the volume is formatted.
    pub mount_polls: u32,

    /// Polls before a deferred mkdir/open callback fires.
    pub op_latency: Range<u32>,

    /// Probability (0.0 - 1.0) that a mkdir/open callback runs before the
    /// request returns.
    pub inline_completion_probability: f64,

    /// Probability (0.0 - 1.0) that a mkdir/open reports failure.
    pub create_failure_probability: f64,

    /// Probability (0.0 - 1.0) that a write accepts fewer bytes than the
    /// sector cache could take.
    pub partial_write_probability: f64,

    /// Polls for a full sector flush to reach the block store.
    pub sector_write_latency: Range<u32>,

    /// Polls for a sector load from the block store.
    pub sector_read_latency: Range<u32>,

    /// Polls between a close request and its completion.
    pub close_latency: Range<u32>,
}

impl Default for SimFsConfiguration {
    fn default() -> Self {
        Self {
            seed: 0,
            mount_polls: 4,
            op_latency: 1..4,
            inline_completion_probability: 0.25,
            create_failure_probability: 0.0,
            partial_write_probability: 0.05,
            sector_write_latency: 0..3,
            sector_read_latency: 0..3,
            close_latency: 0..2,
        }
    }
}

impl SimFsConfiguration {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation synchronous and nothing injected.
    ///
    /// Callbacks still fire on the next poll unless
    /// `inline_completion_probability` is raised.
    pub fn fast_local() -> Self {
        Self {
            seed: 0,
            mount_polls: 0,
            op_latency: 0..0,
            inline_completion_probability: 0.0,
            create_failure_probability: 0.0,
            partial_write_probability: 0.0,
            sector_write_latency: 0..0,
            sector_read_latency: 0..0,
            close_latency: 0..0,
        }
    }

    /// Randomized timing and partial-write parameters derived from `seed`.
    ///
    /// Create failures stay disabled: they end a run early by design and
    /// would hide everything else.
    pub fn random_for_seed(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let op_start = rng.random_range(0..3);
        let write_start = rng.random_range(0..2);
        let read_start = rng.random_range(0..2);
        Self {
            seed,
            mount_polls: rng.random_range(0..16),
            op_latency: op_start..op_start + rng.random_range(1..6),
            inline_completion_probability: rng.random_range(0..=100) as f64 / 100.0,
            create_failure_probability: 0.0,
            partial_write_probability: rng.random_range(0..50) as f64 / 100.0,
            sector_write_latency: write_start..write_start + rng.random_range(0..5),
            sector_read_latency: read_start..read_start + rng.random_range(0..5),
            close_latency: 0..rng.random_range(1..4),
        }
    }

    /// Use `seed` for the engine RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check probabilities and latency ranges.
    pub fn validate(&self) -> EngineResult<()> {
        let probabilities = [
            ("inline_completion_probability", self.inline_completion_probability),
            ("create_failure_probability", self.create_failure_probability),
            ("partial_write_probability", self.partial_write_probability),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "{name} must be within 0.0..=1.0, got {p}"
                )));
            }
        }

        let ranges = [
            ("op_latency", &self.op_latency),
            ("sector_write_latency", &self.sector_write_latency),
            ("sector_read_latency", &self.sector_read_latency),
            ("close_latency", &self.close_latency),
        ];
        for (name, range) in ranges {
            if range.start > range.end {
                return Err(EngineError::InvalidConfiguration(format!(
                    "{name} range {}..{} is reversed",
                    range.start, range.end
                )));
            }
        }
        Ok(())
    }
}
