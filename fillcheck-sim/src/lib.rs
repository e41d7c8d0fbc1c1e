//! # fillcheck-sim
//!
//! Deterministic simulation of a non-blocking embedded filesystem, used to
//! exercise the fillcheck driver without real hardware.
//!
//! Same seed, same run: every delay, inline callback and short write comes
//! from a ChaCha8 RNG seeded from [`SimFsConfiguration::seed`].
//!
//! ## Components
//!
//! - [`BlockStore`]: sector-addressed storage, either in memory
//!   ([`MemoryBlockStore`]) or backed by an image file ([`ImageBlockStore`])
//! - [`SimFilesystem`]: the [`AsyncFilesystem`](fillcheck_core::AsyncFilesystem)
//!   engine that formats a store and serves the driver's requests
//! - [`SimFsConfiguration`]: latencies and fault probabilities
//! - [`chaos`]: `sometimes_assert!` coverage tracking
//!
//! ## Quick Start
//!
//! ```ignore
//! use fillcheck_core::{AsyncFilesystem, FilesystemState};
//! use fillcheck_sim::{MemoryBlockStore, SimFilesystem, SimFsConfiguration};
//!
//! let store = MemoryBlockStore::new(4096, 1);
//! let mut fs = SimFilesystem::new(store, SimFsConfiguration::random_for_seed(1))?;
//! while fs.state() != FilesystemState::Ready {
//!     fs.poll();
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Sector bitset used for allocation maps
pub mod bitset;

/// Block store abstraction and implementations
pub mod block;

/// Coverage assertions
pub mod chaos;

/// Engine configuration
pub mod config;

mod fs;

pub use bitset::SectorBitSet;
pub use block::{BlockStore, ImageBlockStore, MemoryBlockStore, SECTOR_SIZE, Sector};
pub use chaos::{
    AssertionStats, get_assertion_results, reset_assertion_results, validate_assertion_contracts,
};
pub use config::SimFsConfiguration;
pub use fs::{MIN_VOLUME_SECTORS, SimFilesystem};
