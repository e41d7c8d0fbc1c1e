//! # fillcheck
//!
//! Fills a volume with sequentially numbered log files through a
//! non-blocking filesystem engine, then proves every record and byte reads
//! back intact.
//!
//! ## Run Shape
//!
//! ```text
//! mkdir logs ─► create LOGnnnnn.TXT ─► write records ─► close
//!                     ▲                     │ volume full     │
//!                     │                     ▼                 ▼
//!                     └──── not full ◄── validate ◄── open for read
//!                                           │ full
//!                                           ▼
//!                                        complete
//! ```
//!
//! - [`VolumeFillTest`]: the per-tick state machine
//! - [`run_to_completion`]: the poll loop around it
//! - [`DriverConfig`]: entry target, file ceiling and read chunk size
//!
//! ## Quick Start
//!
//! ```ignore
//! use fillcheck::{DriverConfig, VolumeFillTest, run_to_completion};
//! use fillcheck_sim::{MemoryBlockStore, SimFilesystem, SimFsConfiguration};
//!
//! let mut fs = SimFilesystem::new(MemoryBlockStore::new(4096, 0), SimFsConfiguration::default())?;
//! let mut test = VolumeFillTest::new(DriverConfig::default())?;
//! let report = run_to_completion(&mut fs, &mut test)?;
//! println!("{report}");
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Driver configuration
pub mod config;

/// Volume fill state machine
pub mod driver;

/// Log file naming and record format
pub mod record;

/// Poll loop
pub mod runner;

pub use config::{ConfigError, DriverConfig};
pub use driver::{Awaiting, Counters, DriverError, RunSummary, Stage, Tick, VolumeFillTest};
pub use record::{LOG_DIRECTORY, MAX_LOG_FILES, format_entry, log_file_name};
pub use runner::{RunError, RunReport, run_to_completion};
