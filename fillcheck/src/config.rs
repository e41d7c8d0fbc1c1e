//! Driver configuration.

use crate::record::MAX_LOG_FILES;

/// Entries written to each log file unless the volume fills first.
pub const DEFAULT_ENTRIES_PER_FILE: u64 = 100_000_000;

/// Log files written before the run stops even if the volume is not full.
pub const DEFAULT_MAX_FILES: u32 = 1000;

/// Bytes requested per read during validation.
pub const DEFAULT_READ_CHUNK: usize = 64;

/// Errors from [`DriverConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A file must hold at least one entry.
    #[error("entries per file must be at least 1")]
    NoEntries,

    /// File count outside the range five-digit names can express.
    #[error("max files must be within 1..={max}, got {value}")]
    MaxFiles {
        /// Requested ceiling.
        value: u32,
        /// Largest accepted ceiling.
        max: u32,
    },

    /// Reads need a non-empty scratch buffer.
    #[error("read chunk must be at least 1 byte")]
    EmptyReadChunk,
}

/// Parameters of a volume fill run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Entries per log file. Usually far more than the volume can hold, so
    /// every file but the last is cut short only by this target.
    pub entries_per_file: u64,

    /// Upper bound on the number of log files. Volume full is the real
    /// termination signal; this only bounds the file name space.
    pub max_files: u32,

    /// Scratch buffer size for the read-back pass.
    pub read_chunk: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            entries_per_file: DEFAULT_ENTRIES_PER_FILE,
            max_files: DEFAULT_MAX_FILES,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

impl DriverConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-file entry target.
    pub fn entries_per_file(mut self, entries: u64) -> Self {
        self.entries_per_file = entries;
        self
    }

    /// Set the file count ceiling.
    pub fn max_files(mut self, files: u32) -> Self {
        self.max_files = files;
        self
    }

    /// Set the read-back chunk size.
    pub fn read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = bytes;
        self
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries_per_file == 0 {
            return Err(ConfigError::NoEntries);
        }
        if self.max_files == 0 || self.max_files > MAX_LOG_FILES {
            return Err(ConfigError::MaxFiles {
                value: self.max_files,
                max: MAX_LOG_FILES,
            });
        }
        if self.read_chunk == 0 {
            return Err(ConfigError::EmptyReadChunk);
        }
        Ok(())
    }
}
