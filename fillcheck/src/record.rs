//! On-disk naming and the log record format.
//!
//! Both are fixed so that volumes written by one implementation can be
//! validated by another.

/// Directory, under the volume root, that holds the log files.
pub const LOG_DIRECTORY: &str = "logs";

/// Number of distinct five-digit log file names.
pub const MAX_LOG_FILES: u32 = 100_000;

/// Name of log file `index`: `LOG00000.TXT` through `LOG99999.TXT`.
pub fn log_file_name(index: u32) -> String {
    format!("LOG{index:05}.TXT")
}

/// One newline-terminated log record.
///
/// `entry_number` is 1-based; `target` is the number of entries the file is
/// meant to hold.
pub fn format_entry(file_index: u32, entry_number: u64, target: u64) -> String {
    format!("Log {file_index:05} entry {entry_number:6}/{target:6}\n")
}

/// Number of record terminators in `bytes`.
pub fn count_entries(bytes: &[u8]) -> u64 {
    bytes.iter().filter(|&&b| b == b'\n').count() as u64
}
