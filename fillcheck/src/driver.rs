//! The volume fill state machine.
//!
//! [`VolumeFillTest`] writes `LOG00000.TXT`, `LOG00001.TXT`, ... into the
//! `logs` directory, reading each file back as soon as it is closed, until
//! the volume reports full. Each [`step`](VolumeFillTest::step) issues at
//! most one filesystem request and never blocks.
//!
//! # Completion ordering
//!
//! A mkdir/open callback may run before the request returns. Every request
//! is therefore issued only after the stage has been set to
//! [`Stage::Idle`] and the awaited completion recorded. The callback itself
//! only deposits its result into a shared slot; the driver consumes the slot
//! right after the call returns, or on a later `Idle` tick if the engine
//! completes the request during a poll. Either way the stage is assigned by
//! the driver, once.

use crate::config::{ConfigError, DriverConfig};
use crate::record::{LOG_DIRECTORY, count_entries, format_entry, log_file_name};
use fillcheck_core::{AsyncFilesystem, FileCallback, FileHandle, OpenMode};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Execution phase of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Stage {
    /// Create (or open) the `logs` directory and enter it.
    #[default]
    CreateLogDirectory,
    /// Create the next log file for append.
    CreateLogFile,
    /// Write records into the open log file.
    WriteLog,
    /// Close the log file just written.
    CloseLog,
    /// Re-open the oldest unvalidated log file for read.
    OpenLogForRead,
    /// Stream the open log file back and validate it.
    ReadLog,
    /// Waiting for a mkdir/open completion.
    Idle,
    /// Terminal; no further requests are issued.
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CreateLogDirectory => "create-log-directory",
            Stage::CreateLogFile => "create-log-file",
            Stage::WriteLog => "write-log",
            Stage::CloseLog => "close-log",
            Stage::OpenLogForRead => "open-log-for-read",
            Stage::ReadLog => "read-log",
            Stage::Idle => "idle",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// The completion an [`Idle`](Stage::Idle) driver is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    /// `mkdir("logs")`
    LogDirectory,
    /// `open(LOGnnnnn.TXT, "as")`
    LogFileForWrite,
    /// `open(LOGnnnnn.TXT, "r")`
    LogFileForRead,
}

/// File indices and byte/entry accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Index of the next file to write; also the number of files written.
    pub write_file_index: u32,
    /// Index of the next file to validate; never exceeds `write_file_index`.
    pub read_file_index: u32,
    /// Complete records written to the current file.
    pub write_entry_count: u64,
    /// Record terminators seen in the file being read.
    pub read_entry_count: u64,
    /// Bytes accepted for the current file, partial records included.
    pub bytes_written_this_file: u64,
    /// Bytes read back from the file being read.
    pub bytes_read_this_file: u64,
    /// Bytes accepted across closed files.
    pub bytes_written_total: u64,
    /// Bytes read back across validated files.
    pub bytes_read_total: u64,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Log files written and closed.
    pub files_written: u32,
    /// Log files read back and validated.
    pub files_read: u32,
    /// Bytes written across all files.
    pub bytes_written_total: u64,
    /// Bytes read back across all files.
    pub bytes_read_total: u64,
    /// Whether the run ended because the volume filled up.
    pub volume_full: bool,
}

/// Result of one [`VolumeFillTest::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// More work remains; step again after the next poll.
    Continue,
    /// The run is over.
    Complete(RunSummary),
}

/// Run failures detected by the driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The log directory could not be created or opened.
    #[error("Creating '{0}' directory failed")]
    CreateDirectory(&'static str),

    /// The engine refused to enter the log directory.
    #[error("Entering '{0}' directory failed")]
    ChangeDirectory(&'static str),

    /// A file written earlier could not be re-opened for validation.
    #[error("Opening {file} for read failed")]
    OpenForRead {
        /// Name of the log file.
        file: String,
    },

    /// Fewer records read back than written.
    #[error("Wrote {written} log entries but only read back {read}")]
    EntryMismatch {
        /// Index of the log file.
        file_index: u32,
        /// Records written.
        written: u64,
        /// Records read back.
        read: u64,
    },

    /// Fewer bytes read back than written.
    #[error("Wrote {written} bytes but only read back {read}")]
    ByteMismatch {
        /// Index of the log file.
        file_index: u32,
        /// Bytes written.
        written: u64,
        /// Bytes read back.
        read: u64,
    },

    /// A stage that needs an open file found none.
    #[error("no open log file in stage {0}")]
    NoOpenFile(Stage),
}

/// Completion slot shared between the driver and one callback.
#[derive(Debug, Clone, Default)]
struct CompletionSlot(Rc<RefCell<Option<Option<FileHandle>>>>);

impl CompletionSlot {
    fn callback(&self) -> FileCallback {
        let slot = Rc::clone(&self.0);
        Box::new(move |handle| {
            *slot.borrow_mut() = Some(handle);
        })
    }

    fn take(&self) -> Option<Option<FileHandle>> {
        self.0.borrow_mut().take()
    }
}

/// A record not yet fully accepted by the engine.
#[derive(Debug)]
struct PendingRecord {
    bytes: Vec<u8>,
    offset: usize,
}

impl PendingRecord {
    fn remaining(&self) -> &[u8] {
        &self.bytes[self.offset..]
    }
}

/// Volume fill and read-back driver.
#[derive(Debug)]
pub struct VolumeFillTest {
    config: DriverConfig,
    stage: Stage,
    awaiting: Option<Awaiting>,
    completion: CompletionSlot,
    file: Option<FileHandle>,
    /// Directory handle whose close has not completed yet
    directory: Option<FileHandle>,
    record: Option<PendingRecord>,
    end_of_file: bool,
    volume_full: bool,
    counters: Counters,
    scratch: Vec<u8>,
    failure: Option<DriverError>,
}

impl VolumeFillTest {
    /// Create a driver positioned at [`Stage::CreateLogDirectory`].
    pub fn new(config: DriverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            scratch: vec![0; config.read_chunk],
            config,
            stage: Stage::default(),
            awaiting: None,
            completion: CompletionSlot::default(),
            file: None,
            directory: None,
            record: None,
            end_of_file: false,
            volume_full: false,
            counters: Counters::default(),
            failure: None,
        })
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Completion awaited while [`Idle`](Stage::Idle).
    pub fn awaiting(&self) -> Option<Awaiting> {
        self.awaiting
    }

    /// Current accounting.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Advance by one tick. Call only while the filesystem is `Ready`.
    pub fn step<F>(&mut self, fs: &mut F) -> Result<Tick, DriverError>
    where
        F: AsyncFilesystem + ?Sized,
    {
        tracing::trace!("Tick in stage {}", self.stage);
        match self.stage {
            Stage::CreateLogDirectory => {
                self.begin_request(Awaiting::LogDirectory);
                fs.mkdir(LOG_DIRECTORY, self.completion.callback());
                self.consume_completion(fs);
            }
            Stage::CreateLogFile => self.create_log_file(fs),
            Stage::WriteLog => self.write_log(fs)?,
            Stage::CloseLog => self.close_log(fs)?,
            Stage::OpenLogForRead => self.open_log_for_read(fs),
            Stage::ReadLog => self.read_log(fs)?,
            Stage::Idle => self.consume_completion(fs),
            Stage::Complete => return self.finish(),
        }
        Ok(Tick::Continue)
    }

    fn begin_request(&mut self, awaiting: Awaiting) {
        self.stage = Stage::Idle;
        self.awaiting = Some(awaiting);
    }

    fn consume_completion<F>(&mut self, fs: &mut F)
    where
        F: AsyncFilesystem + ?Sized,
    {
        let Some(awaiting) = self.awaiting else {
            return;
        };
        let Some(handle) = self.completion.take() else {
            return;
        };
        self.awaiting = None;

        match awaiting {
            Awaiting::LogDirectory => self.log_directory_created(fs, handle),
            Awaiting::LogFileForWrite => self.log_file_created(handle),
            Awaiting::LogFileForRead => self.log_file_opened(handle),
        }
    }

    fn log_directory_created<F>(&mut self, fs: &mut F, handle: Option<FileHandle>)
    where
        F: AsyncFilesystem + ?Sized,
    {
        let Some(dir) = handle else {
            tracing::error!("Creating '{}' directory failed", LOG_DIRECTORY);
            self.fail(DriverError::CreateDirectory(LOG_DIRECTORY));
            return;
        };

        if !fs.change_directory(&dir) {
            tracing::error!("Entering '{}' directory failed", LOG_DIRECTORY);
            self.fail(DriverError::ChangeDirectory(LOG_DIRECTORY));
        } else {
            tracing::debug!("Entered '{}' directory", LOG_DIRECTORY);
            self.stage = Stage::CreateLogFile;
        }

        if !fs.close(&dir) {
            self.directory = Some(dir);
        }
    }

    fn log_file_created(&mut self, handle: Option<FileHandle>) {
        let name = log_file_name(self.counters.write_file_index);
        match handle {
            Some(file) => {
                tracing::info!("Writing log entries to {}...", name);
                self.file = Some(file);
                self.stage = Stage::WriteLog;
            }
            None => {
                tracing::warn!("Creating {} failed", name);
                self.stage = Stage::Complete;
            }
        }
    }

    fn log_file_opened(&mut self, handle: Option<FileHandle>) {
        let name = log_file_name(self.counters.read_file_index);
        match handle {
            Some(file) => {
                tracing::info!("Validating {}...", name);
                self.file = Some(file);
                self.stage = Stage::ReadLog;
            }
            None => {
                tracing::error!("Opening {} for read failed", name);
                self.fail(DriverError::OpenForRead { file: name });
            }
        }
    }

    fn create_log_file<F>(&mut self, fs: &mut F)
    where
        F: AsyncFilesystem + ?Sized,
    {
        if let Some(dir) = &self.directory {
            if !fs.close(dir) {
                return;
            }
            self.directory = None;
        }

        if self.counters.write_file_index >= self.config.max_files {
            tracing::info!("Reached the ceiling of {} log files", self.config.max_files);
            self.stage = Stage::Complete;
            return;
        }

        self.counters.write_entry_count = 0;
        self.counters.bytes_written_this_file = 0;
        self.record = None;

        let name = log_file_name(self.counters.write_file_index);
        self.begin_request(Awaiting::LogFileForWrite);
        fs.open(&name, OpenMode::AppendSequential, self.completion.callback());
        self.consume_completion(fs);
    }

    fn write_log<F>(&mut self, fs: &mut F) -> Result<(), DriverError>
    where
        F: AsyncFilesystem + ?Sized,
    {
        let Some(file) = &self.file else {
            return Err(DriverError::NoOpenFile(self.stage));
        };

        let counters = &mut self.counters;
        if counters.write_entry_count >= self.config.entries_per_file {
            self.stage = Stage::CloseLog;
            return Ok(());
        }

        let record = self.record.get_or_insert_with(|| PendingRecord {
            bytes: format_entry(
                counters.write_file_index,
                counters.write_entry_count + 1,
                self.config.entries_per_file,
            )
            .into_bytes(),
            offset: 0,
        });

        let requested = record.remaining().len();
        let accepted = fs.write(file, record.remaining()).min(requested);
        if accepted > 0 {
            counters.bytes_written_this_file += accepted as u64;
            record.offset += accepted;
            if accepted < requested {
                tracing::debug!(
                    "Partial write: {} of {} bytes of entry {}",
                    accepted,
                    requested,
                    counters.write_entry_count + 1
                );
            } else {
                counters.write_entry_count += 1;
                self.record = None;
            }
        } else if fs.is_volume_full() {
            tracing::info!(
                "Volume full after {} entries ({} bytes) in {}",
                counters.write_entry_count,
                counters.bytes_written_this_file,
                log_file_name(counters.write_file_index)
            );
            self.volume_full = true;
            self.stage = Stage::CloseLog;
        }
        Ok(())
    }

    fn close_log<F>(&mut self, fs: &mut F) -> Result<(), DriverError>
    where
        F: AsyncFilesystem + ?Sized,
    {
        let Some(file) = &self.file else {
            return Err(DriverError::NoOpenFile(self.stage));
        };
        if !fs.close(file) {
            return Ok(());
        }
        self.file = None;

        let counters = &mut self.counters;
        counters.bytes_written_total += counters.bytes_written_this_file;
        tracing::info!(
            "Closed {}: {} entries, {} bytes",
            log_file_name(counters.write_file_index),
            counters.write_entry_count,
            counters.bytes_written_this_file
        );
        counters.write_file_index += 1;
        self.stage = Stage::OpenLogForRead;
        Ok(())
    }

    fn open_log_for_read<F>(&mut self, fs: &mut F)
    where
        F: AsyncFilesystem + ?Sized,
    {
        if self.counters.read_file_index == self.counters.write_file_index {
            self.stage = Stage::Complete;
            return;
        }

        self.counters.read_entry_count = 0;
        self.counters.bytes_read_this_file = 0;
        self.end_of_file = false;

        let name = log_file_name(self.counters.read_file_index);
        self.begin_request(Awaiting::LogFileForRead);
        fs.open(&name, OpenMode::Read, self.completion.callback());
        self.consume_completion(fs);
    }

    fn read_log<F>(&mut self, fs: &mut F) -> Result<(), DriverError>
    where
        F: AsyncFilesystem + ?Sized,
    {
        let Some(file) = &self.file else {
            return Err(DriverError::NoOpenFile(self.stage));
        };

        if !self.end_of_file {
            let read = fs.read(file, &mut self.scratch).min(self.scratch.len());
            if read > 0 {
                self.counters.bytes_read_this_file += read as u64;
                self.counters.read_entry_count += count_entries(&self.scratch[..read]);
                return Ok(());
            }
            if !fs.is_end_of_file(file) {
                tracing::trace!("Read stalled before end of file");
                return Ok(());
            }
            self.end_of_file = true;
        }

        if !fs.close(file) {
            return Ok(());
        }
        self.file = None;
        self.end_of_file = false;

        self.counters.bytes_read_total += self.counters.bytes_read_this_file;
        self.validate_read_back()?;
        self.counters.read_file_index += 1;

        if fs.is_volume_full() {
            self.volume_full = true;
            self.stage = Stage::Complete;
        } else {
            self.stage = Stage::CreateLogFile;
        }
        Ok(())
    }

    fn validate_read_back(&mut self) -> Result<(), DriverError> {
        let c = &self.counters;
        let file_index = c.read_file_index;
        let error = if c.read_entry_count < c.write_entry_count {
            DriverError::EntryMismatch {
                file_index,
                written: c.write_entry_count,
                read: c.read_entry_count,
            }
        } else if c.bytes_read_this_file < c.bytes_written_this_file {
            DriverError::ByteMismatch {
                file_index,
                written: c.bytes_written_this_file,
                read: c.bytes_read_this_file,
            }
        } else {
            tracing::info!(
                "{} validated: {} entries, {} bytes",
                log_file_name(file_index),
                c.read_entry_count,
                c.bytes_read_this_file
            );
            return Ok(());
        };

        tracing::error!("{} failed validation: {}", log_file_name(file_index), error);
        self.fail(error.clone());
        Err(error)
    }

    fn fail(&mut self, error: DriverError) {
        self.failure.get_or_insert(error);
        self.stage = Stage::Complete;
    }

    fn finish(&self) -> Result<Tick, DriverError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let c = &self.counters;
        Ok(Tick::Complete(RunSummary {
            files_written: c.write_file_index,
            files_read: c.read_file_index,
            bytes_written_total: c.bytes_written_total,
            bytes_read_total: c.bytes_read_total,
            volume_full: self.volume_full,
        }))
    }
}
