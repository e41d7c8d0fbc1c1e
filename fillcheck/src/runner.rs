//! Poll loop driving a [`VolumeFillTest`] against an engine.

use crate::driver::{Counters, DriverError, RunSummary, Stage, Tick, VolumeFillTest};
use fillcheck_core::{AsyncFilesystem, FilesystemState};
use serde::Serialize;
use std::fmt;

/// Report of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Totals from the driver
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Engine polls until the driver completed
    pub ticks: u64,
    /// `destroy` calls until the engine shut down
    pub shutdown_polls: u64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Success]  Logged {} bytes in {} files to fill the device",
            self.summary.bytes_written_total, self.summary.files_written
        )
    }
}

/// Reasons a run did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// The engine reported an unrecoverable condition.
    #[error("Fatal filesystem error")]
    Fatal {
        /// Driver stage when the engine failed.
        stage: Stage,
        /// Driver accounting when the engine failed.
        counters: Counters,
    },

    /// The driver detected a failure.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Poll `fs` and step `test` until the run completes, then shut `fs` down.
///
/// The driver only runs while the engine is `Ready`. A `Fatal` engine ends
/// the run at once without shutting the engine down.
pub fn run_to_completion<F>(fs: &mut F, test: &mut VolumeFillTest) -> Result<RunReport, RunError>
where
    F: AsyncFilesystem + ?Sized,
{
    let mut last_state = None;
    let mut ticks = 0u64;

    let summary = loop {
        fs.poll();
        ticks += 1;

        let state = fs.state();
        if last_state != Some(state) {
            log_state_change(state);
            last_state = Some(state);
        }

        match state {
            FilesystemState::Ready => {
                if let Tick::Complete(summary) = test.step(fs)? {
                    break summary;
                }
            }
            FilesystemState::Fatal => {
                return Err(RunError::Fatal {
                    stage: test.stage(),
                    counters: test.counters().clone(),
                });
            }
            FilesystemState::Unknown | FilesystemState::Initializing => {}
        }
    };

    tracing::info!(
        "Run complete after {} ticks: {} files, {} bytes",
        ticks,
        summary.files_written,
        summary.bytes_written_total
    );

    let mut shutdown_polls = 1;
    while !fs.destroy() {
        shutdown_polls += 1;
    }
    tracing::debug!("Filesystem shut down after {} polls", shutdown_polls);

    Ok(RunReport {
        summary,
        ticks,
        shutdown_polls,
    })
}

fn log_state_change(state: FilesystemState) {
    match state {
        FilesystemState::Unknown => tracing::debug!("Filesystem in unknown state"),
        FilesystemState::Initializing => tracing::info!("Filesystem initializing..."),
        FilesystemState::Ready => tracing::info!("Filesystem online"),
        FilesystemState::Fatal => tracing::error!("Fatal filesystem error"),
    }
}
