//! Handle, mode and state types exchanged with a filesystem engine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Overall readiness of a filesystem engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilesystemState {
    /// The engine has not started mounting yet.
    #[default]
    Unknown,
    /// The engine is mounting the volume.
    Initializing,
    /// The engine accepts requests.
    Ready,
    /// The engine hit an unrecoverable failure.
    Fatal,
}

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file if missing and append to it sequentially (`"as"`).
    AppendSequential,
    /// Open an existing file for reading from the start (`"r"`).
    Read,
}

impl OpenMode {
    /// The mode string this mode is parsed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::AppendSequential => "as",
            OpenMode::Read => "r",
        }
    }

    /// Whether this mode permits writes.
    pub fn is_write(&self) -> bool {
        matches!(self, OpenMode::AppendSequential)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported mode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported open mode: {0:?}")]
pub struct ParseModeError(pub String);

impl FromStr for OpenMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "as" => Ok(OpenMode::AppendSequential),
            "r" => Ok(OpenMode::Read),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Exclusively-owned reference to an open file or directory.
///
/// Only engines create handles. The holder keeps it from the moment a
/// completion callback hands it over until [`crate::AsyncFilesystem::close`]
/// reports completion, then drops it. Handles are deliberately neither
/// `Clone` nor `Copy`.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FileHandle {
    id: u32,
}

impl FileHandle {
    /// Create a handle for the engine-side open entry `id`.
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Engine-side identifier of this handle.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fh#{}", self.id)
    }
}
