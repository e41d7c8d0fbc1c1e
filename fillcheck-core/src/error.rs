use thiserror::Error;

/// Errors raised while building or backing a filesystem engine.
///
/// Operation-level failures never surface here: the engine reports those
/// through a `None` handle, a zero byte count or [`crate::FilesystemState::Fatal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The backing store failed an I/O request.
    #[error("I/O error: {0}")]
    Io(String),
    /// The backing image does not hold enough sectors to format a volume.
    #[error("image too small: {sectors} sectors (minimum {minimum})")]
    ImageTooSmall {
        /// Sectors available in the image.
        sectors: u64,
        /// Sectors required to format a volume.
        minimum: u64,
    },
    /// The backing image length is not a whole number of sectors.
    #[error("invalid image geometry: {len} bytes is not a multiple of {sector_size}")]
    InvalidGeometry {
        /// Image length in bytes.
        len: u64,
        /// Sector size in bytes.
        sector_size: usize,
    },
    /// The requested image size does not fit in a byte offset.
    #[error("image too large: {sectors} sectors")]
    ImageTooLarge {
        /// Sectors requested.
        sectors: u64,
    },
    /// An engine configuration value is out of range.
    #[error("invalid engine configuration: {0}")]
    InvalidConfiguration(String),
}

/// A type alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}
