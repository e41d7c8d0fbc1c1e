//! The poll-driven filesystem interface.

use crate::types::{FileHandle, FilesystemState, OpenMode};

/// Completion callback for [`AsyncFilesystem::mkdir`] and [`AsyncFilesystem::open`].
///
/// Receives the new handle, or `None` when the request failed.
pub type FileCallback = Box<dyn FnOnce(Option<FileHandle>)>;

/// Non-blocking filesystem engine driven by repeated [`poll`](Self::poll) calls.
///
/// Nothing here blocks. Requests either complete immediately or make progress
/// on later polls, and callers observe completion through callbacks, return
/// values or status queries.
///
/// # Callback timing
///
/// A [`FileCallback`] may be invoked before the requesting call returns.
/// Callers must have finished updating their own bookkeeping *before* issuing
/// the request, otherwise state written by the callback can be overwritten by
/// code that runs after the call.
pub trait AsyncFilesystem {
    /// Advance engine-internal I/O. Must be called every loop iteration.
    fn poll(&mut self);

    /// Overall readiness. [`FilesystemState::Fatal`] is unrecoverable.
    fn state(&self) -> FilesystemState;

    /// Create (or open, if it already exists) a directory in the current directory.
    fn mkdir(&mut self, name: &str, on_complete: FileCallback);

    /// Open `path` in `mode`.
    fn open(&mut self, path: &str, mode: OpenMode, on_complete: FileCallback);

    /// Make the directory behind `dir` the current directory.
    ///
    /// Returns `false` if `dir` is not an open directory.
    fn change_directory(&mut self, dir: &FileHandle) -> bool;

    /// Request that `file` be closed. Returns `true` once the close completed.
    ///
    /// Call repeatedly until it returns `true`; the handle must not be used
    /// afterwards.
    fn close(&mut self, file: &FileHandle) -> bool;

    /// Write as much of `buf` as the engine can accept right now.
    ///
    /// Zero together with [`is_volume_full`](Self::is_volume_full) means no
    /// more data will ever be accepted.
    fn write(&mut self, file: &FileHandle, buf: &[u8]) -> usize;

    /// Read up to `buf.len()` bytes. Zero is only end-of-file when
    /// [`is_end_of_file`](Self::is_end_of_file) agrees.
    fn read(&mut self, file: &FileHandle, buf: &mut [u8]) -> usize;

    /// Whether the read position of `file` is at its end.
    fn is_end_of_file(&self, file: &FileHandle) -> bool;

    /// Whether the volume ran out of free space.
    fn is_volume_full(&self) -> bool;

    /// Shut the engine down, flushing everything. Returns `true` when done.
    fn destroy(&mut self) -> bool;
}
