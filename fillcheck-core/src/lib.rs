//! # fillcheck-core
//!
//! Core abstractions shared by the fillcheck driver and the engines it
//! exercises.
//!
//! The driver never talks to a concrete filesystem. It consumes the
//! [`AsyncFilesystem`] trait, a non-blocking, callback-driven API in which
//! every operation is a request and progress is made by calling
//! [`AsyncFilesystem::poll`] repeatedly:
//!
//! - **Requests with callbacks**: [`AsyncFilesystem::mkdir`] and
//!   [`AsyncFilesystem::open`] report their outcome through a
//!   [`FileCallback`]. The callback may run *before the request returns* or
//!   during a later poll. Callers must be correct in both cases.
//! - **Requests polled to completion**: [`AsyncFilesystem::close`] and
//!   [`AsyncFilesystem::destroy`] return `true` once done and are simply
//!   called again until they do.
//! - **Best-effort transfers**: [`AsyncFilesystem::write`] and
//!   [`AsyncFilesystem::read`] move as many bytes as the engine can take right
//!   now, possibly zero.
//!
//! ## Core Types
//!
//! - [`FileHandle`]: exclusively-owned reference to an open file or directory
//! - [`OpenMode`]: how a file is opened (`"as"` or `"r"`)
//! - [`FilesystemState`]: overall engine readiness
//! - [`EngineError`]: failures constructing or backing an engine

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod error;
mod filesystem;
mod types;

// Error exports
pub use error::{EngineError, EngineResult};

// Engine interface exports
pub use filesystem::{AsyncFilesystem, FileCallback};

// Core type exports
pub use types::{FileHandle, FilesystemState, OpenMode, ParseModeError};
