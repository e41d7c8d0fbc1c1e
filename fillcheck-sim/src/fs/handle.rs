//! Engine-side state behind a [`FileHandle`](fillcheck_core::FileHandle).

use super::namespace::NodeId;
use crate::block::{SECTOR_SIZE, Sector};

/// An open file or directory.
#[derive(Debug)]
pub(crate) struct OpenEntry {
    pub(crate) node: NodeId,
    pub(crate) kind: OpenKind,
    /// Tick at which a requested close may complete
    pub(crate) closing: Option<u64>,
}

impl OpenEntry {
    pub(crate) fn new(node: NodeId, kind: OpenKind) -> Self {
        Self {
            node,
            kind,
            closing: None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum OpenKind {
    Directory,
    Writer(Writer),
    Reader(Reader),
}

/// Sequential writer with a one-sector cache.
#[derive(Debug)]
pub(crate) struct Writer {
    pub(crate) cache: Box<Sector>,
    /// Bytes of `cache` holding file data
    pub(crate) fill: usize,
    /// Sector the cache will be flushed to
    pub(crate) sector: Option<u64>,
    pub(crate) flush: Option<Flush>,
}

impl Writer {
    pub(crate) fn empty() -> Self {
        Self {
            cache: Box::new([0; SECTOR_SIZE]),
            fill: 0,
            sector: None,
            flush: None,
        }
    }

    /// Resume appending inside the partially filled sector `lba`.
    pub(crate) fn resume(lba: u64, contents: Box<Sector>, fill: usize) -> Self {
        Self {
            cache: contents,
            fill,
            sector: Some(lba),
            flush: None,
        }
    }
}

/// A sector on its way to the block store.
#[derive(Debug)]
pub(crate) struct Flush {
    pub(crate) lba: u64,
    pub(crate) data: Box<Sector>,
    pub(crate) due: u64,
}

/// Sequential reader with a one-sector cache.
#[derive(Debug, Default)]
pub(crate) struct Reader {
    pub(crate) pos: u64,
    pub(crate) loaded: Option<(u64, Box<Sector>)>,
    pub(crate) load: Option<Load>,
}

/// A sector load in flight.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Load {
    pub(crate) lba: u64,
    pub(crate) due: u64,
}

impl Reader {
    /// Cached contents of `lba`, if loaded.
    pub(crate) fn cached(&self, lba: u64) -> Option<&Sector> {
        match &self.loaded {
            Some((loaded, data)) if *loaded == lba => Some(data),
            _ => None,
        }
    }
}
