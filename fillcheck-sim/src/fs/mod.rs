//! Deterministic poll-driven filesystem engine.
//!
//! [`SimFilesystem`] implements [`AsyncFilesystem`] over any [`BlockStore`].
//! It does not try to be a FAT implementation. It reproduces the observable
//! behaviour a caller of a non-blocking embedded filesystem has to cope with:
//!
//! - mount time spent in `Initializing`
//! - mkdir/open callbacks that fire inline or several polls later
//! - writes that stop at sector boundaries, stall behind in-flight flushes or
//!   come up short, and a sticky volume-full condition
//! - reads that return zero bytes while a sector loads
//! - closes that take several polls and flush the tail sector
//!
//! Directory metadata is kept in memory. File payload sectors are written to
//! the block store and read back from it, so data integrity is checked
//! end-to-end through the store.

mod handle;
mod namespace;

use handle::{Flush, Load, OpenEntry, OpenKind, Reader, Writer};
use namespace::{Allocator, Namespace, NodeId, NodeKind, ROOT};

use crate::block::{BlockStore, SECTOR_SIZE};
use crate::config::SimFsConfiguration;
use crate::sometimes_assert;
use fillcheck_core::{
    AsyncFilesystem, EngineError, EngineResult, FileCallback, FileHandle, FilesystemState,
    OpenMode,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::io;
use std::ops::Range;

/// Smallest store a volume can be formatted on: header, root directory and
/// one free sector.
pub const MIN_VOLUME_SECTORS: u64 = 3;

const HEADER_SECTOR: u64 = 0;
const ROOT_SECTOR: u64 = 1;
const VOLUME_MAGIC: &[u8; 8] = b"FILLCHK1";

#[derive(Debug)]
enum Request {
    Mkdir { name: String },
    Open { path: String, mode: OpenMode },
}

struct PendingOp {
    due: u64,
    request: Request,
    on_complete: FileCallback,
}

/// Simulated non-blocking filesystem.
///
/// # Example
///
/// ```ignore
/// use fillcheck_sim::{MemoryBlockStore, SimFilesystem, SimFsConfiguration};
///
/// let store = MemoryBlockStore::new(2048, 0);
/// let mut fs = SimFilesystem::new(store, SimFsConfiguration::default())?;
/// while fs.state() != FilesystemState::Ready {
///     fs.poll();
/// }
/// ```
pub struct SimFilesystem<B: BlockStore> {
    store: B,
    config: SimFsConfiguration,
    rng: ChaCha8Rng,
    state: FilesystemState,
    mount_remaining: u32,
    tick: u64,
    namespace: Namespace,
    allocator: Allocator,
    cwd: NodeId,
    handles: BTreeMap<u32, OpenEntry>,
    next_handle: u32,
    pending: Vec<PendingOp>,
    shutting_down: bool,
    destroyed: bool,
}

impl<B: BlockStore> SimFilesystem<B> {
    /// Create an engine over `store`. The volume is formatted during mount.
    pub fn new(store: B, config: SimFsConfiguration) -> EngineResult<Self> {
        config.validate()?;
        let sectors = store.sector_count();
        if sectors < MIN_VOLUME_SECTORS {
            return Err(EngineError::ImageTooSmall {
                sectors,
                minimum: MIN_VOLUME_SECTORS,
            });
        }
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            store,
            config,
            state: FilesystemState::Unknown,
            mount_remaining: 0,
            tick: 0,
            namespace: Namespace::new(ROOT_SECTOR),
            allocator: Allocator::new(sectors),
            cwd: ROOT,
            handles: BTreeMap::new(),
            next_handle: 1,
            pending: Vec::new(),
            shutting_down: false,
            destroyed: false,
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &SimFsConfiguration {
        &self.config
    }

    /// Number of polls so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Sectors not yet allocated.
    pub fn free_sectors(&self) -> u64 {
        self.allocator.free_sectors()
    }

    /// Handles not yet closed.
    pub fn open_handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Length of the file at absolute `path`, if it exists.
    pub fn file_len(&self, path: &str) -> Option<u64> {
        let (dir, leaf) = self.namespace.resolve(ROOT, path)?;
        let node = self.namespace.lookup(dir, &leaf)?;
        self.namespace.file_extent(node).map(|(_, len)| len)
    }

    /// The backing store.
    pub fn store(&self) -> &B {
        &self.store
    }

    /// Consume the engine and return its store.
    pub fn into_store(self) -> B {
        self.store
    }

    fn fail(&mut self, what: &str, err: &io::Error) {
        tracing::error!("Block store failure while {}: {}", what, err);
        self.state = FilesystemState::Fatal;
    }

    fn sample(&mut self, range: Range<u32>) -> u64 {
        if range.start >= range.end {
            u64::from(range.start)
        } else {
            u64::from(self.rng.random_range(range))
        }
    }

    fn chance(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.rng.random::<f64>() < probability
    }

    fn format(&mut self) {
        let mut header = [0u8; SECTOR_SIZE];
        header[..8].copy_from_slice(VOLUME_MAGIC);
        header[8..16].copy_from_slice(&self.store.sector_count().to_le_bytes());
        header[16..20].copy_from_slice(&(SECTOR_SIZE as u32).to_le_bytes());
        if let Err(e) = self.store.write_sector(HEADER_SECTOR, &header) {
            self.fail("writing the volume header", &e);
            return;
        }
        self.allocator.reserve(HEADER_SECTOR);
        self.allocator.reserve(ROOT_SECTOR);
        self.state = FilesystemState::Ready;
        tracing::info!(
            "Volume formatted: {} sectors, {} free",
            self.store.sector_count(),
            self.allocator.free_sectors()
        );
    }

    fn allocate(&mut self, purpose: &str) -> Option<u64> {
        let was_full = self.allocator.is_full();
        let lba = self.allocator.allocate();
        if lba.is_none() && !was_full {
            tracing::info!("Volume full while allocating a {} sector", purpose);
        }
        lba
    }

    /// Make room for one more entry in `dir`.
    fn reserve_entry(&mut self, dir: NodeId) -> bool {
        if !self.namespace.needs_entry_sector(dir) {
            return true;
        }
        match self.allocate("directory entry") {
            Some(lba) => {
                self.namespace.add_entry_sector(dir, lba);
                true
            }
            None => false,
        }
    }

    fn register(&mut self, node: NodeId, kind: OpenKind) -> FileHandle {
        let id = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        self.handles.insert(id, OpenEntry::new(node, kind));
        FileHandle::new(id)
    }

    fn submit(&mut self, request: Request, on_complete: FileCallback) {
        if self.state != FilesystemState::Ready || self.shutting_down {
            tracing::warn!("{:?} rejected: filesystem not ready", request);
            on_complete(None);
            return;
        }

        let inline = self.chance(self.config.inline_completion_probability);
        sometimes_assert!(callback_inline, inline);
        if inline {
            let result = self.resolve(request);
            on_complete(result);
        } else {
            let delay = self.sample(self.config.op_latency.clone()).max(1);
            self.pending.push(PendingOp {
                due: self.tick + delay,
                request,
                on_complete,
            });
        }
    }

    fn resolve(&mut self, request: Request) -> Option<FileHandle> {
        if self.chance(self.config.create_failure_probability) {
            tracing::debug!("Injected failure for {:?}", request);
            return None;
        }
        match request {
            Request::Mkdir { name } => self.make_directory(&name),
            Request::Open { path, mode } => self.open_path(&path, mode),
        }
    }

    fn make_directory(&mut self, name: &str) -> Option<FileHandle> {
        let Some((parent, leaf)) = self.namespace.resolve(self.cwd, name) else {
            tracing::debug!("mkdir: invalid name {:?}", name);
            return None;
        };

        if let Some(existing) = self.namespace.lookup(parent, &leaf) {
            if self.namespace.is_file(existing) {
                tracing::debug!("mkdir: {} exists and is a file", leaf);
                return None;
            }
            return Some(self.register(existing, OpenKind::Directory));
        }

        if !self.reserve_entry(parent) {
            return None;
        }
        let lba = self.allocate("directory")?;
        let node = self.namespace.insert(
            parent,
            leaf,
            NodeKind::Directory {
                entries: BTreeMap::new(),
                sectors: vec![lba],
            },
        );
        tracing::debug!("Created directory {}", self.namespace.node(node).name);
        Some(self.register(node, OpenKind::Directory))
    }

    fn open_path(&mut self, path: &str, mode: OpenMode) -> Option<FileHandle> {
        let Some((parent, leaf)) = self.namespace.resolve(self.cwd, path) else {
            tracing::debug!("open: invalid path {:?}", path);
            return None;
        };

        match (mode, self.namespace.lookup(parent, &leaf)) {
            (_, Some(node)) if self.namespace.is_directory(node) => {
                tracing::debug!("open: {} is a directory", leaf);
                None
            }
            (OpenMode::Read, Some(node)) => {
                Some(self.register(node, OpenKind::Reader(Reader::default())))
            }
            (OpenMode::Read, None) => {
                tracing::debug!("open: {} not found", leaf);
                None
            }
            (OpenMode::AppendSequential, Some(node)) => {
                let writer = self.resume_writer(node)?;
                Some(self.register(node, OpenKind::Writer(writer)))
            }
            (OpenMode::AppendSequential, None) => {
                if !self.reserve_entry(parent) {
                    return None;
                }
                let node = self.namespace.insert(
                    parent,
                    leaf,
                    NodeKind::File {
                        sectors: Vec::new(),
                        len: 0,
                    },
                );
                tracing::debug!("Created file {}", self.namespace.node(node).name);
                Some(self.register(node, OpenKind::Writer(Writer::empty())))
            }
        }
    }

    /// Writer positioned at the end of existing file `node`.
    fn resume_writer(&mut self, node: NodeId) -> Option<Writer> {
        let (sectors, len) = self.namespace.file_extent(node)?;
        let fill = (len % SECTOR_SIZE as u64) as usize;
        if fill == 0 {
            return Some(Writer::empty());
        }
        let lba = *sectors.last()?;
        let mut contents = Box::new([0u8; SECTOR_SIZE]);
        if let Err(e) = self.store.read_sector(lba, &mut contents) {
            self.fail("loading the tail sector for append", &e);
            return None;
        }
        Some(Writer::resume(lba, contents, fill))
    }

    fn start_flush(&mut self, w: &mut Writer) {
        let Some(lba) = w.sector.take() else {
            return;
        };
        let data = std::mem::replace(&mut w.cache, Box::new([0; SECTOR_SIZE]));
        w.fill = 0;
        let due = self.tick + self.sample(self.config.sector_write_latency.clone());
        w.flush = Some(Flush { lba, data, due });
        if due <= self.tick {
            self.commit_flush(w);
        }
    }

    fn commit_flush(&mut self, w: &mut Writer) {
        let Some(flush) = w.flush.take() else {
            return;
        };
        match self.store.write_sector(flush.lba, &flush.data) {
            Ok(()) => tracing::trace!("Flushed sector {}", flush.lba),
            Err(e) => self.fail("flushing a data sector", &e),
        }
    }

    fn commit_load(&mut self, r: &mut Reader) {
        let Some(load) = r.load.take() else {
            return;
        };
        let mut data = Box::new([0u8; SECTOR_SIZE]);
        match self.store.read_sector(load.lba, &mut data) {
            Ok(()) => r.loaded = Some((load.lba, data)),
            Err(e) => self.fail("loading a data sector", &e),
        }
    }

    fn advance_io(&mut self) {
        let ids: Vec<u32> = self.handles.keys().copied().collect();
        for id in ids {
            if let Some(mut entry) = self.handles.remove(&id) {
                self.advance_entry(&mut entry);
                self.handles.insert(id, entry);
            }
        }

        let tick = self.tick;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|op| op.due <= tick);
        self.pending = waiting;
        for op in due {
            let result = self.resolve(op.request);
            (op.on_complete)(result);
        }
    }

    fn advance_entry(&mut self, entry: &mut OpenEntry) {
        let closing = entry.closing.is_some();
        match &mut entry.kind {
            OpenKind::Writer(w) => {
                if w.flush.as_ref().is_some_and(|f| f.due <= self.tick) {
                    self.commit_flush(w);
                }
                if closing && w.flush.is_none() && w.fill > 0 {
                    self.start_flush(w);
                }
            }
            OpenKind::Reader(r) => {
                if r.load.is_some_and(|l| l.due <= self.tick) {
                    self.commit_load(r);
                }
            }
            OpenKind::Directory => {}
        }
    }

    fn close_id(&mut self, id: u32) -> bool {
        let Some(mut entry) = self.handles.remove(&id) else {
            return true;
        };
        if entry.closing.is_none() {
            let due = self.tick + self.sample(self.config.close_latency.clone());
            entry.closing = Some(due);
        }

        let done = self.progress_close(&mut entry);
        if done {
            tracing::trace!("Closed handle {}", id);
        } else {
            self.handles.insert(id, entry);
        }
        done
    }

    fn progress_close(&mut self, entry: &mut OpenEntry) -> bool {
        if let OpenKind::Writer(w) = &mut entry.kind {
            if w.flush.is_none() && w.fill > 0 {
                self.start_flush(w);
            }
            if w.flush.is_some() {
                return false;
            }
        }
        entry.closing.is_some_and(|due| due <= self.tick)
    }

    fn write_entry(&mut self, entry: &mut OpenEntry, buf: &[u8]) -> usize {
        if entry.closing.is_some() {
            return 0;
        }
        let node = entry.node;
        let OpenKind::Writer(w) = &mut entry.kind else {
            return 0;
        };

        sometimes_assert!(write_stalled, w.flush.is_some());
        if w.flush.is_some() {
            return 0;
        }

        if w.sector.is_none() {
            let Some(lba) = self.allocate("file data") else {
                return 0;
            };
            w.sector = Some(lba);
            self.namespace.push_file_sector(node, lba);
        }

        let mut accepted = (SECTOR_SIZE - w.fill).min(buf.len());
        if accepted > 1 && self.chance(self.config.partial_write_probability) {
            accepted = self.rng.random_range(1..accepted);
        }
        sometimes_assert!(write_partial, accepted < buf.len());

        w.cache[w.fill..w.fill + accepted].copy_from_slice(&buf[..accepted]);
        w.fill += accepted;
        self.namespace.grow_file(node, accepted as u64);
        if w.fill == SECTOR_SIZE {
            self.start_flush(w);
        }
        accepted
    }

    fn read_entry(&mut self, entry: &mut OpenEntry, buf: &mut [u8]) -> usize {
        if entry.closing.is_some() {
            return 0;
        }
        let node = entry.node;
        let OpenKind::Reader(r) = &mut entry.kind else {
            return 0;
        };

        let Some((sectors, len)) = self.namespace.file_extent(node) else {
            return 0;
        };
        if r.pos >= len {
            return 0;
        }
        let Some(&lba) = sectors.get((r.pos / SECTOR_SIZE as u64) as usize) else {
            return 0;
        };

        if r.cached(lba).is_none() {
            if r.load.is_none_or(|l| l.lba != lba) {
                let due = self.tick + self.sample(self.config.sector_read_latency.clone());
                r.load = Some(Load { lba, due });
            }
            if r.load.is_some_and(|l| l.due <= self.tick) {
                self.commit_load(r);
            }
        }

        let stalled = r.cached(lba).is_none();
        sometimes_assert!(read_stalled, stalled);
        let Some(sector) = r.cached(lba) else {
            return 0;
        };

        let offset = (r.pos % SECTOR_SIZE as u64) as usize;
        let n = buf
            .len()
            .min(SECTOR_SIZE - offset)
            .min((len - r.pos) as usize);
        buf[..n].copy_from_slice(&sector[offset..offset + n]);
        r.pos += n as u64;
        n
    }
}

impl<B: BlockStore> AsyncFilesystem for SimFilesystem<B> {
    fn poll(&mut self) {
        self.tick += 1;

        if self.state == FilesystemState::Unknown && !self.shutting_down {
            self.state = FilesystemState::Initializing;
            self.mount_remaining = self.config.mount_polls;
            tracing::debug!("Mounting volume ({} sectors)", self.store.sector_count());
        }

        if self.state == FilesystemState::Initializing {
            if self.mount_remaining == 0 {
                self.format();
            } else {
                self.mount_remaining -= 1;
            }
        }

        if self.state == FilesystemState::Ready {
            self.advance_io();
        }
    }

    fn state(&self) -> FilesystemState {
        self.state
    }

    fn mkdir(&mut self, name: &str, on_complete: FileCallback) {
        self.submit(
            Request::Mkdir {
                name: name.to_string(),
            },
            on_complete,
        );
    }

    fn open(&mut self, path: &str, mode: OpenMode, on_complete: FileCallback) {
        self.submit(
            Request::Open {
                path: path.to_string(),
                mode,
            },
            on_complete,
        );
    }

    fn change_directory(&mut self, dir: &FileHandle) -> bool {
        match self.handles.get(&dir.id()) {
            Some(entry) if matches!(entry.kind, OpenKind::Directory) && entry.closing.is_none() => {
                self.cwd = entry.node;
                tracing::debug!(
                    "Changed directory to {}",
                    self.namespace.node(entry.node).name
                );
                true
            }
            _ => false,
        }
    }

    fn close(&mut self, file: &FileHandle) -> bool {
        self.close_id(file.id())
    }

    fn write(&mut self, file: &FileHandle, buf: &[u8]) -> usize {
        if self.state != FilesystemState::Ready || buf.is_empty() {
            return 0;
        }
        let Some(mut entry) = self.handles.remove(&file.id()) else {
            return 0;
        };
        let accepted = self.write_entry(&mut entry, buf);
        self.handles.insert(file.id(), entry);
        accepted
    }

    fn read(&mut self, file: &FileHandle, buf: &mut [u8]) -> usize {
        if self.state != FilesystemState::Ready || buf.is_empty() {
            return 0;
        }
        let Some(mut entry) = self.handles.remove(&file.id()) else {
            return 0;
        };
        let read = self.read_entry(&mut entry, buf);
        self.handles.insert(file.id(), entry);
        read
    }

    fn is_end_of_file(&self, file: &FileHandle) -> bool {
        match self.handles.get(&file.id()) {
            Some(OpenEntry {
                node,
                kind: OpenKind::Reader(r),
                ..
            }) => self
                .namespace
                .file_extent(*node)
                .is_none_or(|(_, len)| r.pos >= len),
            _ => true,
        }
    }

    fn is_volume_full(&self) -> bool {
        self.allocator.is_full()
    }

    fn destroy(&mut self) -> bool {
        if self.destroyed {
            return true;
        }
        if !self.shutting_down {
            self.shutting_down = true;
            tracing::info!(
                "Shutting down filesystem ({} open handles)",
                self.handles.len()
            );
        }

        self.poll();
        for op in std::mem::take(&mut self.pending) {
            (op.on_complete)(None);
        }

        if self.state == FilesystemState::Fatal {
            self.destroyed = true;
            return true;
        }

        let ids: Vec<u32> = self.handles.keys().copied().collect();
        let mut all_closed = true;
        for id in ids {
            all_closed &= self.close_id(id);
        }
        if !all_closed {
            return false;
        }

        if let Err(e) = self.store.flush() {
            self.fail("flushing the block store", &e);
        } else {
            self.state = FilesystemState::Unknown;
        }
        self.destroyed = true;
        true
    }
}
