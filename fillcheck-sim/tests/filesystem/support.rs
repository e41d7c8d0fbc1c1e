//! Blocking helpers over the poll-driven interface.

use fillcheck_core::{AsyncFilesystem, FileCallback, FileHandle, FilesystemState, OpenMode};
use std::cell::RefCell;
use std::rc::Rc;

/// Upper bound on polls spent waiting for any single operation.
const POLL_LIMIT: usize = 10_000;

pub type Slot = Rc<RefCell<Option<Option<FileHandle>>>>;

/// A callback that stores its result in the returned slot.
pub fn capture() -> (Slot, FileCallback) {
    let slot: Slot = Rc::new(RefCell::new(None));
    let writer = slot.clone();
    (
        slot,
        Box::new(move |handle| *writer.borrow_mut() = Some(handle)),
    )
}

/// Poll until the engine leaves `Unknown`/`Initializing`.
pub fn mount(fs: &mut impl AsyncFilesystem) {
    for _ in 0..POLL_LIMIT {
        fs.poll();
        if fs.state() != FilesystemState::Initializing {
            assert_eq!(fs.state(), FilesystemState::Ready, "mount failed");
            return;
        }
    }
    panic!("engine never finished mounting");
}

fn wait<F: AsyncFilesystem>(fs: &mut F, slot: Slot) -> Option<FileHandle> {
    for _ in 0..POLL_LIMIT {
        if let Some(result) = slot.borrow_mut().take() {
            return result;
        }
        fs.poll();
    }
    panic!("callback never fired");
}

pub fn mkdir(fs: &mut impl AsyncFilesystem, name: &str) -> Option<FileHandle> {
    let (slot, callback) = capture();
    fs.mkdir(name, callback);
    wait(fs, slot)
}

pub fn open(fs: &mut impl AsyncFilesystem, path: &str, mode: OpenMode) -> Option<FileHandle> {
    let (slot, callback) = capture();
    fs.open(path, mode, callback);
    wait(fs, slot)
}

/// Write all of `data`, polling whenever the engine accepts nothing.
///
/// Returns the number of bytes accepted before the volume filled up.
pub fn write_all(fs: &mut impl AsyncFilesystem, file: &FileHandle, data: &[u8]) -> usize {
    let mut written = 0;
    let mut idle = 0;
    while written < data.len() {
        let n = fs.write(file, &data[written..]);
        if n == 0 {
            if fs.is_volume_full() || fs.state() != FilesystemState::Ready {
                break;
            }
            idle += 1;
            assert!(idle < POLL_LIMIT, "write never made progress");
            fs.poll();
        } else {
            idle = 0;
            written += n;
        }
    }
    written
}

/// Read until end-of-file in chunks of `chunk` bytes.
pub fn read_to_end(fs: &mut impl AsyncFilesystem, file: &FileHandle, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    let mut idle = 0;
    loop {
        let n = fs.read(file, &mut buf);
        if n > 0 {
            idle = 0;
            out.extend_from_slice(&buf[..n]);
        } else if fs.is_end_of_file(file) {
            return out;
        } else {
            idle += 1;
            assert!(idle < POLL_LIMIT, "read never made progress");
            fs.poll();
        }
    }
}

pub fn close(fs: &mut impl AsyncFilesystem, file: &FileHandle) {
    for _ in 0..POLL_LIMIT {
        if fs.close(file) {
            return;
        }
        fs.poll();
    }
    panic!("close never completed");
}

pub fn destroy(fs: &mut impl AsyncFilesystem) {
    for _ in 0..POLL_LIMIT {
        if fs.destroy() {
            return;
        }
    }
    panic!("destroy never completed");
}

/// Recognizable test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
