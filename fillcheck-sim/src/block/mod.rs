//! Sector-addressed block stores backing the simulated filesystem.
//!
//! From the engine's point of view a store is synchronous: every call either
//! completes or fails before returning. Latency is modelled one layer up, in
//! the engine's poll loop.

use std::io;

/// In-memory store with deterministic unwritten-sector contents
pub mod memory;

/// Store backed by an image file on disk
pub mod image;

pub use image::ImageBlockStore;
pub use memory::MemoryBlockStore;

/// Size of a disk sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// One sector worth of bytes.
pub type Sector = [u8; SECTOR_SIZE];

/// Sector-addressed storage device.
pub trait BlockStore {
    /// Number of addressable sectors.
    fn sector_count(&self) -> u64;

    /// Read sector `lba` into `buf`.
    fn read_sector(&mut self, lba: u64, buf: &mut Sector) -> io::Result<()>;

    /// Write `buf` to sector `lba`.
    fn write_sector(&mut self, lba: u64, buf: &Sector) -> io::Result<()>;

    /// Make every completed write durable.
    fn flush(&mut self) -> io::Result<()>;
}

/// Reject sector addresses past the end of a store.
pub(crate) fn check_lba(lba: u64, sector_count: u64) -> io::Result<()> {
    if lba >= sector_count {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("sector {lba} past end of store ({sector_count} sectors)"),
        ));
    }
    Ok(())
}
