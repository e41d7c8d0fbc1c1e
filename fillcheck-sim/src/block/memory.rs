//! In-memory block store.
//!
//! Sectors that were never written read back as deterministic pseudo-random
//! bytes derived from the store seed and the sector number, the way real
//! media returns whatever happened to be there. An engine that forgets to
//! write a sector before reading it gets garbage, not convenient zeros.

use super::{BlockStore, SECTOR_SIZE, Sector, check_lba};
use crate::bitset::SectorBitSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io;

/// Block store holding the whole image in memory.
///
/// # Example
///
/// ```ignore
/// use fillcheck_sim::{BlockStore, MemoryBlockStore, SECTOR_SIZE};
///
/// let mut store = MemoryBlockStore::new(16, 42);
/// store.write_sector(3, &[0xAB; SECTOR_SIZE])?;
/// ```
#[derive(Debug)]
pub struct MemoryBlockStore {
    data: Vec<u8>,
    written: SectorBitSet,
    seed: u64,
    sector_writes: u64,
    /// Sector writes allowed before every further write fails
    fail_writes_after: Option<u64>,
}

impl MemoryBlockStore {
    /// Create a store of `sectors` sectors.
    ///
    /// `seed` drives the contents of never-written sectors.
    pub fn new(sectors: u64, seed: u64) -> Self {
        let sectors = sectors as usize;
        Self {
            data: vec![0; sectors * SECTOR_SIZE],
            written: SectorBitSet::new(sectors),
            seed,
            sector_writes: 0,
            fail_writes_after: None,
        }
    }

    /// Fail every sector write once `writes` writes have succeeded.
    pub fn fail_writes_after(mut self, writes: u64) -> Self {
        self.fail_writes_after = Some(writes);
        self
    }

    /// Number of sector writes that reached the store.
    pub fn sector_writes(&self) -> u64 {
        self.sector_writes
    }

    /// Number of distinct sectors ever written.
    pub fn written_sectors(&self) -> usize {
        self.written.count_set()
    }

    /// Deterministic contents of a never-written sector.
    fn fill_unwritten_sector(&self, lba: u64, buf: &mut Sector) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(lba));
        rng.fill(&mut buf[..]);
    }
}

impl BlockStore for MemoryBlockStore {
    fn sector_count(&self) -> u64 {
        self.written.len() as u64
    }

    fn read_sector(&mut self, lba: u64, buf: &mut Sector) -> io::Result<()> {
        check_lba(lba, self.sector_count())?;
        if !self.written.is_set(lba as usize) {
            self.fill_unwritten_sector(lba, buf);
            return Ok(());
        }
        let start = lba as usize * SECTOR_SIZE;
        buf.copy_from_slice(&self.data[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&mut self, lba: u64, buf: &Sector) -> io::Result<()> {
        check_lba(lba, self.sector_count())?;
        if let Some(limit) = self.fail_writes_after
            && self.sector_writes >= limit
        {
            return Err(io::Error::other(format!(
                "injected write failure at sector {lba}"
            )));
        }
        let start = lba as usize * SECTOR_SIZE;
        self.data[start..start + SECTOR_SIZE].copy_from_slice(buf);
        self.written.set(lba as usize);
        self.sector_writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
