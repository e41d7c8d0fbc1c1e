//! Block store backed by an image file.

use super::{BlockStore, SECTOR_SIZE, Sector, check_lba};
use fillcheck_core::{EngineError, EngineResult};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Block store whose sectors live in a regular file.
#[derive(Debug)]
pub struct ImageBlockStore {
    file: File,
    sectors: u64,
}

impl ImageBlockStore {
    /// Open an existing image. Its length must be a non-zero whole number of
    /// sectors.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 || len % SECTOR_SIZE as u64 != 0 {
            return Err(EngineError::InvalidGeometry {
                len,
                sector_size: SECTOR_SIZE,
            });
        }
        tracing::debug!("Opened image {} ({} sectors)", path.display(), len / SECTOR_SIZE as u64);
        Ok(Self {
            file,
            sectors: len / SECTOR_SIZE as u64,
        })
    }

    /// Create (or resize) an image of `sectors` sectors and open it.
    pub fn create(path: impl AsRef<Path>, sectors: u64) -> EngineResult<Self> {
        let path = path.as_ref();
        let len = sectors
            .checked_mul(SECTOR_SIZE as u64)
            .ok_or(EngineError::ImageTooLarge { sectors })?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(len)?;
        drop(file);
        tracing::info!("Created image {} with {} sectors", path.display(), sectors);
        Self::open(path)
    }

    fn seek_to(&mut self, lba: u64) -> io::Result<()> {
        check_lba(lba, self.sectors)?;
        self.file.seek(SeekFrom::Start(lba * SECTOR_SIZE as u64))?;
        Ok(())
    }
}

impl BlockStore for ImageBlockStore {
    fn sector_count(&self) -> u64 {
        self.sectors
    }

    fn read_sector(&mut self, lba: u64, buf: &mut Sector) -> io::Result<()> {
        self.seek_to(lba)?;
        self.file.read_exact(buf)
    }

    fn write_sector(&mut self, lba: u64, buf: &Sector) -> io::Result<()> {
        self.seek_to(lba)?;
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}
