//! Sector allocation and the sticky volume-full condition.

use crate::support::{close, mount, open, pattern, read_to_end, write_all};
use fillcheck_core::{AsyncFilesystem, EngineError, OpenMode};
use fillcheck_sim::{MemoryBlockStore, SECTOR_SIZE, SimFilesystem, SimFsConfiguration};

#[test]
fn test_fill_until_volume_full() {
    let sectors = 64;
    let mut fs = SimFilesystem::new(
        MemoryBlockStore::new(sectors, 0),
        SimFsConfiguration::fast_local(),
    )
    .expect("engine construction failed");
    mount(&mut fs);
    // Header and root directory.
    assert_eq!(fs.free_sectors(), sectors - 2);

    let capacity = (sectors as usize - 2) * SECTOR_SIZE;
    let data = pattern(capacity + 1000);
    let file = open(&mut fs, "BIG.BIN", OpenMode::AppendSequential).expect("create failed");
    assert!(!fs.is_volume_full());
    assert_eq!(write_all(&mut fs, &file, &data), capacity);
    assert!(fs.is_volume_full());
    assert_eq!(fs.free_sectors(), 0);
    assert_eq!(fs.write(&file, b"more"), 0);
    close(&mut fs, &file);

    let file = open(&mut fs, "BIG.BIN", OpenMode::Read).expect("open failed");
    assert_eq!(read_to_end(&mut fs, &file, 512), &data[..capacity]);
}

#[test]
fn test_volume_full_is_sticky_for_new_files() {
    let mut fs = SimFilesystem::new(
        MemoryBlockStore::new(8, 0),
        SimFsConfiguration::fast_local(),
    )
    .expect("engine construction failed");
    mount(&mut fs);

    let file = open(&mut fs, "A", OpenMode::AppendSequential).expect("create failed");
    write_all(&mut fs, &file, &pattern(10 * SECTOR_SIZE));
    close(&mut fs, &file);
    assert!(fs.is_volume_full());

    // The entry fits in the root directory sector, but no data sector is left.
    let file = open(&mut fs, "B", OpenMode::AppendSequential).expect("create failed");
    assert_eq!(fs.write(&file, b"x"), 0);
    assert!(fs.is_volume_full());
    close(&mut fs, &file);
    assert_eq!(fs.file_len("/B"), Some(0));
}

#[test]
fn test_directory_entries_consume_sectors() {
    let mut fs = SimFilesystem::new(
        MemoryBlockStore::new(32, 0),
        SimFsConfiguration::fast_local(),
    )
    .expect("engine construction failed");
    mount(&mut fs);
    let free = fs.free_sectors();

    for i in 0..16 {
        let file = open(&mut fs, &format!("F{i}"), OpenMode::AppendSequential)
            .expect("create failed");
        close(&mut fs, &file);
    }
    assert_eq!(fs.free_sectors(), free);

    let file = open(&mut fs, "F16", OpenMode::AppendSequential).expect("create failed");
    close(&mut fs, &file);
    assert_eq!(fs.free_sectors(), free - 1);
}

#[test]
fn test_store_too_small() {
    let result = SimFilesystem::new(MemoryBlockStore::new(2, 0), SimFsConfiguration::new());
    assert!(matches!(
        result,
        Err(EngineError::ImageTooSmall {
            sectors: 2,
            minimum: 3
        })
    ));
}
