//! Basic engine operations: directories, append writes, sequential reads.

use crate::support::{close, mkdir, mount, open, pattern, read_to_end, write_all};
use fillcheck_core::{AsyncFilesystem, OpenMode};
use fillcheck_sim::{MemoryBlockStore, SimFilesystem, SimFsConfiguration};

fn fast_fs(sectors: u64) -> SimFilesystem<MemoryBlockStore> {
    let mut fs = SimFilesystem::new(
        MemoryBlockStore::new(sectors, 3),
        SimFsConfiguration::fast_local(),
    )
    .expect("engine construction failed");
    mount(&mut fs);
    fs
}

#[test]
fn test_write_then_read_back() {
    for config in [
        SimFsConfiguration::fast_local(),
        SimFsConfiguration::default(),
        SimFsConfiguration::random_for_seed(11),
    ] {
        let mut fs = SimFilesystem::new(MemoryBlockStore::new(256, 5), config)
            .expect("engine construction failed");
        mount(&mut fs);

        let logs = mkdir(&mut fs, "logs").expect("mkdir failed");
        assert!(fs.change_directory(&logs));

        let data = pattern(2000);
        let file = open(&mut fs, "LOG00000.TXT", OpenMode::AppendSequential)
            .expect("open for append failed");
        assert_eq!(write_all(&mut fs, &file, &data), data.len());
        close(&mut fs, &file);

        assert_eq!(fs.file_len("/logs/LOG00000.TXT"), Some(2000));

        let file = open(&mut fs, "LOG00000.TXT", OpenMode::Read).expect("open for read failed");
        assert_eq!(read_to_end(&mut fs, &file, 64), data);
        close(&mut fs, &file);
        assert_eq!(fs.open_handle_count(), 1);
    }
}

#[test]
fn test_names_are_case_insensitive() {
    let mut fs = fast_fs(64);
    let file = open(&mut fs, "log.txt", OpenMode::AppendSequential).expect("create failed");
    write_all(&mut fs, &file, b"hello");
    close(&mut fs, &file);

    let file = open(&mut fs, "LOG.TXT", OpenMode::Read).expect("open failed");
    assert_eq!(read_to_end(&mut fs, &file, 16), b"hello");
    assert_eq!(fs.file_len("/Log.Txt"), Some(5));
}

#[test]
fn test_open_missing_file_for_read_fails() {
    let mut fs = fast_fs(64);
    assert!(open(&mut fs, "MISSING.TXT", OpenMode::Read).is_none());
    assert!(open(&mut fs, "nodir/FILE.TXT", OpenMode::AppendSequential).is_none());
}

#[test]
fn test_append_resumes_partial_sector() {
    let mut fs = fast_fs(64);
    let data = pattern(800);

    let file = open(&mut fs, "DATA.BIN", OpenMode::AppendSequential).expect("create failed");
    write_all(&mut fs, &file, &data[..700]);
    close(&mut fs, &file);

    let file = open(&mut fs, "DATA.BIN", OpenMode::AppendSequential).expect("reopen failed");
    write_all(&mut fs, &file, &data[700..]);
    close(&mut fs, &file);

    let file = open(&mut fs, "DATA.BIN", OpenMode::Read).expect("open failed");
    assert_eq!(read_to_end(&mut fs, &file, 100), data);
}

#[test]
fn test_mkdir_existing_directory_opens_it() {
    let mut fs = fast_fs(64);
    let first = mkdir(&mut fs, "logs").expect("mkdir failed");
    let free = fs.free_sectors();
    let second = mkdir(&mut fs, "LOGS").expect("second mkdir failed");
    assert_ne!(first.id(), second.id());
    assert_eq!(fs.free_sectors(), free);

    let file = open(&mut fs, "FILE", OpenMode::AppendSequential).expect("create failed");
    assert!(mkdir(&mut fs, "file").is_none());
    close(&mut fs, &file);
}

#[test]
fn test_change_directory_requires_directory_handle() {
    let mut fs = fast_fs(64);
    let file = open(&mut fs, "FILE", OpenMode::AppendSequential).expect("create failed");
    assert!(!fs.change_directory(&file));

    let sub = mkdir(&mut fs, "sub").expect("mkdir failed");
    assert!(fs.change_directory(&sub));
    let inner = open(&mut fs, "INNER", OpenMode::AppendSequential).expect("create failed");
    close(&mut fs, &inner);
    assert_eq!(fs.file_len("/SUB/INNER"), Some(0));
    assert_eq!(fs.file_len("/INNER"), None);
}

#[test]
fn test_read_stops_at_end_of_file() {
    let mut fs = fast_fs(64);
    let file = open(&mut fs, "SHORT", OpenMode::AppendSequential).expect("create failed");
    write_all(&mut fs, &file, b"abc");
    close(&mut fs, &file);

    let file = open(&mut fs, "SHORT", OpenMode::Read).expect("open failed");
    assert!(!fs.is_end_of_file(&file));
    let mut buf = [0u8; 64];
    assert_eq!(fs.read(&file, &mut buf), 3);
    assert!(fs.is_end_of_file(&file));
    assert_eq!(fs.read(&file, &mut buf), 0);
}
