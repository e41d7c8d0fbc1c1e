//! Runs against an image file, as the binary does.

use fillcheck::{DriverConfig, VolumeFillTest, run_to_completion};
use fillcheck_sim::{BlockStore, ImageBlockStore, SECTOR_SIZE, SimFilesystem, SimFsConfiguration};

#[test]
fn test_fill_image_file() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let path = dir.path().join("sdcard.img");
    let store = ImageBlockStore::create(&path, 151).expect("image creation failed");

    let mut fs = SimFilesystem::new(store, SimFsConfiguration::random_for_seed(3))
        .expect("engine construction failed");
    let mut test =
        VolumeFillTest::new(DriverConfig::new().entries_per_file(1000)).expect("valid config");
    let report = run_to_completion(&mut fs, &mut test).expect("run failed");

    assert_eq!(report.summary.files_written, 3);
    assert_eq!(report.summary.bytes_written_total, 75_360);

    // The last sector of LOG00002.TXT ends with entry 512.
    let mut store = fs.into_store();
    let mut last = [0u8; SECTOR_SIZE];
    store
        .read_sector(store.sector_count() - 1, &mut last)
        .expect("read failed");
    assert!(last.ends_with(b"Log 00002 entry    512/  1000\n"));
}
