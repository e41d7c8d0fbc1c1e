//! Counter invariants observed after every step, not just at the end.

use fillcheck::{DriverConfig, Tick, VolumeFillTest, format_entry, log_file_name};
use fillcheck_core::{AsyncFilesystem, FilesystemState};
use fillcheck_sim::{MemoryBlockStore, SimFilesystem, SimFsConfiguration};

const ENTRIES_PER_FILE: u64 = 300;
const POLL_LIMIT: u64 = 10_000_000;

fn full_file_len(file_index: u32) -> u64 {
    (1..=ENTRIES_PER_FILE)
        .map(|n| format_entry(file_index, n, ENTRIES_PER_FILE).len() as u64)
        .sum()
}

#[test]
fn test_counters_hold_at_every_step() {
    for sectors in [40, 97, 151, 260] {
        for seed in 1..=12 {
            let store = MemoryBlockStore::new(sectors, seed);
            let mut fs = SimFilesystem::new(store, SimFsConfiguration::random_for_seed(seed))
                .expect("engine construction failed");
            let mut test = VolumeFillTest::new(
                DriverConfig::new().entries_per_file(ENTRIES_PER_FILE),
            )
            .expect("valid config");

            let mut summary = None;
            for _ in 0..POLL_LIMIT {
                fs.poll();
                match fs.state() {
                    FilesystemState::Ready => {}
                    FilesystemState::Fatal => panic!("seed {seed}: engine failed"),
                    FilesystemState::Unknown | FilesystemState::Initializing => continue,
                }

                let before = test.counters().write_file_index;
                let tick = test.step(&mut fs).expect("driver failed");
                let counters = test.counters();
                assert!(
                    counters.write_file_index == before || counters.write_file_index == before + 1,
                    "seed {seed}: write index jumped from {before} to {}",
                    counters.write_file_index
                );
                assert!(
                    counters.read_file_index <= counters.write_file_index,
                    "seed {seed}: read index {} passed write index {}",
                    counters.read_file_index,
                    counters.write_file_index
                );

                if let Tick::Complete(done) = tick {
                    summary = Some(done);
                    break;
                }
            }
            let summary = summary.unwrap_or_else(|| panic!("seed {seed}: run never completed"));
            assert!(summary.volume_full, "seed {seed}");
            assert_eq!(summary.files_read, summary.files_written, "seed {seed}");

            // Every file but the last holds its full record stream.
            let last = summary.files_written - 1;
            let mut on_disk = 0;
            for index in 0..summary.files_written {
                let len = fs
                    .file_len(&format!("/logs/{}", log_file_name(index)))
                    .unwrap_or_else(|| panic!("seed {seed}: file {index} missing"));
                if index < last {
                    assert_eq!(len, full_file_len(index), "seed {seed}: file {index}");
                } else {
                    assert!(len <= full_file_len(index), "seed {seed}: file {index}");
                }
                on_disk += len;
            }
            assert_eq!(on_disk, summary.bytes_written_total, "seed {seed}");
            assert_eq!(fs.file_len(&format!("/logs/{}", log_file_name(last + 1))), None);
        }
    }
}
