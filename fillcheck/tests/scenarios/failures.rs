//! Runs that must end in failure.

use fillcheck::{DriverConfig, DriverError, RunError, Stage, VolumeFillTest, run_to_completion};
use fillcheck_sim::{MemoryBlockStore, SimFilesystem, SimFsConfiguration};

#[test]
fn test_log_directory_creation_failure() {
    for inline in [0.0, 1.0] {
        let config = SimFsConfiguration {
            create_failure_probability: 1.0,
            inline_completion_probability: inline,
            ..SimFsConfiguration::default()
        };
        let mut fs = SimFilesystem::new(MemoryBlockStore::new(256, 0), config)
            .expect("engine construction failed");
        let mut test = VolumeFillTest::new(DriverConfig::default()).expect("valid config");

        let result = run_to_completion(&mut fs, &mut test);
        assert_eq!(
            result,
            Err(RunError::Driver(DriverError::CreateDirectory("logs")))
        );
        assert_eq!(test.stage(), Stage::Complete);
        assert_eq!(test.counters().write_file_index, 0);
        assert_eq!(test.counters().bytes_written_total, 0);
        assert_eq!(fs.file_len("/logs/LOG00000.TXT"), None);
        // Only the volume header reached the store.
        assert_eq!(fs.store().sector_writes(), 1);
    }
}

#[test]
fn test_store_failure_is_fatal() {
    // Header plus four data sectors, then every write fails.
    let store = MemoryBlockStore::new(256, 0).fail_writes_after(5);
    let mut fs = SimFilesystem::new(store, SimFsConfiguration::fast_local())
        .expect("engine construction failed");
    let mut test = VolumeFillTest::new(DriverConfig::default()).expect("valid config");

    match run_to_completion(&mut fs, &mut test) {
        Err(RunError::Fatal { stage, counters }) => {
            assert_eq!(stage, Stage::WriteLog);
            assert_eq!(counters.write_file_index, 0);
            assert_eq!(counters.bytes_written_this_file, 5 * 512);
        }
        other => panic!("expected a fatal engine error, got {other:?}"),
    }
}

#[test]
fn test_fatal_during_mount() {
    let store = MemoryBlockStore::new(256, 0).fail_writes_after(0);
    let mut fs = SimFilesystem::new(store, SimFsConfiguration::default())
        .expect("engine construction failed");
    let mut test = VolumeFillTest::new(DriverConfig::default()).expect("valid config");

    let result = run_to_completion(&mut fs, &mut test);
    assert!(matches!(
        result,
        Err(RunError::Fatal {
            stage: Stage::CreateLogDirectory,
            ..
        })
    ));
    assert_eq!(result.map_err(|e| e.to_string()), Err("Fatal filesystem error".to_string()));
}
