//! Callback timing and the coverage assertions that prove it varies.

use crate::support::{capture, close, mkdir, mount, open, pattern, read_to_end, write_all};
use fillcheck_core::{AsyncFilesystem, OpenMode};
use fillcheck_sim::{
    MemoryBlockStore, SimFilesystem, SimFsConfiguration, get_assertion_results,
    reset_assertion_results, validate_assertion_contracts,
};

#[test]
fn test_inline_callback_fires_before_return() {
    let config = SimFsConfiguration {
        inline_completion_probability: 1.0,
        ..SimFsConfiguration::fast_local()
    };
    let mut fs = SimFilesystem::new(MemoryBlockStore::new(64, 0), config)
        .expect("engine construction failed");
    mount(&mut fs);

    let (slot, callback) = capture();
    fs.mkdir("logs", callback);
    let handle = slot.borrow_mut().take().expect("callback did not run inline");
    assert!(handle.is_some());
}

#[test]
fn test_deferred_callback_waits_for_latency() {
    let config = SimFsConfiguration {
        op_latency: 3..3,
        ..SimFsConfiguration::fast_local()
    };
    let mut fs = SimFilesystem::new(MemoryBlockStore::new(64, 0), config)
        .expect("engine construction failed");
    assert_eq!(fs.config().op_latency, 3..3);
    mount(&mut fs);

    let (slot, callback) = capture();
    let issued_at = fs.current_tick();
    fs.open("NEW.TXT", OpenMode::AppendSequential, callback);
    assert!(slot.borrow().is_none());
    fs.poll();
    fs.poll();
    assert!(slot.borrow().is_none());
    fs.poll();
    assert_eq!(fs.current_tick(), issued_at + 3);
    let handle = slot.borrow_mut().take().expect("callback did not run");
    assert!(handle.is_some());
}

#[test]
fn test_requests_before_mount_fail() {
    let mut fs = SimFilesystem::new(
        MemoryBlockStore::new(64, 0),
        SimFsConfiguration::default(),
    )
    .expect("engine construction failed");

    let (slot, callback) = capture();
    fs.mkdir("logs", callback);
    assert_eq!(slot.borrow_mut().take(), Some(None));
}

#[test]
fn test_close_waits_for_latency() {
    let config = SimFsConfiguration {
        close_latency: 2..2,
        ..SimFsConfiguration::fast_local()
    };
    let mut fs = SimFilesystem::new(MemoryBlockStore::new(64, 0), config)
        .expect("engine construction failed");
    mount(&mut fs);

    let file = open(&mut fs, "A", OpenMode::AppendSequential).expect("create failed");
    assert!(!fs.close(&file));
    // Writes are refused once a close is pending.
    assert_eq!(fs.write(&file, b"late"), 0);
    fs.poll();
    assert!(!fs.close(&file));
    fs.poll();
    assert!(fs.close(&file));
    assert_eq!(fs.open_handle_count(), 0);
}

#[test]
fn test_timing_paths_are_exercised() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();

    reset_assertion_results();
    let config = SimFsConfiguration {
        seed: 17,
        mount_polls: 2,
        op_latency: 1..4,
        inline_completion_probability: 0.5,
        create_failure_probability: 0.0,
        partial_write_probability: 0.3,
        sector_write_latency: 1..3,
        sector_read_latency: 1..3,
        close_latency: 0..2,
    };
    let mut fs = SimFilesystem::new(MemoryBlockStore::new(512, 0), config)
        .expect("engine construction failed");
    mount(&mut fs);

    let data = pattern(4 * 512 + 100);
    let dir = mkdir(&mut fs, "logs").expect("mkdir failed");
    assert!(fs.change_directory(&dir));
    for i in 0..24 {
        let name = format!("LOG{i:05}.TXT");
        let file = open(&mut fs, &name, OpenMode::AppendSequential).expect("create failed");
        assert_eq!(write_all(&mut fs, &file, &data), data.len());
        close(&mut fs, &file);

        let file = open(&mut fs, &name, OpenMode::Read).expect("open failed");
        assert_eq!(read_to_end(&mut fs, &file, 64), data);
        close(&mut fs, &file);
    }

    let results = get_assertion_results();
    for name in ["callback_inline", "write_stalled", "write_partial", "read_stalled"] {
        assert!(results.contains_key(name), "{name} was never checked");
    }
    let violations = validate_assertion_contracts();
    assert!(violations.is_empty(), "{violations:?}");
}
