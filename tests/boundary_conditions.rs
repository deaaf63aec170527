mod common;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use exhume::job::JobState;

use common::{CollectSink, RunConfig, default_registry, insert_bytes, minimal_jpeg, minimal_png, run_job};

#[test]
fn header_straddling_chunk_boundary_found_exactly_once() {
    let png = minimal_png();
    let window = 64u64;

    // place the 8-byte png header so it crosses the first chunk boundary
    // at every possible split point
    for k in 1..8u64 {
        let offset = (window - k) as usize;
        let mut data = vec![0u8; 256];
        insert_bytes(&mut data, offset, &png);

        let temp_dir = tempfile::tempdir().expect("tempdir");
        let input_path = temp_dir.path().join("image.dd");
        fs::write(&input_path, &data).expect("write input");

        let sink = CollectSink::new();
        let summary = run_job(
            &input_path,
            &temp_dir.path().join("carved"),
            default_registry(),
            RunConfig::carve_only(window),
            sink.clone(),
            Arc::new(AtomicBool::new(false)),
        )
        .expect("job");

        assert_eq!(summary.artifacts_found, 1, "split at {k}");
        let artifacts = sink.artifacts.lock().unwrap();
        assert_eq!(artifacts[0].start, offset as u64, "split at {k}");
        assert_eq!(artifacts[0].end, (offset + png.len()) as u64, "split at {k}");
        assert!(artifacts[0].validated, "split at {k}");
    }
}

#[test]
fn footer_straddling_chunk_boundary_found_exactly_once() {
    let jpeg = minimal_jpeg();

    // jpeg footer bytes land at offsets 30..32; window 31 splits them
    let mut data = vec![0u8; 128];
    insert_bytes(&mut data, 0, &jpeg);

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &temp_dir.path().join("carved"),
        default_registry(),
        RunConfig::carve_only(31),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.artifacts_found, 1);
    let artifacts = sink.artifacts.lock().unwrap();
    assert_eq!(artifacts[0].start, 0);
    assert_eq!(artifacts[0].end, 32);
}

#[test]
fn detection_is_window_size_invariant() {
    let jpeg = minimal_jpeg();
    let png = minimal_png();
    let mut data = vec![0u8; 512];
    insert_bytes(&mut data, 37, &jpeg);
    insert_bytes(&mut data, 201, &png);

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");

    let mut baseline: Option<Vec<(String, u64, u64)>> = None;
    for window in [16u64, 32, 64, 100, 512, 4096] {
        let sink = CollectSink::new();
        run_job(
            &input_path,
            &temp_dir.path().join(format!("carved_{window}")),
            default_registry(),
            RunConfig::carve_only(window),
            sink.clone(),
            Arc::new(AtomicBool::new(false)),
        )
        .expect("job");

        let ranges = sink.artifact_ranges();
        assert_eq!(ranges.len(), 2, "window {window}");
        match &baseline {
            None => baseline = Some(ranges),
            Some(expected) => assert_eq!(&ranges, expected, "window {window}"),
        }
    }
}

#[test]
fn file_ending_at_exact_chunk_boundary() {
    let jpeg = minimal_jpeg();
    let mut data = vec![0u8; 64];
    insert_bytes(&mut data, 0, &jpeg);

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &temp_dir.path().join("carved"),
        default_registry(),
        RunConfig::carve_only(32),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.artifacts_found, 1);
    let artifacts = sink.artifacts.lock().unwrap();
    assert_eq!(artifacts[0].size, 32);
}

#[test]
fn empty_source_completes_with_no_findings() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("empty.dd");
    fs::write(&input_path, b"").expect("write input");

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &temp_dir.path().join("carved"),
        default_registry(),
        RunConfig::carve_only(64),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.state, JobState::Done);
    assert_eq!(summary.chunks_processed, 0);
    assert_eq!(summary.artifacts_found, 0);
    assert!(sink.artifacts.lock().unwrap().is_empty());
}
