mod common;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use exhume::job::JobState;
use exhume::scan::CloseReason;

use common::{
    CollectSink, RunConfig, default_registry, insert_bytes, minimal_jpeg, minimal_pdf,
    minimal_png, run_job,
};

#[test]
fn known_instances_yield_byte_exact_artifacts() {
    let jpeg = minimal_jpeg();
    let png = minimal_png();
    let pdf = minimal_pdf();

    let mut data = vec![0u8; 4096];
    insert_bytes(&mut data, 100, &jpeg);
    insert_bytes(&mut data, 600, &png);
    insert_bytes(&mut data, 1500, &jpeg);
    insert_bytes(&mut data, 2000, &pdf);

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");
    let carve_root = temp_dir.path().join("carved");

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &carve_root,
        default_registry(),
        RunConfig::carve_only(512),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.state, JobState::Done);
    assert_eq!(summary.artifacts_found, 4);
    assert_eq!(summary.artifacts_validated, 4);
    assert_eq!(summary.artifacts_truncated, 0);

    let expected = vec![
        ("jpg".to_string(), 100, 100 + jpeg.len() as u64),
        ("jpg".to_string(), 1500, 1500 + jpeg.len() as u64),
        ("pdf".to_string(), 2000, 2000 + pdf.len() as u64),
        ("png".to_string(), 600, 600 + png.len() as u64),
    ];
    assert_eq!(sink.artifact_ranges(), expected);

    for artifact in sink.artifacts.lock().unwrap().iter() {
        assert!(artifact.validated, "{} not validated", artifact.path);
        assert_eq!(artifact.reason, CloseReason::Footer);
        let written = fs::read(carve_root.join(&artifact.path)).expect("read artifact");
        let start = artifact.start as usize;
        let end = artifact.end as usize;
        assert_eq!(written, &data[start..end], "bytes differ for {}", artifact.path);
    }
}

#[test]
fn output_names_derive_from_type_and_offset() {
    let mut data = vec![0u8; 512];
    insert_bytes(&mut data, 256, &minimal_jpeg());

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");
    let carve_root = temp_dir.path().join("carved");

    let sink = CollectSink::new();
    run_job(
        &input_path,
        &carve_root,
        default_registry(),
        RunConfig::carve_only(128),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    let artifacts = sink.artifacts.lock().unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].path, "jpg/jpg_000000000100.jpg");
    assert!(carve_root.join(&artifacts[0].path).exists());
}

#[test]
fn artifacts_arrive_in_close_order_not_start_order() {
    // the pe carve opens first but only closes at end of source, so the
    // jpeg that starts later is reported first
    let mut data = vec![0u8; 1024];
    let mut pe_stub = vec![0u8; 64];
    pe_stub[0] = b'M';
    pe_stub[1] = b'Z';
    insert_bytes(&mut data, 50, &pe_stub);
    insert_bytes(&mut data, 300, &minimal_jpeg());

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &temp_dir.path().join("carved"),
        default_registry(),
        RunConfig::carve_only(256),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.artifacts_found, 2);
    let artifacts = sink.artifacts.lock().unwrap();
    assert_eq!(artifacts[0].type_name, "jpg");
    assert_eq!(artifacts[1].type_name, "pe");
    assert_eq!(artifacts[1].reason, CloseReason::EndOfSource);
    assert_eq!(artifacts[1].end, data.len() as u64);
}

#[test]
fn truncated_carve_is_reported_not_dropped() {
    // elf header with no recognizable end: closed truncated at end of
    // source, kept on disk, flagged unvalidated (too short for a real elf)
    let mut data = vec![0u8; 256];
    insert_bytes(&mut data, 200, &[0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01]);

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("mem.dmp");
    fs::write(&input_path, &data).expect("write input");
    let carve_root = temp_dir.path().join("carved");

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &carve_root,
        default_registry(),
        RunConfig::carve_only(128),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.artifacts_found, 1);
    assert_eq!(summary.artifacts_truncated, 1);
    let artifacts = sink.artifacts.lock().unwrap();
    assert_eq!(artifacts[0].type_name, "elf");
    assert_eq!(artifacts[0].reason, CloseReason::EndOfSource);
    assert_eq!(artifacts[0].end, 256);
    assert!(artifacts[0].validated); // 56 bytes from start, above the elf floor
    assert!(carve_root.join(&artifacts[0].path).exists());
}

#[test]
fn type_filter_restricts_carving() {
    let mut data = vec![0u8; 1024];
    insert_bytes(&mut data, 100, &minimal_jpeg());
    insert_bytes(&mut data, 500, &minimal_png());

    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input_path = temp_dir.path().join("image.dd");
    fs::write(&input_path, &data).expect("write input");

    let (registry, unknown) = default_registry().specs_for(Some(&["png".to_string()]));
    assert!(unknown.is_empty());

    let sink = CollectSink::new();
    let summary = run_job(
        &input_path,
        &temp_dir.path().join("carved"),
        Arc::new(registry),
        RunConfig::carve_only(256),
        sink.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("job");

    assert_eq!(summary.artifacts_found, 1);
    assert_eq!(sink.artifacts.lock().unwrap()[0].type_name, "png");
}
