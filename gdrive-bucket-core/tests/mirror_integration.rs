mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{FakeDrive, RecordingBucket, ROOT_ID};
use gdrive_bucket_core::config::{MirrorConfig, Tuning};
use gdrive_bucket_core::error::FailureKind;
use gdrive_bucket_core::mirror::mirror;
use gdrive_bucket_core::MirrorError;

const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn sample_drive() -> FakeDrive {
    let drive = FakeDrive::new(2);
    drive
        .add_folder("a", "A", ROOT_ID)
        .add_folder("b", "B", "a")
        .add_file("c", "C.txt", "text/plain", "b")
        .add_file("sheet", "Sheet", "application/vnd.google-apps.spreadsheet", "b")
        .add_file("form", "Form", "application/vnd.google-apps.form", "b")
        .add_file("x", "x.txt", "text/plain", "a")
        .add_file("outside", "other.txt", "text/plain", ROOT_ID);
    drive
}

fn config(root: &str) -> MirrorConfig {
    let mut config = MirrorConfig::new("proj", root, "test-bucket");
    config.workers = 3;
    config.tuning = Tuning {
        drain_threshold: 1,
        poll_interval_secs: 0,
        ..Tuning::default()
    };
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mirrors_subtree_with_collection_prefixed_keys() {
    let drive = sample_drive();
    let bucket = RecordingBucket::new();

    let (d, b) = (drive.clone(), bucket.clone());
    let report = mirror(&config("//My Drive/A/"), &drive, move |_| Ok((d.clone(), b.clone())))
        .await
        .unwrap();

    let mut keys: Vec<String> = bucket.objects().into_iter().map(|o| o.key).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["My Drive/A/B/C.txt", "My Drive/A/B/Sheet", "My Drive/A/x.txt"]
    );
    assert_eq!(
        bucket.object("My Drive/A/B/Sheet").unwrap().content_type.as_deref(),
        Some(XLSX)
    );

    assert_eq!(report.root, "//My Drive/A");
    assert_eq!(report.bucket, "test-bucket");
    assert_eq!(report.workers, 3);
    assert_eq!(report.folders_visited, 2);
    assert_eq!(report.enqueued, 4);
    assert_eq!(report.transferred.len(), 3);
    assert!(!report.is_complete());

    let failure = &report.failures[0];
    assert_eq!(failure.file_id, "form");
    assert_eq!(failure.drive_path, "//My Drive/A/B/Form");
    assert_eq!(failure.kind, FailureKind::UnsupportedFormat);

    let json = report.to_json_pretty().unwrap();
    assert!(json.contains("\"run_id\""));
    assert!(json.contains("\"unsupported_format\""));
}

#[tokio::test]
async fn deep_root_keeps_full_path_in_keys() {
    let drive = sample_drive();
    let bucket = RecordingBucket::new();

    let (d, b) = (drive.clone(), bucket.clone());
    let report = mirror(&config("//My Drive/A/B/"), &drive, move |_| Ok((d.clone(), b.clone())))
        .await
        .unwrap();

    let c = report
        .transferred
        .iter()
        .find(|t| t.file_id == "c")
        .unwrap();
    assert_eq!(c.bucket_path, "My Drive/A/B/C.txt");
    assert_eq!(c.drive_path, "//My Drive/A/B/C.txt");
    assert_eq!(bucket.object("My Drive/A/B/C.txt").unwrap().bytes, drive.content_of("c"));
    assert!(bucket.object("My Drive/A/x.txt").is_none());
}

#[tokio::test]
async fn whole_private_collection_is_the_default_root() {
    let drive = sample_drive();
    let bucket = RecordingBucket::new();

    let (d, b) = (drive.clone(), bucket.clone());
    let report = mirror(&config("//My Drive/"), &drive, move |_| Ok((d.clone(), b.clone())))
        .await
        .unwrap();

    assert_eq!(report.folders_visited, 3);
    assert_eq!(report.enqueued, 5);
    assert!(bucket.object("My Drive/other.txt").is_some());
}

#[tokio::test]
async fn unresolvable_root_fails_before_any_worker_starts() {
    let drive = sample_drive();
    let connects = Arc::new(AtomicUsize::new(0));

    let (d, counter) = (drive.clone(), connects.clone());
    let err = mirror(&config("//My Drive/Nope"), &drive, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok((d.clone(), RecordingBucket::new()))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, MirrorError::PathNotFound { ref segment, .. } if segment == "Nope"));
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listing_failure_mid_walk_drains_queued_work_then_errors() {
    let drive = sample_drive();
    drive.fail_listing("b");
    let bucket = RecordingBucket::new();

    let (d, b) = (drive.clone(), bucket.clone());
    let err = mirror(&config("//My Drive/A"), &drive, move |_| Ok((d.clone(), b.clone())))
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::RemoteStatus { status: 500, .. }));
    // x.txt was queued before the failing folder was reached.
    assert!(bucket.object("My Drive/A/x.txt").is_some());
}

#[tokio::test]
async fn shared_collection_keys_start_with_the_collection_name() {
    let drive = FakeDrive::new(10);
    drive
        .add_collection("team-1", "Team")
        .add_folder("docs", "Docs", "team-1")
        .add_file("r", "readme.md", "text/markdown", "docs");
    let bucket = RecordingBucket::new();

    let (d, b) = (drive.clone(), bucket.clone());
    let report = mirror(&config("//Team/Docs"), &drive, move |_| Ok((d.clone(), b.clone())))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert!(bucket.object("Team/Docs/readme.md").is_some());
    assert!(drive
        .list_requests()
        .iter()
        .all(|r| r.collection_id.as_deref() == Some("team-1")));
}
