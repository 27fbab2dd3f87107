//! End-to-end behaviour against a real directory and the native watcher

mod common;

use common::{runtime, settle, Recorder};
use std::fs;
use tempfile::TempDir;
use watcher::{EventKind, FileWatcher, LifecycleState, NotifyFilters, WatcherKinds};

#[test]
fn test_snapshot_precedes_live_notifications() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("b.txt"), b"b").unwrap();
    fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::EXISTED | WatcherKinds::CREATED)
                .path(temp_dir.path())
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::write(temp_dir.path().join("c.txt"), b"c").unwrap();

    let records = recorder.wait_for(3);
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.kind(), r.name().to_string()))
        .collect();
    assert_eq!(
        summary[..3],
        [
            (EventKind::Existed, "a.txt".to_string()),
            (EventKind::Existed, "b.txt".to_string()),
            (EventKind::Created, "c.txt".to_string()),
        ]
    );

    watcher.dispose().unwrap();
}

#[test]
fn test_only_enabled_kinds_are_raised() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();
    let existing = temp_dir.path().join("existing.txt");
    fs::write(&existing, b"x").unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::DELETED)
                .path(temp_dir.path())
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::write(temp_dir.path().join("new.txt"), b"n").unwrap();
    fs::remove_file(&existing).unwrap();

    let deleted = recorder.wait_matching(1, |r| r.kind() == EventKind::Deleted);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].full_path(), existing);

    settle();
    assert!(recorder
        .records
        .lock()
        .iter()
        .all(|r| r.kind() == EventKind::Deleted));
}

#[test]
fn test_name_filter_applies_to_live_notifications() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::CREATED)
                .path(temp_dir.path())
                .filter("*.txt")
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::write(temp_dir.path().join("skip.md"), b"m").unwrap();
    fs::write(temp_dir.path().join("keep.txt"), b"t").unwrap();

    recorder.wait_for(1);
    settle();
    assert_eq!(recorder.names(), vec!["keep.txt"]);
}

#[test]
fn test_notify_filter_gates_changes() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("data.bin");
    fs::write(&file, b"initial").unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::CHANGED | WatcherKinds::CREATED)
                .path(temp_dir.path())
                .notify_filter(NotifyFilters::DIRECTORY_NAME)
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::write(&file, b"rewritten").unwrap();
    fs::write(temp_dir.path().join("other.bin"), b"o").unwrap();
    fs::create_dir(temp_dir.path().join("folder")).unwrap();

    let created = recorder.wait_matching(1, |r| r.kind() == EventKind::Created);
    assert_eq!(created[0].name(), "folder");

    settle();
    assert_eq!(recorder.names(), vec!["folder"]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_rename_within_directory_is_one_record() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();
    let from = temp_dir.path().join("before.txt");
    let to = temp_dir.path().join("after.txt");
    fs::write(&from, b"x").unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::default())
                .path(temp_dir.path())
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::rename(&from, &to).unwrap();

    let renamed = recorder.wait_matching(1, |r| r.kind() == EventKind::Renamed);
    settle();

    assert_eq!(renamed.len(), 1);
    assert_eq!(renamed[0].full_path(), to);
    assert_eq!(renamed[0].name(), "after.txt");
    assert_eq!(renamed[0].old_full_path(), Some(from.as_path()));
    assert_eq!(renamed[0].old_name(), Some("before.txt"));
    assert_eq!(recorder.records.lock().len(), 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_move_out_of_tree_reports_deletion() {
    let rt = runtime();
    let watched = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let from = watched.path().join("leaving.txt");
    fs::write(&from, b"x").unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::DELETED | WatcherKinds::RENAMED)
                .path(watched.path())
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::rename(&from, outside.path().join("leaving.txt")).unwrap();

    // Reported while still watching, with nothing else happening in the tree
    let deleted = recorder.wait_matching(1, |r| r.kind() == EventKind::Deleted);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].full_path(), from);
    assert_eq!(deleted[0].name(), "leaving.txt");
    assert_eq!(watcher.state(), LifecycleState::Watching);

    settle();
    assert_eq!(recorder.records.lock().len(), 1);
}

#[test]
fn test_stopped_watcher_raises_nothing() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::CREATED)
                .path(temp_dir.path())
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    watcher.stop().unwrap();
    assert_eq!(watcher.state(), LifecycleState::Stopped);

    fs::write(temp_dir.path().join("ignored.txt"), b"i").unwrap();
    settle();
    assert!(recorder.records.lock().is_empty());

    // Restarting picks up new changes again
    watcher.start().unwrap();
    fs::write(temp_dir.path().join("seen.txt"), b"s").unwrap();
    recorder.wait_for(1);
    assert_eq!(recorder.names(), vec!["seen.txt"]);
}

#[test]
fn test_recursive_watch_reports_nested_names() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("nested");
    fs::create_dir(&nested).unwrap();

    let recorder = Recorder::default();
    let watcher = recorder
        .install(
            FileWatcher::builder(WatcherKinds::CREATED)
                .path(temp_dir.path())
                .include_subdirectories(true)
                .runtime(rt.handle().clone()),
        )
        .build()
        .unwrap();

    watcher.start().unwrap();
    fs::write(nested.join("inner.txt"), b"i").unwrap();

    let created = recorder.wait_matching(1, |r| r.full_path().ends_with("inner.txt"));
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name().replace('\\', "/"), "nested/inner.txt");
}

#[test]
fn test_snapshot_failure_fails_start() {
    let rt = runtime();
    let temp_dir = TempDir::new().unwrap();

    let watcher = FileWatcher::builder(WatcherKinds::EXISTED)
        .path(temp_dir.path().join("missing"))
        .runtime(rt.handle().clone())
        .build()
        .unwrap();

    assert!(watcher.start().is_err());
    assert_eq!(watcher.state(), LifecycleState::Idle);
}
