use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dx_tags::sync::RefreshSink;
use dx_tags::{EventSource, PathSyncEngine, Reconciler, RefreshScheduler, TagColor, TagRegistry};
use tempfile::TempDir;

struct Harness {
    registry: Arc<TagRegistry>,
    engine: PathSyncEngine,
    reconciler: Reconciler,
    refreshes: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let registry = Arc::new(TagRegistry::new());
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&refreshes);
    let sink: Arc<dyn RefreshSink> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let refresh = Arc::new(RefreshScheduler::new(sink, Duration::from_millis(100)));
    let engine = PathSyncEngine::new(
        Arc::clone(&registry),
        Arc::clone(&refresh),
        Duration::from_millis(200),
    )
    .with_separator('/');
    let reconciler = Reconciler::new(Arc::clone(&registry), refresh);

    Harness {
        registry,
        engine,
        reconciler,
        refreshes,
    }
}

#[tokio::test]
async fn rename_folder_keeps_tags_in_place() {
    let h = harness();
    h.registry.set_tag("/proj/readme.md", TagColor::Red);
    h.registry.set_tag("/proj/src", TagColor::Blue);

    h.engine.handle_renames([("/proj/src", "/proj/lib")]);

    assert_eq!(h.registry.get_tag("/proj/lib"), Some(TagColor::Blue));
    assert_eq!(h.registry.get_tag("/proj/src"), None);
    assert_eq!(
        h.registry.paths_for_color(TagColor::Red),
        vec!["/proj/readme.md".to_string()]
    );
}

#[tokio::test]
async fn last_set_tag_wins() {
    let h = harness();
    h.registry.set_tag("/a", TagColor::Red);
    h.registry.set_tag("/a", TagColor::Green);
    h.registry.set_tag("/a", TagColor::Gray);

    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.registry.get_tag("/a"), Some(TagColor::Gray));
    assert_eq!(h.registry.used_colors(), vec![TagColor::Gray]);
}

#[tokio::test]
async fn removing_untagged_path_is_silent() {
    let h = harness();
    h.registry.set_tag("/a", TagColor::Red);
    let mut changes = h.registry.subscribe();

    assert!(!h.registry.remove_tag("/nope"));
    assert!(changes.try_recv().is_err());
    assert_eq!(h.registry.used_colors(), vec![TagColor::Red]);
}

#[tokio::test]
async fn rename_cascades_to_descendants() {
    let h = harness();
    h.registry.set_tag("/a/f.txt", TagColor::Red);
    h.registry.set_tag("/a/sub/g.txt", TagColor::Blue);
    h.registry.set_tag("/ab/h.txt", TagColor::Green);

    let outcome = h.engine.handle_renames([("/a", "/b")]);

    assert_eq!(outcome.moved, 2);
    assert_eq!(h.registry.get_tag("/b/f.txt"), Some(TagColor::Red));
    assert_eq!(h.registry.get_tag("/b/sub/g.txt"), Some(TagColor::Blue));
    assert!(h
        .registry
        .all_tags()
        .iter()
        .all(|(path, _)| !path.starts_with("/a/")));
    // Sibling sharing a name prefix is untouched.
    assert_eq!(h.registry.get_tag("/ab/h.txt"), Some(TagColor::Green));
}

#[tokio::test]
async fn delete_cascades_to_descendants() {
    let h = harness();
    h.registry.set_tag("/a/f.txt", TagColor::Red);
    h.registry.set_tag("/a/sub/g.txt", TagColor::Blue);

    let outcome = h.engine.handle_deletes(["/a"]);

    assert_eq!(outcome.removed, 2);
    assert!(h.registry.used_colors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn watcher_echo_of_host_rename_is_suppressed() {
    let h = harness();
    h.registry.set_tag("/w/old/f.txt", TagColor::Purple);

    h.engine.handle_renames([("/w/old", "/w/new")]);
    let echo = h
        .engine
        .apply_deletes(EventSource::Watcher, ["/w/old", "/w/new"]);

    assert_eq!(echo.removed, 0);
    assert_eq!(echo.suppressed, 2);
    assert_eq!(h.registry.get_tag("/w/new/f.txt"), Some(TagColor::Purple));

    tokio::time::advance(Duration::from_millis(250)).await;
    let late = h.engine.apply_deletes(EventSource::Watcher, ["/w/new"]);
    assert_eq!(late.removed, 1);
}

#[tokio::test(start_paused = true)]
async fn burst_of_events_refreshes_once() {
    let h = harness();
    h.registry.set_tag("/a", TagColor::Red);
    h.registry.set_tag("/b", TagColor::Red);

    h.engine.handle_renames([("/a", "/a2")]);
    h.engine.handle_renames([("/b", "/b2")]);
    h.engine.handle_creates(["/c"]);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let kept = temp_dir.path().join("kept.txt");
    std::fs::write(&kept, "").unwrap();
    let kept = kept.to_string_lossy().into_owned();
    let gone = temp_dir.path().join("gone.txt").to_string_lossy().into_owned();

    let h = harness();
    h.registry.set_tag(&kept, TagColor::Yellow);
    h.registry.set_tag(&gone, TagColor::Yellow);

    assert_eq!(h.reconciler.sweep().await, 1);
    assert_eq!(h.reconciler.sweep().await, 0);
    assert_eq!(h.registry.all_tags(), vec![(kept, TagColor::Yellow)]);
    assert_eq!(h.refreshes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn snapshot_round_trip_reproduces_state() {
    let source = TagRegistry::new();
    source.set_tag("/x", TagColor::Orange);
    source.set_tag("/y/z", TagColor::Blue);
    source.set_display_name(TagColor::Blue, "Review");

    let target = TagRegistry::new();
    target.import_snapshot(source.export_snapshot());

    let mut expected = source.all_tags();
    let mut actual = target.all_tags();
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
    assert_eq!(target.all_tag_names(), source.all_tag_names());
}

#[tokio::test]
async fn display_name_falls_back_to_default() {
    let registry = TagRegistry::new();
    assert_eq!(registry.display_name(TagColor::Green), "Green");

    registry.set_display_name(TagColor::Green, "Done");
    registry.set_display_name(TagColor::Green, "Shipped");
    assert_eq!(registry.display_name(TagColor::Green), "Shipped");
    assert_eq!(registry.display_name(TagColor::Red), "Red");
}
