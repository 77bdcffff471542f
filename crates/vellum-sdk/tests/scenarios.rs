//! End-to-end behaviour of the engine against a real directory.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use vellum_sdk::{
    CheckpointConfig, CompareTarget, Engine, EngineConfig, FileKey, ManualClock, RetentionPolicy,
    Trigger,
};

fn open(dir: &Path) -> Engine {
    Engine::open(EngineConfig::default().with_root(dir)).unwrap()
}

fn open_with_clock(dir: &Path, retention: RetentionPolicy) -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let config = EngineConfig::default()
        .with_root(dir)
        .with_checkpoint(CheckpointConfig::default().with_retention(retention));
    let engine = Engine::open_with_clock(config, clock.clone()).unwrap();
    (engine, clock)
}

fn key(name: &str) -> FileKey {
    FileKey::new(name).unwrap()
}

fn blob_files(root: &Path) -> usize {
    fs::read_dir(root.join("objects"))
        .unwrap()
        .map(|dir| fs::read_dir(dir.unwrap().path()).unwrap().count())
        .sum()
}

#[test]
fn round_trip_for_all_kinds_of_text() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    let large: String = (0..20_000).map(|i| format!("paragraph {i}: lorem ipsum\n")).collect();
    let mut large_edit = large.clone();
    large_edit.insert_str(large.len() / 2, "an insertion in the middle\n");

    let samples = [
        String::new(),
        "plain ascii\n".to_string(),
        "naïve café, 日本語, emoji 🎉✨".to_string(),
        large,
        large_edit,
        String::new(),
    ];
    for (i, text) in samples.iter().enumerate() {
        let doc = key(&format!("doc-{}.md", i % 2));
        let cp = engine.create_checkpoint(&doc, text, Trigger::Manual).unwrap();
        assert_eq!(&engine.restore_content(&doc, &cp.id).unwrap(), text, "sample {i}");
    }
}

#[test]
fn large_document_small_edit_is_a_delta() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    let doc = key("big.md");
    let base: String = (0..5_000).map(|i| format!("line {i}\n")).collect();
    engine.create_checkpoint(&doc, &base, Trigger::FileOpen).unwrap();

    let edited = base.replacen("line 2500\n", "line 2500 (edited)\n", 1);
    let cp = engine.create_checkpoint(&doc, &edited, Trigger::Interval).unwrap();
    assert!(cp.delta.is_some());
    assert_eq!(engine.restore_content(&doc, &cp.id).unwrap(), edited);
}

#[test]
fn identical_content_is_stored_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    let a = engine.write_blob(b"same bytes").unwrap();
    let b = engine.write_blob(b"same bytes").unwrap();
    assert_eq!(a, b);
    assert_eq!(blob_files(dir.path()), 1);

    engine.create_checkpoint(&key("x.md"), "same bytes", Trigger::FileOpen).unwrap();
    engine.create_checkpoint(&key("y.md"), "same bytes", Trigger::FileOpen).unwrap();
    assert_eq!(blob_files(dir.path()), 1);
}

#[test]
fn version_one_two_and_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    let doc = key("story.md");

    let a = engine
        .create_checkpoint(&doc, "This is version one.\n", Trigger::FileOpen)
        .unwrap();
    assert!(a.delta.is_none());
    assert_eq!(a.stats.change_size, 21);

    let b = engine
        .create_checkpoint(&doc, "This is version two.\n", Trigger::Interval)
        .unwrap();
    assert!(b.delta.is_some());
    assert_eq!(
        engine.restore_content(&doc, &b.id).unwrap(),
        "This is version two.\n"
    );

    let diff = engine
        .compare(&doc, &a.id, &CompareTarget::Checkpoint(b.id.clone()))
        .unwrap();
    assert!(diff.deletions.iter().any(|l| l.contains("one")));
    assert!(diff.additions.iter().any(|l| l.contains("two")));

    let c = engine
        .create_checkpoint(&doc, "0123456789-0123456789\n", Trigger::Interval)
        .unwrap();
    assert!(c.delta.is_none());
    assert_ne!(c.base_ref, a.base_ref);
    assert_eq!(
        engine.restore_content(&doc, &c.id).unwrap(),
        "0123456789-0123456789\n"
    );

    let listing = engine.list_checkpoints(&doc).unwrap();
    let ids: Vec<_> = listing.checkpoints.iter().map(|cp| cp.id.clone()).collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);
}

#[test]
fn gc_keeps_referenced_and_removes_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    let doc = key("gc.md");

    let a = engine.create_checkpoint(&doc, "first draft of the text\n", Trigger::FileOpen).unwrap();
    let b = engine.create_checkpoint(&doc, "first draft of the text!\n", Trigger::Interval).unwrap();
    let c = engine
        .create_checkpoint(&doc, "a complete rewrite, nothing shared\n", Trigger::Interval)
        .unwrap();
    assert_eq!(b.base_ref, a.base_ref);
    assert!(c.delta.is_none());

    let image = engine.write_blob(b"\x89PNG image bytes").unwrap();
    let stale_image = engine.write_blob(b"\x89PNG no longer embedded").unwrap();

    // A is gone, but B still needs its blob.
    engine.delete_checkpoint(&doc, &a.id).unwrap();
    engine.delete_checkpoint(&doc, &c.id).unwrap();

    let extra: HashSet<_> = [image].into_iter().collect();
    let report = engine.run_gc(&extra).unwrap();
    assert_eq!(report.removed, 2);

    assert!(engine.blob_exists(&b.base_ref).unwrap());
    assert!(engine.blob_exists(&image).unwrap());
    assert!(!engine.blob_exists(&c.base_ref).unwrap());
    assert!(!engine.blob_exists(&stale_image).unwrap());
    assert_eq!(
        engine.restore_content(&doc, &b.id).unwrap(),
        "first draft of the text!\n"
    );
}

#[test]
fn crash_then_recover_last_update() {
    let dir = tempfile::tempdir().unwrap();
    let doc = key("unsaved.md");
    {
        let engine = open(dir.path());
        engine.start_wal(&doc, "opened");
        engine.update_wal(&doc, "typed a bit");
        engine.update_wal(&doc, "typed a bit more");
        // no stop_wal: the process dies here
    }

    let engine = open(dir.path());
    let found = engine.scan_for_recovery().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_key, doc);
    assert_eq!(found[0].content, "typed a bit more");

    assert!(engine.discard_recovery(&doc).unwrap());
    assert!(open(dir.path()).scan_for_recovery().unwrap().is_empty());
}

#[test]
fn clean_close_leaves_nothing_to_recover() {
    let dir = tempfile::tempdir().unwrap();
    let doc = key("saved.md");
    {
        let engine = open(dir.path());
        engine.start_wal(&doc, "draft");
        engine.update_wal(&doc, "final");
        engine.create_checkpoint(&doc, "final", Trigger::FileClose).unwrap();
        engine.stop_wal(&doc);
        engine.shutdown();
    }
    assert!(open(dir.path()).scan_for_recovery().unwrap().is_empty());
}

#[test]
fn retention_spares_bookmarks() {
    let dir = tempfile::tempdir().unwrap();
    let retention = RetentionPolicy::default().with_keep_recent(1);
    let (engine, clock) = open_with_clock(dir.path(), retention);
    let doc = key("retained.md");

    let auto1 = engine.create_checkpoint(&doc, "auto one\n", Trigger::Interval).unwrap();
    clock.advance(Duration::seconds(1));
    let auto2 = engine.create_checkpoint(&doc, "auto two\n", Trigger::Interval).unwrap();
    clock.advance(Duration::seconds(1));
    let mark1 = engine.create_bookmark(&doc, "mark one\n", "one", None).unwrap();
    clock.advance(Duration::seconds(1));
    let mark2 = engine.create_bookmark(&doc, "mark two\n", "two", None).unwrap();
    clock.advance(Duration::seconds(600));
    let auto3 = engine.create_checkpoint(&doc, "auto three\n", Trigger::Interval).unwrap();

    let ids: Vec<_> = engine
        .list_checkpoints(&doc)
        .unwrap()
        .checkpoints
        .into_iter()
        .map(|cp| cp.id)
        .collect();
    assert!(!ids.contains(&auto2.id));
    assert_eq!(ids, vec![auto1.id, mark1.id, mark2.id, auto3.id]);

    let report = engine.run_gc(&HashSet::new()).unwrap();
    assert_eq!(report.pruned, 0);
    assert!(engine.restore_content(&doc, &auto2.id).is_err());
}

#[test]
fn labels_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let doc = key("labelled.md");
    let id = {
        let engine = open(dir.path());
        let cp = engine.create_checkpoint(&doc, "text", Trigger::Manual).unwrap();
        engine
            .label_checkpoint(&doc, &cp.id, Some("before refactor".into()), Some("safe point".into()))
            .unwrap();
        cp.id
    };

    let engine = open(dir.path());
    let listing = engine.list_checkpoints(&doc).unwrap();
    assert_eq!(listing.checkpoints.len(), 1);
    assert_eq!(listing.checkpoints[0].id, id);
    assert_eq!(listing.checkpoints[0].label.as_deref(), Some("before refactor"));
    assert_eq!(listing.checkpoints[0].description.as_deref(), Some("safe point"));
}

#[test]
fn corrupt_history_line_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    let doc = key("damaged.md");
    let cp = engine.create_checkpoint(&doc, "intact", Trigger::Manual).unwrap();

    let history = dir
        .path()
        .join("checkpoints")
        .join(format!("{}.jsonl", doc.digest()));
    let mut text = fs::read_to_string(&history).unwrap();
    text.push_str("this is not json\n");
    fs::write(&history, text).unwrap();

    let listing = engine.list_checkpoints(&doc).unwrap();
    assert_eq!(listing.checkpoints.len(), 1);
    assert_eq!(listing.checkpoints[0].id, cp.id);
    assert_eq!(listing.warnings.len(), 1);
    assert_eq!(engine.get_storage_stats().unwrap().corrupt_records, 1);
}

#[test]
fn storage_stats_add_up() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(dir.path());
    engine.create_checkpoint(&key("a.md"), "This is version one.\n", Trigger::FileOpen).unwrap();
    engine.create_checkpoint(&key("a.md"), "This is version two.\n", Trigger::Interval).unwrap();
    engine.create_bookmark(&key("b.md"), "bee", "v1", None).unwrap();
    engine.start_wal(&key("a.md"), "typing");

    let stats = engine.get_storage_stats().unwrap();
    assert_eq!(stats.blob_count, 2);
    assert_eq!(stats.blob_bytes, 21 + 3);
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.checkpoints, 3);
    assert_eq!(stats.bookmarks, 1);
    assert_eq!(stats.delta_checkpoints, 1);
    assert_eq!(stats.pending_wal, 1);
}

#[test]
fn documents_checkpoint_in_parallel_while_gc_runs() {
    use std::thread;

    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open(dir.path()));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let doc = key(&format!("parallel-{w}.md"));
                let mut ids = Vec::new();
                for i in 0..10 {
                    let text = format!("writer {w} revision {i}\n");
                    let cp = engine.create_checkpoint(&doc, &text, Trigger::Manual).unwrap();
                    ids.push((cp.id, text));
                }
                (doc, ids)
            })
        })
        .collect();
    let collector = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..5 {
                engine.run_gc(&HashSet::new()).unwrap();
            }
        })
    };

    let results: Vec<_> = writers.into_iter().map(|h| h.join().unwrap()).collect();
    collector.join().unwrap();
    engine.run_gc(&HashSet::new()).unwrap();

    for (doc, ids) in results {
        let listing = engine.list_checkpoints(&doc).unwrap();
        assert!(listing.warnings.is_empty());
        for cp in &listing.checkpoints {
            let (_, text) = ids.iter().find(|(id, _)| id == &cp.id).unwrap();
            assert_eq!(&engine.restore_content(&doc, &cp.id).unwrap(), text);
        }
    }
}
