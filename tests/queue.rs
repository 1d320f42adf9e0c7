//! Ingestion Queue Integration Tests
//!
//! Ordering, quiescence, and failure isolation of the single-consumer worker.

use std::path::PathBuf;

use docstash::config::StorageLayout;
use docstash::domain::QueueItem;
use docstash::ingest::{
    stage_file, ClassifierSettings, IngestQueue, ItemReport, Outcome, Pipeline, QueueStats,
};
use docstash::store::MetadataStore;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

fn start(temp: &TempDir) -> (IngestQueue, UnboundedReceiver<ItemReport>, StorageLayout) {
    let layout = StorageLayout::under(temp.path().join("root"));
    layout.ensure_dirs().unwrap();

    let store = MetadataStore::bootstrap(&layout.database).unwrap();
    let pipeline = Pipeline::for_layout(&layout, ClassifierSettings::default(), store);
    let (queue, reports) = IngestQueue::spawn_with_reports(pipeline);
    (queue, reports, layout)
}

/// Write a source file outside the store and stage it
fn upload(temp: &TempDir, layout: &StorageLayout, name: &str, bytes: &[u8]) -> QueueItem {
    let source = temp.path().join(name);
    std::fs::write(&source, bytes).unwrap();
    stage_file(&source, &layout.temp_dir).unwrap()
}

async fn collect(reports: &mut UnboundedReceiver<ItemReport>, n: usize) -> Vec<ItemReport> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(reports.recv().await.expect("worker stopped early"));
    }
    out
}

fn names(reports: &[ItemReport]) -> Vec<&str> {
    reports.iter().map(|r| r.item.original_name.as_str()).collect()
}

#[tokio::test]
async fn test_items_are_processed_in_enqueue_order() {
    let temp = TempDir::new().unwrap();
    let (queue, mut reports, layout) = start(&temp);

    for name in ["x1.txt", "x2.txt", "x3.txt"] {
        let item = upload(&temp, &layout, name, format!("contents of {}", name).as_bytes());
        queue.enqueue(item).unwrap();
    }

    let done = collect(&mut reports, 3).await;
    assert_eq!(names(&done), vec!["x1.txt", "x2.txt", "x3.txt"]);
    assert!(done.iter().all(|r| matches!(r.result, Ok(Outcome::Stored(_)))));

    let stats = queue.shutdown().await.unwrap();
    assert_eq!(stats.stored, 3);
}

#[tokio::test]
async fn test_batch_keeps_relative_order() {
    let temp = TempDir::new().unwrap();
    let (queue, mut reports, layout) = start(&temp);

    let solo = upload(&temp, &layout, "solo.txt", b"solo");
    let batch: Vec<QueueItem> = ["b1.txt", "b2.txt", "b3.txt"]
        .iter()
        .map(|n| upload(&temp, &layout, n, n.as_bytes()))
        .collect();
    let tail = upload(&temp, &layout, "tail.txt", b"tail");

    queue.enqueue(solo).unwrap();
    assert_eq!(queue.enqueue_batch(batch).unwrap(), 3);
    queue.enqueue(tail).unwrap();

    let done = collect(&mut reports, 5).await;
    assert_eq!(
        names(&done),
        vec!["solo.txt", "b1.txt", "b2.txt", "b3.txt", "tail.txt"]
    );

    queue.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_idle_queue_picks_up_later_items() {
    let temp = TempDir::new().unwrap();
    let (queue, mut reports, layout) = start(&temp);

    queue
        .enqueue(upload(&temp, &layout, "first.txt", b"first"))
        .unwrap();
    collect(&mut reports, 1).await;
    assert_eq!(queue.pending(), 0);
    assert!(queue.is_idle());

    queue
        .enqueue(upload(&temp, &layout, "second.txt", b"second"))
        .unwrap();
    let done = collect(&mut reports, 1).await;
    assert_eq!(names(&done), vec!["second.txt"]);
    assert!(matches!(done[0].result, Ok(Outcome::Stored(_))));

    let stats = queue.shutdown().await.unwrap();
    assert_eq!(stats.total(), 2);
}

#[tokio::test]
async fn test_failed_item_does_not_stop_the_worker() {
    let temp = TempDir::new().unwrap();
    let (queue, mut reports, layout) = start(&temp);

    let mut broken = vec![0xFF, 0xD8, 0xFF, 0xDB];
    broken.extend_from_slice(&[0x42; 40]);

    let items = vec![
        upload(&temp, &layout, "before.txt", b"before"),
        upload(&temp, &layout, "broken.jpg", &broken),
        upload(&temp, &layout, "binary.bin", &[0, 1, 2, 3, 4]),
        upload(&temp, &layout, "again.txt", b"before"),
        upload(&temp, &layout, "after.txt", b"after"),
    ];
    let broken_staging = items[1].staging_path.clone();
    queue.enqueue_batch(items).unwrap();

    let done = collect(&mut reports, 5).await;
    assert!(matches!(done[0].result, Ok(Outcome::Stored(_))));
    assert!(done[1].result.is_err());
    assert!(matches!(done[2].result, Ok(Outcome::Unusable)));
    assert!(matches!(done[3].result, Ok(Outcome::Duplicate(_))));
    assert!(matches!(done[4].result, Ok(Outcome::Stored(_))));
    assert!(!broken_staging.exists());

    let stats = queue.shutdown().await.unwrap();
    assert_eq!(
        stats,
        QueueStats {
            stored: 2,
            duplicates: 1,
            unusable: 1,
            skipped: 0,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn test_missing_staging_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    let (queue, mut reports, layout) = start(&temp);

    queue
        .enqueue(QueueItem::new(PathBuf::new(), "empty-path.txt", "none"))
        .unwrap();
    queue
        .enqueue(QueueItem::new(layout.temp_dir.join("vanished"), "vanished.txt", "vanished"))
        .unwrap();

    let done = collect(&mut reports, 2).await;
    assert!(done.iter().all(|r| matches!(r.result, Ok(Outcome::Skipped))));

    let stats = queue.shutdown().await.unwrap();
    assert_eq!(stats.skipped, 2);
}

#[tokio::test]
async fn test_shutdown_drains_accepted_items() {
    let temp = TempDir::new().unwrap();
    let layout = StorageLayout::under(temp.path().join("root"));
    layout.ensure_dirs().unwrap();
    let store = MetadataStore::bootstrap(&layout.database).unwrap();
    let queue = IngestQueue::spawn(Pipeline::for_layout(
        &layout,
        ClassifierSettings::default(),
        store,
    ));

    for i in 0..4 {
        let item = upload(&temp, &layout, &format!("doc{}.txt", i), format!("doc {}", i).as_bytes());
        queue.enqueue(item).unwrap();
    }

    let stats = queue.shutdown().await.unwrap();
    assert_eq!(stats.stored, 4);

    let store = MetadataStore::open(&layout.database).unwrap();
    assert_eq!(store.count().unwrap(), 4);
    assert!(std::fs::read_dir(&layout.temp_dir)
        .unwrap()
        .filter_map(Result::ok)
        .all(|e| e.path().is_dir()));
}
