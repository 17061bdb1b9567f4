use std::sync::Arc;

use barsync_core::{FileSkipListSink, SkipList, SkipListSink};
use barsync_mock::MemorySkipListSink;

#[tokio::test]
async fn file_sink_round_trips_through_a_fresh_skip_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intraday_skip.txt");

    let sink: Arc<dyn SkipListSink> = Arc::new(FileSkipListSink::new(&path));
    let list = SkipList::load(sink.clone()).await.unwrap();
    assert!(list.is_empty());
    assert!(list.insert("OTCA").await.unwrap());
    assert!(list.insert("OTCB").await.unwrap());
    assert!(!list.insert("OTCA").await.unwrap());

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "OTCA\nOTCB\n");

    let reloaded = SkipList::load(Arc::new(FileSkipListSink::new(&path))).await.unwrap();
    assert_eq!(reloaded.members(), vec!["OTCA".to_string(), "OTCB".to_string()]);
}

#[tokio::test]
async fn file_sink_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skip.txt");
    std::fs::write(&path, "# cleared by hand\n\n  PINK  \nGREY\n").unwrap();

    let list = SkipList::load(Arc::new(FileSkipListSink::new(&path))).await.unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.contains("PINK"));
    assert!(list.contains("GREY"));
}

#[tokio::test]
async fn failed_append_leaves_membership_unchanged() {
    let sink = Arc::new(MemorySkipListSink::with_entries(["A"]));
    let list = SkipList::load(sink.clone() as Arc<dyn SkipListSink>).await.unwrap();
    sink.fail_appends(true);

    let err = list.insert("B").await.unwrap_err();
    assert_eq!(err.category(), "skip-list");
    assert!(!list.contains("B"));
    assert_eq!(sink.entries(), vec!["A".to_string()]);

    sink.fail_appends(false);
    assert!(list.insert("B").await.unwrap());
    assert_eq!(sink.entries(), vec!["A".to_string(), "B".to_string()]);
}
