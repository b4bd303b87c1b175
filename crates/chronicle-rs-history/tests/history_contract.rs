//! End-to-end behavior of the store, window builder, codec and trends.

use chronicle_rs_history::{
    HistoryError, HistoryStore, MetadataValue, NewRecord, PersistenceCodec, Record, build,
    summarize,
};
use pretty_assertions::assert_eq;
use std::fs;
#[cfg(unix)]
use std::path::PathBuf;
use tempfile::tempdir;

fn contents(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.content().to_string())
        .collect()
}

/// Retained records are exactly the last `capacity` appended, in order.
#[test]
fn store_retains_last_capacity_records() {
    for capacity in 1..=6 {
        for appended in 0..=10usize {
            let store = HistoryStore::new(capacity).expect("store");
            for idx in 0..appended {
                store
                    .append(NewRecord::user(format!("m{idx}")))
                    .expect("append");
            }
            let expected: Vec<String> = (appended.saturating_sub(capacity)..appended)
                .map(|idx| format!("m{idx}"))
                .collect();
            assert_eq!(store.len(), appended.min(capacity));
            assert_eq!(contents(&store.all()), expected);
        }
    }
}

/// Windows are suffixes of the store of length min(k, len).
#[test]
fn window_is_suffix_of_store() {
    let store = HistoryStore::new(5).expect("store");
    for content in ["A", "B", "C", "D", "E", "F"] {
        store.append(NewRecord::user(content)).expect("append");
    }
    let all = store.all();
    for k in 0..8 {
        let window = build(&store, k, None);
        let expected_len = k.min(all.len());
        assert_eq!(window.len(), expected_len);
        assert_eq!(window.as_slice(), &all[all.len() - expected_len..]);
    }
}

/// A saved store with float metadata loads back field for field.
#[test]
fn save_and_load_preserves_float_metadata() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("history.json");
    let store = HistoryStore::new(2).expect("store");
    store
        .append(NewRecord::user("rate this").with_metadata("score", 7.5))
        .expect("append");
    store
        .append(
            NewRecord::assistant("rated")
                .with_metadata("score", 7.5)
                .with_metadata("style", "concise")
                .with_metadata("tokens", 12),
        )
        .expect("append");

    let codec = PersistenceCodec::new();
    codec.save(&store, &path).expect("save");
    let restored = codec.load(&path, Some(2)).expect("load");

    assert_eq!(restored.all(), store.all());
    for record in restored.all() {
        assert_eq!(record.metadata_value("score"), Some(&MetadataValue::Float(7.5)));
    }
    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.contains("\"score\": 7.5"));
    assert!(raw.contains("\"capacity\": 2"));
}

/// Saving over an existing file replaces it wholesale.
#[test]
fn save_replaces_previous_contents() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("history.json");
    let codec = PersistenceCodec::new();

    let first = HistoryStore::new(4).expect("store");
    for content in ["A", "B", "C"] {
        first.append(NewRecord::user(content)).expect("append");
    }
    codec.save(&first, &path).expect("save first");

    let second = HistoryStore::new(4).expect("store");
    second.append(NewRecord::user("Z")).expect("append");
    codec.save(&second, &path).expect("save second");

    let restored = codec.load(&path, None).expect("load");
    assert_eq!(contents(&restored.all()), vec!["Z"]);
    let leftovers = fs::read_dir(temp.path()).expect("read dir").count();
    assert_eq!(leftovers, 1);
}

/// A save that fails at the final replace leaves the existing file as it was.
///
/// The destination is named with a trailing slash, so the temp file is
/// written next to it but the rename onto a regular file is refused.
#[cfg(unix)]
#[test]
fn failed_save_keeps_destination_intact() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("history.json");
    let codec = PersistenceCodec::new();

    let first = HistoryStore::new(3).expect("store");
    for content in ["A", "B"] {
        first.append(NewRecord::user(content)).expect("append");
    }
    codec.save(&first, &path).expect("save first");
    let before = fs::read_to_string(&path).expect("read");

    let second = HistoryStore::new(3).expect("store");
    second.append(NewRecord::user("Z")).expect("append");
    let refused = PathBuf::from(format!("{}/", path.display()));
    let err = codec.save(&second, &refused).unwrap_err();
    assert!(matches!(err, HistoryError::Io(_)));

    assert_eq!(fs::read_to_string(&path).expect("read"), before);
    let restored = codec.load(&path, None).expect("load");
    assert_eq!(restored.all(), first.all());
    let leftovers = fs::read_dir(temp.path()).expect("read dir").count();
    assert_eq!(leftovers, 1);
}

/// A save into a directory that does not exist fails without creating it.
#[test]
fn save_into_missing_directory_fails() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("missing-dir").join("history.json");
    let store = HistoryStore::new(2).expect("store");
    store.append(NewRecord::user("A")).expect("append");

    let err = PersistenceCodec::new().save(&store, &path).unwrap_err();
    assert!(matches!(err, HistoryError::Io(_)));
    assert!(!path.exists());
}

/// Corrupt input yields an error, never a partially filled store.
#[test]
fn corrupt_file_fails_load() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("history.json");
    fs::write(
        &path,
        r#"{"version": 1, "capacity": 3, "records": [
            {"role": "user", "content": "ok", "timestamp": "2024-01-01T00:00:00Z"},
            {"role": "user", "content": 5, "timestamp": "2024-01-01T00:00:01Z"}
        ]}"#,
    )
    .expect("write");

    let err = PersistenceCodec::new().load(&path, None).unwrap_err();
    assert!(matches!(err, HistoryError::CorruptPersistedData { .. }));
}

/// Files written by the chat tools before the envelope format still load.
#[test]
fn legacy_conversation_file_loads_with_capacity() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("conversation_20240501_100000.json");
    fs::write(
        &path,
        r#"[
  {"role": "user", "content": "Hello", "timestamp": "2024-05-01T10:00:00.000001"},
  {"role": "assistant", "content": "Hi there", "timestamp": "2024-05-01T10:00:02.500000"},
  {"role": "user", "content": "Bye", "timestamp": "2024-05-01T10:00:05"}
]"#,
    )
    .expect("write");

    let store = PersistenceCodec::new().load(&path, Some(2)).expect("load");
    assert_eq!(contents(&store.all()), vec!["Hi there", "Bye"]);
    assert_eq!(store.capacity(), 2);
}

/// Trend scenario from the sentiment tool.
#[test]
fn sentiment_trend_over_store_snapshot() {
    let store = HistoryStore::new(10).expect("store");
    for (label, score) in [("positive", 8), ("negative", 2), ("positive", 9), ("positive", 7)] {
        store
            .append(
                NewRecord::assistant("analysis")
                    .with_metadata("sentiment", label)
                    .with_metadata("score", score),
            )
            .expect("append");
    }
    let snapshot = summarize(&store.all(), Some("score"), Some("sentiment"));
    assert_eq!(snapshot.count, 4);
    let categorical = snapshot.categorical.expect("categorical");
    assert_eq!(categorical.count_of("positive"), 3);
    assert_eq!(categorical.count_of("negative"), 1);
    assert_eq!(categorical.most_common.as_deref(), Some("positive"));
    assert_eq!(snapshot.numeric.expect("numeric").mean, Some(6.5));
    assert_eq!(store.len(), 4);
}

/// A sentiment analyzer export imports and feeds the trend summary.
#[test]
fn legacy_sentiment_export_imports_for_trends() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("sentiment_analysis_history_20240501_100500.json");
    fs::write(
        &path,
        r#"[
  {"sentiment": "positive", "score": 7.5, "confidence": 0.92,
   "summary": "Upbeat review", "text_length": 41, "timestamp": "2024-05-01T10:00:00.123456"},
  {"sentiment": "negative", "score": 2, "confidence": 0.8,
   "summary": "Complaint about delays", "text_length": 63, "timestamp": "2024-05-01T10:02:00.000001"},
  {"sentiment": "positive", "score": 8.5, "confidence": 0.7,
   "summary": "Praise", "text_length": 12, "timestamp": "2024-05-01T10:04:00"}
]"#,
    )
    .expect("write");

    let store = PersistenceCodec::new().load(&path, Some(10)).expect("load");
    let records = store.all();
    assert_eq!(
        contents(&records),
        vec!["Upbeat review", "Complaint about delays", "Praise"]
    );
    assert_eq!(records[0].metadata_value("score"), Some(&MetadataValue::Float(7.5)));

    let snapshot = summarize(&records, Some("score"), Some("sentiment"));
    assert_eq!(snapshot.count, 3);
    let numeric = snapshot.numeric.expect("numeric");
    assert_eq!(numeric.present, 3);
    assert_eq!(numeric.mean, Some(6.0));
    assert_eq!(numeric.min, Some(2.0));
    let categorical = snapshot.categorical.expect("categorical");
    assert_eq!(categorical.count_of("positive"), 2);
    assert_eq!(categorical.most_common.as_deref(), Some("positive"));
}
