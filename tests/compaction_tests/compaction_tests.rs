//! Tests for compaction
//!
//! These tests verify:
//! - Deleted and superseded versions are dropped
//! - WAL is emptied and the data log shrinks
//! - Index is rebuilt without stale memberships
//! - Merge order (first-seen, re-inserted ids move to the end)
//! - Compaction is idempotent and can be re-run after an interruption

use std::path::Path;

use atlasdoc::compaction::Compactor;
use atlasdoc::config::{Config, SyncStrategy};
use atlasdoc::engine::{Engine, DATA_LOG_FILENAME, WAL_FILENAME};
use atlasdoc::index::{secondary_key, IndexStore, MemoryIndex};
use atlasdoc::record::{Fields, Record, RecordId};
use atlasdoc::storage::DataLog;
use atlasdoc::wal::{Wal, WalEntry};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_engine(dir: &Path, index_fields: &[&str]) -> Engine {
    let config = Config::builder()
        .data_dir(dir)
        .index_fields(index_fields.iter().copied())
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();
    Engine::open(config).unwrap()
}

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn id(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

fn ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.id.to_string()).collect()
}

// =============================================================================
// Engine-level Compaction Tests
// =============================================================================

#[test]
fn test_compact_drops_deleted_and_superseded() {
    let temp = TempDir::new().unwrap();
    let mut engine = open_engine(temp.path(), &["age"]);

    let a = engine.insert(fields(json!({"name": "A", "age": 1}))).unwrap();
    let b = engine.insert(fields(json!({"name": "B", "age": 2}))).unwrap();
    let c = engine.insert(fields(json!({"name": "C", "age": 3}))).unwrap();
    engine.delete(&b).unwrap();
    engine.update(&a, fields(json!({"name": "A2"}))).unwrap();

    assert_eq!(engine.compact().unwrap(), 2);

    assert_eq!(engine.get(&a).unwrap().unwrap().get("name"), Some(&json!("A2")));
    assert!(engine.get(&b).unwrap().is_none());
    assert_eq!(engine.get(&c).unwrap().unwrap().get("name"), Some(&json!("C")));
    assert_eq!(engine.count().unwrap(), 2);

    // Writes keep working on the rewritten files
    let d = engine.insert(fields(json!({"name": "D", "age": 3}))).unwrap();
    let three: Vec<RecordId> = engine
        .query("age", &json!(3))
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(three, vec![c, d]);
    assert!(engine.query("age", &json!(2)).unwrap().is_empty());
}

#[test]
fn test_compact_empties_wal_and_shrinks_data_log() {
    let temp = TempDir::new().unwrap();
    let mut engine = open_engine(temp.path(), &[]);

    let a = engine.insert(fields(json!({"v": 0}))).unwrap();
    for i in 1..10 {
        engine.update(&a, fields(json!({"v": i}))).unwrap();
    }
    let before = engine.data_log_size().unwrap();
    assert_eq!(engine.wal_len().unwrap(), 10);

    engine.compact().unwrap();

    assert_eq!(engine.wal_len().unwrap(), 0);
    assert!(!temp.path().join(WAL_FILENAME).exists());
    assert!(engine.data_log_size().unwrap() < before);

    let content = std::fs::read_to_string(temp.path().join(DATA_LOG_FILENAME)).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert_eq!(engine.get(&a).unwrap().unwrap().get("v"), Some(&json!(9)));
}

#[test]
fn test_compact_removes_stale_memberships() {
    let temp = TempDir::new().unwrap();
    let mut engine = open_engine(temp.path(), &["age"]);

    let a = engine.insert(fields(json!({"age": 30}))).unwrap();
    let b = engine.insert(fields(json!({"age": 30}))).unwrap();
    engine.update(&a, fields(json!({"age": 31}))).unwrap();
    engine.delete(&b).unwrap();

    let key_30 = secondary_key("age", &json!(30)).unwrap();
    let key_31 = secondary_key("age", &json!(31)).unwrap();
    assert_eq!(engine.index().get_index(&key_30).unwrap().len(), 2);

    engine.compact().unwrap();

    assert!(engine.index().get_index(&key_30).unwrap().is_empty());
    assert_eq!(
        engine.index().get_index(&key_31).unwrap(),
        vec![a.as_bytes().to_vec()]
    );
    // One primary key + one secondary key
    assert_eq!(engine.index().count().unwrap(), 2);
}

#[test]
fn test_compact_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut engine = open_engine(temp.path(), &["k"]);

    let a = engine.insert(fields(json!({"k": 1}))).unwrap();
    engine.insert(fields(json!({"k": 2}))).unwrap();
    engine.update(&a, fields(json!({"k": 3}))).unwrap();

    let first = engine.compact().unwrap();
    let after_first = engine.all().unwrap();
    let size = engine.data_log_size().unwrap();

    let second = engine.compact().unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.all().unwrap(), after_first);
    assert_eq!(engine.data_log_size().unwrap(), size);
}

#[test]
fn test_compact_empty_store() {
    let temp = TempDir::new().unwrap();
    let mut engine = open_engine(temp.path(), &[]);

    assert_eq!(engine.compact().unwrap(), 0);
    assert_eq!(engine.count().unwrap(), 0);
}

#[test]
fn test_compact_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let a = {
        let mut engine = open_engine(temp.path(), &["team"]);
        let a = engine.insert(fields(json!({"team": "red"}))).unwrap();
        let b = engine.insert(fields(json!({"team": "red"}))).unwrap();
        engine.delete(&b).unwrap();
        engine.compact().unwrap();
        engine.close().unwrap();
        a
    };

    let engine = open_engine(temp.path(), &["team"]);

    assert_eq!(ids(&engine.query("team", &json!("red")).unwrap()), vec![a.to_string()]);
    assert_eq!(engine.count().unwrap(), 1);
}

#[test]
fn test_compact_includes_wal_only_records() {
    let temp = TempDir::new().unwrap();
    {
        let mut engine = open_engine(temp.path(), &["age"]);
        engine.insert(fields(json!({"name": "A", "age": 40}))).unwrap();
        engine.close().unwrap();
    }

    // Crash after the WAL write: nothing reached the data log or the index
    let mut wal = Wal::open(&temp.path().join(WAL_FILENAME), SyncStrategy::EveryWrite).unwrap();
    wal.append(&WalEntry::insert(id("ghost"), fields(json!({"name": "G", "age": 40}))))
        .unwrap();
    drop(wal);

    let mut engine = open_engine(temp.path(), &["age"]);
    assert_eq!(engine.query("age", &json!(40)).unwrap().len(), 1);

    assert_eq!(engine.compact().unwrap(), 2);

    assert_eq!(engine.query("age", &json!(40)).unwrap().len(), 2);
    assert_eq!(
        engine.get(&id("ghost")).unwrap().unwrap().get("name"),
        Some(&json!("G"))
    );
}

#[test]
fn test_compact_rerun_after_interrupted_rewrite() {
    let temp = TempDir::new().unwrap();
    let (a, b) = {
        let mut engine = open_engine(temp.path(), &["n"]);
        let a = engine.insert(fields(json!({"n": 1}))).unwrap();
        let b = engine.insert(fields(json!({"n": 2}))).unwrap();
        engine.update(&a, fields(json!({"n": 10}))).unwrap();
        engine.delete(&b).unwrap();
        engine.close().unwrap();
        (a, b)
    };

    // Step 2 completed, crash before reindex and WAL truncation
    {
        let mut data_log = DataLog::open(
            &temp.path().join(DATA_LOG_FILENAME),
            SyncStrategy::EveryWrite,
        )
        .unwrap();
        let mut wal = Wal::open(&temp.path().join(WAL_FILENAME), SyncStrategy::EveryWrite).unwrap();
        let mut scratch = MemoryIndex::new();
        let index_fields = vec!["n".to_string()];

        let (merged, _, _) = Compactor::new(&mut data_log, &mut wal, &mut scratch, &index_fields)
            .merge()
            .unwrap();
        data_log.rewrite(&merged.into_records()).unwrap();
    }

    let mut engine = open_engine(temp.path(), &["n"]);
    assert_eq!(engine.compact().unwrap(), 1);

    assert_eq!(engine.get(&a).unwrap().unwrap().get("n"), Some(&json!(10)));
    assert!(engine.get(&b).unwrap().is_none());
    assert_eq!(ids(&engine.query("n", &json!(10)).unwrap()), vec![a.to_string()]);
}

// =============================================================================
// Compactor Tests
// =============================================================================

#[test]
fn test_merge_order_and_counts() {
    let temp = TempDir::new().unwrap();
    let mut data_log =
        DataLog::open(&temp.path().join(DATA_LOG_FILENAME), SyncStrategy::EveryWrite).unwrap();
    let mut wal = Wal::open(&temp.path().join(WAL_FILENAME), SyncStrategy::EveryWrite).unwrap();
    let mut index = MemoryIndex::new();

    data_log.append(&Record::new(id("a"), fields(json!({"v": 1})))).unwrap();
    data_log.append(&Record::new(id("b"), fields(json!({"v": 1})))).unwrap();
    data_log.append(&Record::new(id("a"), fields(json!({"v": 2})))).unwrap();

    wal.append(&WalEntry::delete(id("a"))).unwrap();
    wal.append(&WalEntry::insert(id("c"), fields(json!({"v": 1})))).unwrap();
    wal.append(&WalEntry::insert(id("a"), fields(json!({"v": 3})))).unwrap();
    wal.append(&WalEntry::update(id("b"), fields(json!({"v": 2})))).unwrap();

    let index_fields: Vec<String> = Vec::new();
    let compactor = Compactor::new(&mut data_log, &mut wal, &mut index, &index_fields);
    let (merged, data_lines, wal_entries) = compactor.merge().unwrap();

    assert_eq!(data_lines, 3);
    assert_eq!(wal_entries, 4);
    assert_eq!(merged.len(), 3);

    let records = merged.into_records();
    assert_eq!(ids(&records), vec!["b", "c", "a"]);
    assert_eq!(records[0].get("v"), Some(&json!(2)));
    assert_eq!(records[2].get("v"), Some(&json!(3)));
}

#[test]
fn test_run_reports_stats_and_rebuilds_index() {
    let temp = TempDir::new().unwrap();
    let mut data_log =
        DataLog::open(&temp.path().join(DATA_LOG_FILENAME), SyncStrategy::EveryWrite).unwrap();
    let mut wal = Wal::open(&temp.path().join(WAL_FILENAME), SyncStrategy::EveryWrite).unwrap();
    let mut index = MemoryIndex::new();
    index.put(b"leftover", b"junk").unwrap();

    data_log.append(&Record::new(id("a"), fields(json!({"tag": "x"})))).unwrap();
    data_log.append(&Record::new(id("b"), fields(json!({"tag": "x"})))).unwrap();
    wal.append(&WalEntry::delete(id("b"))).unwrap();

    let index_fields = vec!["tag".to_string()];
    let stats = Compactor::new(&mut data_log, &mut wal, &mut index, &index_fields)
        .run()
        .unwrap();

    assert_eq!(stats.records_retained, 1);
    assert_eq!(stats.data_lines_read, 2);
    assert_eq!(stats.wal_entries_replayed, 1);
    assert!(stats.bytes_after < stats.bytes_before);
    assert_eq!(stats.bytes_after, data_log.size_bytes().unwrap());

    assert_eq!(index.get(b"leftover").unwrap(), None);
    assert!(index.get(b"a").unwrap().is_some());
    assert_eq!(
        index.get_index(&secondary_key("tag", &json!("x")).unwrap()).unwrap(),
        vec![b"a".to_vec()]
    );
    assert_eq!(wal.count().unwrap(), 0);
}
