//! End-to-end tests for writing, reading and streaming a log on disk

use std::collections::HashSet;

use digest_log::{
    AppendOnlyLog, AtomicityMode, Blake3, ConfigError, JsonCodec, LogConfig, LogError,
    PostcardCodec,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn json_log() -> (AppendOnlyLog<Value>, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let log = AppendOnlyLog::new(LogConfig::testing(temp_dir.path()), JsonCodec::new(), Blake3)
        .unwrap();
    log.initialize().await.unwrap();
    (log, temp_dir)
}

async fn collect(log: &AppendOnlyLog<Value>, start: u64) -> Vec<Value> {
    log.stream_from(start)
        .map(|entry| entry.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn test_single_entry_round_trip() {
    let (log, _temp) = json_log().await;

    assert_eq!(log.head().await.unwrap(), 0);
    log.write(&json!({ "x": 1 })).await.unwrap();

    assert_eq!(log.head().await.unwrap(), 1);
    assert_eq!(log.read_at(0).await.unwrap(), json!({ "x": 1 }));
}

#[tokio::test]
async fn test_stream_from_middle() {
    let (log, _temp) = json_log().await;
    for entry in [json!({ "x": 1 }), json!({ "y": 2 }), json!({ "z": 3 })] {
        log.write(&entry).await.unwrap();
    }

    assert_eq!(
        collect(&log, 1).await,
        vec![json!({ "y": 2 }), json!({ "z": 3 })]
    );
    assert_eq!(collect(&log, 0).await.len(), 3);
    assert!(collect(&log, 3).await.is_empty());
    assert!(collect(&log, 10).await.is_empty());
}

#[tokio::test]
async fn test_read_at_matches_write_order() {
    let (log, _temp) = json_log().await;
    let written: Vec<Value> = (0..20).map(|i| json!({ "seq": i })).collect();
    for entry in &written {
        log.write(entry).await.unwrap();
    }

    for (i, expected) in written.iter().enumerate() {
        assert_eq!(&log.read_at(i as u64).await.unwrap(), expected);
    }

    // head does not move without writes
    assert_eq!(log.head().await.unwrap(), 20);
    assert_eq!(log.head().await.unwrap(), 20);

    let err = log.read_at(20).await.unwrap_err();
    assert!(matches!(err, LogError::NotFound(20)));
}

#[tokio::test]
async fn test_huge_positions_are_past_the_end() {
    let (log, _temp) = json_log().await;
    log.write(&json!({ "x": 1 })).await.unwrap();

    let err = log.read_at(u64::MAX).await.unwrap_err();
    assert!(matches!(err, LogError::NotFound(u64::MAX)));

    assert!(collect(&log, u64::MAX / 2).await.is_empty());
    assert!(collect(&log, u64::MAX).await.is_empty());
    assert_eq!(log.head().await.unwrap(), 1);
}

#[tokio::test]
async fn test_index_file_layout() {
    let (log, _temp) = json_log().await;
    let first = log.write(&json!({ "x": 1 })).await.unwrap();
    let second = log.write(&json!({ "y": 2 })).await.unwrap();

    let contents = tokio::fs::read_to_string(log.index_path()).await.unwrap();
    assert_eq!(contents, format!("{}\n{}\n", first.to_hex(), second.to_hex()));
    assert_eq!(contents.len(), 2 * log.line_width());

    let blob = tokio::fs::read(log.entries_path().join(first.to_hex()))
        .await
        .unwrap();
    assert_eq!(blob, br#"{"x":1}"#);
}

#[tokio::test]
async fn test_stream_ignores_writes_after_it_opens() {
    let (log, _temp) = json_log().await;
    log.write(&json!({ "x": 1 })).await.unwrap();
    log.write(&json!({ "y": 2 })).await.unwrap();

    let mut stream = log.stream();
    assert_eq!(stream.next().await.unwrap().unwrap(), json!({ "x": 1 }));

    log.write(&json!({ "z": 3 })).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), json!({ "y": 2 }));
    assert!(stream.next().await.is_none());

    // A fresh stream sees the new entry
    assert_eq!(collect(&log, 2).await, vec![json!({ "z": 3 })]);
}

#[tokio::test]
async fn test_duplicate_entries_share_a_blob() {
    let (log, _temp) = json_log().await;
    let a = log.write(&json!({ "x": 1 })).await.unwrap();
    let b = log.write(&json!({ "x": 1 })).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(log.head().await.unwrap(), 2);
    assert_eq!(log.read_at(1).await.unwrap(), json!({ "x": 1 }));

    let mut dir = tokio::fs::read_dir(log.entries_path()).await.unwrap();
    let mut blobs = 0;
    while dir.next_entry().await.unwrap().is_some() {
        blobs += 1;
    }
    assert_eq!(blobs, 1);
}

#[tokio::test]
async fn test_initialize_keeps_existing_entries() {
    let (log, temp) = json_log().await;
    log.write(&json!({ "x": 1 })).await.unwrap();
    log.initialize().await.unwrap();
    assert_eq!(log.head().await.unwrap(), 1);

    // A second handle on the same root sees the same log
    let reopened: AppendOnlyLog<Value> =
        AppendOnlyLog::new(LogConfig::testing(temp.path()), JsonCodec::new(), Blake3).unwrap();
    reopened.initialize().await.unwrap();
    assert_eq!(reopened.head().await.unwrap(), 1);
    assert_eq!(reopened.read_at(0).await.unwrap(), json!({ "x": 1 }));
}

#[tokio::test]
async fn test_operations_before_initialize_fail() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let log: AppendOnlyLog<Value> = AppendOnlyLog::new(
        LogConfig::testing(temp_dir.path().join("never-created")),
        JsonCodec::new(),
        Blake3,
    )
    .unwrap();

    assert!(matches!(log.head().await, Err(LogError::Io { .. })));
    assert_err!(log.write(&json!({ "x": 1 })).await);
    assert!(log.stream().next().await.unwrap().is_err());
}

#[test]
fn test_wide_digest_needs_linux_mode() {
    let wide = |data: &[u8]| blake3::hash(data).as_bytes().repeat(10);

    let posix = AppendOnlyLog::<Value>::builder()
        .directory("/unused")
        .codec(JsonCodec::new())
        .hash_function(wide)
        .build();
    match posix {
        Err(LogError::Config(ConfigError::LineTooWide { width, limit, mode })) => {
            assert_eq!(width, 641);
            assert_eq!(limit, 512);
            assert_eq!(mode, AtomicityMode::Posix);
        }
        other => panic!("expected LineTooWide, got {other:?}"),
    }

    let linux = AppendOnlyLog::<Value>::new(LogConfig::new("/unused").linux_only(), JsonCodec::new(), wide);
    assert_eq!(assert_ok!(linux).line_width(), 641);
}

#[test]
fn test_too_wide_even_for_linux() {
    let huge = |data: &[u8]| blake3::hash(data).as_bytes().repeat(100);
    let result = AppendOnlyLog::<Value>::builder()
        .directory("/unused")
        .atomicity(AtomicityMode::Linux)
        .codec(JsonCodec::new())
        .hash_function(huge)
        .build();

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        LogError::Config(ConfigError::LineTooWide { limit: 4096, .. })
    ));
}

#[test]
fn test_missing_capabilities() {
    let err = AppendOnlyLog::<Value>::builder().build().unwrap_err();
    assert!(matches!(err, LogError::Config(ConfigError::MissingDirectory)));

    let err = AppendOnlyLog::<Value>::builder()
        .directory("/unused")
        .build()
        .unwrap_err();
    assert!(matches!(err, LogError::Config(ConfigError::MissingCodec)));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: u16,
    celsius: f32,
    tags: Vec<String>,
}

#[tokio::test]
async fn test_postcard_entries() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let log = AppendOnlyLog::<Reading>::builder()
        .directory(temp_dir.path())
        .sync_on_write(false)
        .codec(PostcardCodec::new())
        .hash_function(Blake3)
        .build()
        .unwrap();
    log.initialize().await.unwrap();

    let readings: Vec<Reading> = (0..5)
        .map(|i| Reading {
            sensor: i,
            celsius: 20.5 + f32::from(i),
            tags: vec![format!("room-{i}")],
        })
        .collect();
    for reading in &readings {
        log.write(reading).await.unwrap();
    }

    let streamed: Vec<Reading> = log.stream().map(|r| r.unwrap()).collect().await;
    assert_eq!(streamed, readings);
}

#[tokio::test]
async fn test_concurrent_writers() {
    let (log, _temp) = json_log().await;

    let mut handles = Vec::new();
    for writer in 0..8 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            for seq in 0..25 {
                log.write(&json!({ "writer": writer, "seq": seq })).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(log.head().await.unwrap(), 200);

    let entries = collect(&log, 0).await;
    let distinct: HashSet<String> = entries.iter().map(|e| e.to_string()).collect();
    assert_eq!(distinct.len(), 200);

    // Each writer's own entries keep their order
    for writer in 0..8 {
        let seqs: Vec<i64> = entries
            .iter()
            .filter(|e| e["writer"] == writer)
            .map(|e| e["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, (0..25).collect::<Vec<_>>());
    }
}
