//! Integration Tests for Persistence
//!
//! Exercises the public cache handle end to end: logging, snapshots,
//! compaction and crash recovery across cache instances.

use std::time::Duration;

use persistent_cache::{CacheConfig, CacheError, FsyncPolicy, KeyValue, PersistentCache};
use tempfile::TempDir;

// == Helper Functions ==

/// Config with a check period long enough that no tick fires mid-test.
fn config_in(dir: &TempDir, name: &str) -> CacheConfig {
    CacheConfig::new(name, 3_600_000)
        .with_directory(dir.path())
        .with_fsync(FsyncPolicy::Always)
}

async fn reopen(dir: &TempDir, name: &str) -> PersistentCache {
    let cache = PersistentCache::open(config_in(dir, name)).await.unwrap();
    cache.recover().await.unwrap();
    cache
}

// == Basic Operations ==

#[tokio::test]
async fn test_set_without_ttl_persists_indefinitely() {
    let dir = TempDir::new().unwrap();
    let cache = reopen(&dir, "basic").await;

    cache.set("foo", "bar", None).await.unwrap();
    assert_eq!(cache.get("foo").await.as_deref(), Some("bar"));
    assert!(cache.get_ttl("foo").await.is_none());
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_set_with_ttl_expires_lazily() {
    let dir = TempDir::new().unwrap();
    let cache = reopen(&dir, "ttl").await;

    cache.set("foo", "bar", Some(1)).await.unwrap();
    assert_eq!(cache.get("foo").await.as_deref(), Some("bar"));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(cache.get("foo").await.is_none());
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_ttl_command_expires_key() {
    let dir = TempDir::new().unwrap();
    let cache = reopen(&dir, "ttlcmd").await;

    cache.set("foo", "bar", None).await.unwrap();
    cache.ttl("foo", 1).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(cache.get("foo").await.is_none());
    let log = tokio::fs::read_to_string(cache.log_path()).await.unwrap();
    assert!(log.contains(r#"{"v":1,"cmd":"ttl","key":"foo","ttl":1}"#));
    cache.close().await.unwrap();
}

// == Recovery ==

#[tokio::test]
async fn test_recover_replays_log_without_snapshot() {
    let dir = TempDir::new().unwrap();
    {
        let cache = reopen(&dir, "replay").await;
        cache.set("foo", "bar", None).await.unwrap();
        cache
            .mset(vec![KeyValue::new("alice", "bob", None)])
            .await
            .unwrap();
        cache.del("foo").await.unwrap();
        // Simulated crash: the handle is dropped without close()
    }

    let cache = PersistentCache::open(config_in(&dir, "replay")).await.unwrap();
    let report = cache.recover().await.unwrap();

    assert_eq!(report.restored_entries, 0);
    assert_eq!(report.replayed_commands, 3);
    assert!(cache.get("foo").await.is_none());
    assert_eq!(cache.get("alice").await.as_deref(), Some("bob"));
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_recover_after_compaction() {
    let dir = TempDir::new().unwrap();
    {
        let cache = reopen(&dir, "compacted").await;
        cache.set("a", "1", None).await.unwrap();
        cache.set("b", "2", Some(3600)).await.unwrap();
        cache.compact().await.unwrap();
        cache.set("c", "3", None).await.unwrap();
        cache.del("a").await.unwrap();
        cache.close().await.unwrap();
    }

    let cache = PersistentCache::open(config_in(&dir, "compacted")).await.unwrap();
    let report = cache.recover().await.unwrap();

    assert_eq!(report.restored_entries, 2);
    assert_eq!(report.replayed_commands, 2);
    assert!(cache.get("a").await.is_none());
    assert_eq!(cache.get("b").await.as_deref(), Some("2"));
    assert_eq!(cache.get("c").await.as_deref(), Some("3"));
    assert!(cache.get_ttl("b").await.is_some());
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_keeps_absolute_expiry() {
    let dir = TempDir::new().unwrap();
    let expiry_before_restart = {
        let cache = reopen(&dir, "absolute").await;
        cache.set("k", "v", Some(3600)).await.unwrap();
        cache.compact().await.unwrap();
        let expiry = cache.get_ttl("k").await.unwrap();
        cache.close().await.unwrap();
        expiry
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let cache = reopen(&dir, "absolute").await;
    assert_eq!(cache.get_ttl("k").await, Some(expiry_before_restart));
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_recover_fails_on_corrupt_log() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(
        dir.path().join("corrupt.append"),
        "{\"cmd\":\"set\",\"key\":\"k\",\"val\":\"v\"}\nnot json\n",
    )
    .await
    .unwrap();

    let cache = PersistentCache::open(config_in(&dir, "corrupt")).await.unwrap();
    let err = cache.recover().await.unwrap_err();

    assert!(matches!(err, CacheError::MalformedCommand { line: 2, .. }));
    assert!(err.is_recovery_error());
    // No partial state is installed
    assert!(cache.get("k").await.is_none());
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_recover_fails_on_corrupt_snapshot() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("badsnap.backup"), "{oops")
        .await
        .unwrap();

    let cache = PersistentCache::open(config_in(&dir, "badsnap")).await.unwrap();
    let err = cache.recover().await.unwrap_err();

    assert!(matches!(err, CacheError::MalformedSnapshot { .. }));
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_recover_reads_unversioned_files() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(
        dir.path().join("legacy.backup"),
        r#"[{"key":"foo","val":"bar","ttl":0},{"key":"alice","val":"bob","ttl":0}]"#,
    )
    .await
    .unwrap();
    tokio::fs::write(
        dir.path().join("legacy.append"),
        concat!(
            "{\"cmd\":\"set\",\"key\":\"john\",\"val\":\"doe\"}\n",
            "{\"cmd\":\"del\",\"key\":\"alice\"}\n",
            "{\"cmd\":\"mset\",\"keyValue\":[{\"key\":\"abc\",\"val\":\"xyz\"},{\"key\":\"cat\",\"val\":\"dog\",\"ttl\":10}]}\n",
        ),
    )
    .await
    .unwrap();

    let cache = reopen(&dir, "legacy").await;

    assert_eq!(cache.get("foo").await.as_deref(), Some("bar"));
    assert!(cache.get("nothing").await.is_none());
    assert!(cache.get("alice").await.is_none());
    assert_eq!(cache.get("abc").await.as_deref(), Some("xyz"));
    assert_eq!(cache.get("john").await.as_deref(), Some("doe"));
    assert!(cache.get_ttl("cat").await.is_some());
    cache.close().await.unwrap();
}

// == Compaction ==

#[tokio::test]
async fn test_compact_truncates_log_and_writes_backup() {
    let dir = TempDir::new().unwrap();
    let cache = reopen(&dir, "mycache").await;

    cache
        .mset(vec![
            KeyValue::new("foo", "bar", None),
            KeyValue::new("alice", "bob", None),
        ])
        .await
        .unwrap();
    cache.compact().await.unwrap();

    let backup = tokio::fs::read_to_string(dir.path().join("mycache.backup"))
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&backup).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
    assert!(backup.contains(r#"{"key":"foo","val":"bar","ttl":0}"#));

    let log = tokio::fs::read_to_string(dir.path().join("mycache.append"))
        .await
        .unwrap();
    assert!(log.is_empty());

    // Mutations after compaction land in the emptied log
    cache.del("foo").await.unwrap();
    let log = tokio::fs::read_to_string(cache.log_path()).await.unwrap();
    assert_eq!(log, "{\"v\":1,\"cmd\":\"del\",\"key\":\"foo\"}\n");
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_stats_and_keys() {
    let dir = TempDir::new().unwrap();
    let cache = reopen(&dir, "stats").await;

    cache.set("a", "1", None).await.unwrap();
    cache.set("b", "2", None).await.unwrap();
    cache.get("a").await;
    cache.get("zzz").await;

    let mut keys = cache.keys().await;
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.total_entries, 2);
    cache.close().await.unwrap();
}
