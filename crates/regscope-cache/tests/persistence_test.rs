use chrono::{Duration, Utc};
use regscope_cache::{cache_key, file_stem, CacheEntry, ResourceCache};
use regscope_core::CacheMode;
use std::sync::Arc;
use tempfile::TempDir;

fn script(body: &[u8]) -> CacheEntry {
    CacheEntry::new(
        200,
        vec![
            ("Content-Type".to_string(), "application/javascript".to_string()),
            ("ETag".to_string(), "\"abc\"".to_string()),
        ],
        body.to_vec(),
        None,
    )
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let tmp = TempDir::new().expect("create temp dir");
    let dir = tmp.path().join("resources");
    let key = cache_key("https://datawarehouse.dbd.go.th/js/app.js?v=9").expect("key");
    let body: Vec<u8> = (0..=255u8).collect();

    let cache = ResourceCache::open(CacheMode::Permanent, &dir).await;
    assert!(!dir.exists(), "directory is created lazily");
    assert!(cache.store(&key, script(&body)).await);
    assert_eq!(cache.flush().await, 1);
    assert!(dir.exists());
    cache.close().await;

    let reopened = ResourceCache::open(CacheMode::Permanent, &dir).await;
    let entry = reopened.lookup(&key).await.expect("entry persisted");
    assert_eq!(*entry, script(&body));
}

#[tokio::test]
async fn test_flush_without_new_entries_writes_nothing() {
    let tmp = TempDir::new().expect("create temp dir");
    let dir = tmp.path().join("resources");

    let cache = ResourceCache::open(CacheMode::Permanent, &dir).await;
    assert_eq!(cache.flush().await, 0);
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_expired_entries_are_not_reloaded() {
    let tmp = TempDir::new().expect("create temp dir");
    let dir = tmp.path().to_path_buf();
    let key = "https://site.test/short.css";

    let cache = ResourceCache::open(CacheMode::Ttl, &dir).await;
    let mut entry = script(b"body{}");
    entry.expires_at = Some(Utc::now() + Duration::milliseconds(200));
    cache.store(key, entry).await;
    assert_eq!(cache.flush().await, 1);

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let reopened = ResourceCache::open(CacheMode::Ttl, &dir).await;
    assert!(reopened.lookup(key).await.is_none());
    assert!(reopened.is_empty().await);
    assert!(!dir.join(format!("{}.meta.json", file_stem(key))).exists());
}

#[tokio::test]
async fn test_corrupt_entries_are_skipped() {
    let tmp = TempDir::new().expect("create temp dir");
    let dir = tmp.path().to_path_buf();

    let cache = ResourceCache::open(CacheMode::Permanent, &dir).await;
    cache.store("https://site.test/good.js", script(b"ok")).await;
    cache.flush().await;

    std::fs::write(dir.join("garbage.meta.json"), b"{not json").expect("write garbage");
    std::fs::write(
        dir.join("orphan.meta.json"),
        br#"{"key":"https://site.test/orphan.js","status":200,"headers":[],"expires_at":null}"#,
    )
    .expect("write orphan meta");

    let reopened = ResourceCache::open(CacheMode::Permanent, &dir).await;
    assert_eq!(reopened.len().await, 1);
    assert!(reopened.lookup("https://site.test/good.js").await.is_some());
}

#[tokio::test]
async fn test_unwritable_directory_degrades_to_memory() {
    let tmp = TempDir::new().expect("create temp dir");
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"file, not a directory").expect("write blocker");

    let cache = ResourceCache::open(CacheMode::Permanent, blocker.join("resources")).await;
    assert!(cache.store("https://site.test/a.js", script(b"a")).await);
    assert_eq!(cache.flush().await, 0);
    assert!(cache.lookup("https://site.test/a.js").await.is_some());
}

#[tokio::test]
async fn test_concurrent_sessions_share_one_cache() {
    let tmp = TempDir::new().expect("create temp dir");
    let cache = Arc::new(ResourceCache::open(CacheMode::Ttl, tmp.path()).await);

    let mut handles = Vec::new();
    for writer in 0..8u8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for round in 0..20u8 {
                let body = vec![writer; 64 + usize::from(round)];
                cache.store("https://site.test/shared.js", script(&body)).await;
                if let Some(entry) = cache.lookup("https://site.test/shared.js").await {
                    let first = entry.body[0];
                    assert!(entry.body.iter().all(|b| *b == first), "torn entry");
                }
            }
        }));
    }
    for handle in handles {
        handle.await.expect("writer task");
    }

    assert_eq!(cache.flush().await, 1);
    assert_eq!(cache.len().await, 1);
}
