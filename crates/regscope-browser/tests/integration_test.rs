use regscope_browser::actions::BrowserActions;
use regscope_browser::BrowserEngine;
use regscope_cache::{InterceptionPolicy, ResourceCache};
use regscope_core::{BrowserConfig, CacheConfig, CacheMode};
use std::sync::Arc;

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_browser_engine_launch() {
    let engine = BrowserEngine::launch(&BrowserConfig::default(), None).await;
    assert!(engine.is_ok(), "Failed to launch browser engine");
    engine.unwrap().shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_navigation() {
    let engine = BrowserEngine::launch(&BrowserConfig::default(), None)
        .await
        .unwrap();
    let session = engine.open_chromium_session().await.unwrap();

    assert!(session.navigate("https://example.com").await.is_ok());
    let url = session.current_url().await.unwrap();
    assert!(url.starts_with("https://example.com"));
    assert!(session.exists("h1").await.unwrap());
    assert!(!session.exists("#does-not-exist").await.unwrap());

    session.close().await.unwrap();
    // Second close is a no-op.
    session.close().await.unwrap();
    drop(session);
    engine.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_sessions_are_isolated() {
    let engine = BrowserEngine::launch(&BrowserConfig::default(), None)
        .await
        .unwrap();
    let first = engine.open_chromium_session().await.unwrap();
    let second = engine.open_chromium_session().await.unwrap();
    assert_ne!(first.id(), second.id());

    first.navigate("https://example.com").await.unwrap();
    second.navigate("https://example.com").await.unwrap();
    first.close().await.unwrap();
    // Closing one session leaves the other usable.
    assert!(second.exists("h1").await.unwrap());
    second.close().await.unwrap();

    drop((first, second));
    engine.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed and network access
async fn test_interception_populates_cache() {
    let cache = Arc::new(ResourceCache::in_memory(CacheMode::Permanent));
    let policy = Arc::new(InterceptionPolicy::new(
        &CacheConfig::default(),
        Arc::clone(&cache),
    ));
    let engine = BrowserEngine::launch(&BrowserConfig::default(), Some(policy))
        .await
        .unwrap();

    let session = engine.open_chromium_session().await.unwrap();
    session.navigate("https://example.com").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    session.close().await.unwrap();

    assert!(
        cache.lookup("https://example.com/").await.is_some(),
        "document should have been cached"
    );

    drop(session);
    engine.shutdown().await;
}
