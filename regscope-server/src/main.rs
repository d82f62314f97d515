//! Regscope HTTP server.
//!
//! Owns the resource cache and the browser engine for the life of the process
//! and answers `GET /api/search?from=<query>`.

mod routes;

use anyhow::Context;
use regscope_browser::{BrowserEngine, SessionProvider};
use regscope_cache::{InterceptionPolicy, ResourceCache};
use regscope_core::AppConfig;
use regscope_crawler::Crawler;
use routes::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,regscope=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting regscope v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("loading configuration")?;

    let cache = if config.cache.enabled {
        let dir = config.cache_dir().context("resolving cache directory")?;
        info!(dir = %dir.display(), mode = ?config.cache.mode, "opening resource cache");
        Some(Arc::new(ResourceCache::open(config.cache.mode, dir).await))
    } else {
        info!("resource cache disabled");
        None
    };
    let policy = cache
        .as_ref()
        .map(|cache| Arc::new(InterceptionPolicy::new(&config.cache, Arc::clone(cache))));

    let engine = Arc::new(
        BrowserEngine::launch(&config.browser, policy)
            .await
            .context("launching browser")?,
    );
    let crawler = Crawler::from_config(Arc::clone(&engine) as Arc<dyn SessionProvider>, &config);

    let app = routes::router(AppState {
        crawler: Arc::new(crawler),
    })
    .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    // The router, and with it the crawler, is gone; the engine and then the
    // cache can be released.
    match Arc::try_unwrap(engine) {
        Ok(engine) => engine.shutdown().await,
        Err(_) => warn!("browser engine still in use at shutdown"),
    }
    if let Some(cache) = cache {
        match Arc::try_unwrap(cache) {
            Ok(cache) => cache.close().await,
            Err(shared) => {
                let written = shared.flush().await;
                warn!(written, "resource cache still shared at shutdown, flushed only");
            }
        }
    }

    info!("regscope stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
