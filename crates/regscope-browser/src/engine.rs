use crate::actions::{BrowserActions, SessionProvider};
use crate::error::{BrowserError, Result};
use crate::intercept;
use crate::session::ChromiumSession;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use regscope_cache::InterceptionPolicy;
use regscope_core::BrowserConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One browser process shared by every crawl.
///
/// Each call to [`BrowserEngine::open_chromium_session`] gets its own browser
/// context, so concurrent crawls never share cookies or storage.
pub struct BrowserEngine {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    config: BrowserConfig,
    policy: Option<Arc<InterceptionPolicy>>,
}

impl BrowserEngine {
    /// Launch the browser. With a policy, every session's requests are
    /// routed through it.
    pub async fn launch(
        config: &BrowserConfig,
        policy: Option<Arc<InterceptionPolicy>>,
    ) -> Result<Self> {
        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .window_size(config.window_width, config.window_height)
            .viewport(Viewport {
                width: config.window_width,
                height: config.window_height,
                ..Viewport::default()
            })
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !config.headless {
            builder = builder.with_head();
        }
        let launch = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(launch)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler stopped");
                    break;
                }
            }
        });

        info!(
            headless = config.headless,
            intercepting = policy.is_some(),
            "browser launched"
        );

        Ok(Self {
            browser: Arc::new(browser),
            handler,
            config: config.clone(),
            policy,
        })
    }

    /// Open an isolated session: fresh context, one page, user agent set and
    /// interception installed. A partially built context is disposed.
    pub async fn open_chromium_session(&self) -> Result<ChromiumSession> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("creating context: {e}")))?
            .result
            .browser_context_id
            .clone();

        match self.prepare_page(&context_id).await {
            Ok((page, interceptor)) => Ok(ChromiumSession::new(
                page,
                Arc::clone(&self.browser),
                context_id,
                interceptor,
                self.policy.as_ref().map(|p| Arc::clone(p.cache())),
            )),
            Err(e) => {
                if let Err(dispose) = self
                    .browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    warn!(error = %dispose, "failed to dispose context after setup error");
                }
                Err(e)
            }
        }
    }

    async fn prepare_page(
        &self,
        context_id: &BrowserContextId,
    ) -> Result<(Page, Option<JoinHandle<()>>)> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(BrowserError::ChromiumError)?;

        let page = self
            .browser
            .new_page(target)
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("opening page: {e}")))?;

        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("setting user agent: {e}")))?;

        let interceptor = match &self.policy {
            Some(policy) => Some(intercept::install(&page, Arc::clone(policy)).await?),
            None => None,
        };

        Ok((page, interceptor))
    }

    /// Close the browser process. Sessions still open are abandoned.
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "failed to close browser");
                }
                let _ = browser.wait().await;
            }
            Err(_) => warn!("browser still referenced by open sessions, abandoning"),
        }
        self.handler.abort();
        info!("browser shut down");
    }
}

#[async_trait::async_trait]
impl SessionProvider for BrowserEngine {
    async fn open_session(&self) -> Result<Box<dyn BrowserActions>> {
        let session = self.open_chromium_session().await?;
        debug!(session = %session.id(), "session handed to crawler");
        Ok(Box::new(session))
    }
}
