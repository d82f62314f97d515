use crate::actions::BrowserActions;
use crate::error::{BrowserError, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::DisposeBrowserContextParams;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, Page};
use regscope_cache::ResourceCache;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One page in its own browser context.
///
/// Cookies and storage are isolated from every other session. Closing the
/// session disposes of the context and flushes the resource cache.
pub struct ChromiumSession {
    id: Uuid,
    page: Page,
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    interceptor: Option<JoinHandle<()>>,
    cache: Option<Arc<ResourceCache>>,
    closed: AtomicBool,
}

impl ChromiumSession {
    pub(crate) fn new(
        page: Page,
        browser: Arc<Browser>,
        context_id: BrowserContextId,
        interceptor: Option<JoinHandle<()>>,
        cache: Option<Arc<ResourceCache>>,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "browser session opened");
        Self {
            id,
            page,
            browser,
            context_id,
            interceptor,
            cache,
            closed: AtomicBool::new(false),
        }
    }

    /// Identifier used in this session's log lines.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn element(&self, selector: &str) -> Result<Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| BrowserError::ScriptError(e.to_string()))
    }
}

/// Quote `selector` as a JavaScript string literal.
fn js_string(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait::async_trait]
impl BrowserActions for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<()> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?
            .ok_or_else(|| BrowserError::NavigationError("page has no URL".to_string()))
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.eval(format!(
            "document.querySelector({}) !== null",
            js_string(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.element(selector)
            .await?
            .click()
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("click {selector}: {e}")))?;
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.element(selector)
            .await?
            .hover()
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("hover {selector}: {e}")))?;
        Ok(())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.element(selector).await?;
        // Clear any previous value so typing replaces rather than appends.
        self.eval::<bool>(format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.value = ''; return true; }})()",
            js_string(selector)
        ))
        .await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("focus {selector}: {e}")))?
            .type_str(value)
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("type into {selector}: {e}")))?;
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        self.element(selector)
            .await?
            .press_key(key)
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("press {key}: {e}")))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.exists(selector).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn element_classes(&self, selector: &str) -> Result<Option<Vec<String>>> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? Array.from(el.classList) : null; }})()",
            js_string(selector)
        ))
        .await
    }

    async fn table_rows(&self, row_selector: &str) -> Result<Vec<Vec<String>>> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map(row => Array.from(row.querySelectorAll('td')).map(td => (td.innerText || '').trim()))",
            js_string(row_selector)
        ))
        .await
    }

    async fn scroll_to_origin(&self) -> Result<()> {
        self.eval::<bool>("(() => { window.scrollTo(0, 0); return true; })()".to_string())
            .await?;
        Ok(())
    }

    async fn screenshot_element(&self, selector: &str) -> Result<Option<Vec<u8>>> {
        let element = match self.page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(None),
        };
        let bytes = element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("capture {selector}: {e}")))?;
        Ok(Some(bytes))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(interceptor) = &self.interceptor {
            interceptor.abort();
        }
        if let Err(e) = self.page.clone().close().await {
            warn!(session = %self.id, error = %e, "failed to close page");
        }
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
        {
            warn!(session = %self.id, error = %e, "failed to dispose browser context");
        }
        if let Some(cache) = &self.cache {
            let written = cache.flush().await;
            debug!(session = %self.id, written, "flushed resource cache");
        }

        info!(session = %self.id, "browser session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("#fixTable"), "\"#fixTable\"");
        assert_eq!(
            js_string(r##"a[href="#tab21"]"##),
            r##""a[href=\"#tab21\"]""##
        );
    }
}
