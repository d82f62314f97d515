//! `NavigationController`: one browsing session plus the retry budget and the
//! site definition it is driven with.
//!
//! Every primitive that touches the network or waits on the DOM goes through
//! [`RetryPolicy::run`]. Settle delays come from [`SiteTiming`] and exist
//! because the registry site renders menus and tables asynchronously.

use crate::actions::BrowserActions;
use crate::error::{BrowserError, Result};
use crate::retry::RetryPolicy;
use regscope_core::{CrawlQuery, PageClassification, SiteDefinition, SiteTiming};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Whether a tab's content region appeared after activating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    /// Content region is in the DOM
    Mounted,
    /// Content region never appeared within the retry budget
    Missing,
}

pub struct NavigationController {
    session: Box<dyn BrowserActions>,
    site: Arc<SiteDefinition>,
    retry: RetryPolicy,
    selector_timeout_ms: u64,
}

impl NavigationController {
    pub fn new(
        session: Box<dyn BrowserActions>,
        site: Arc<SiteDefinition>,
        retry: RetryPolicy,
        selector_timeout_ms: u64,
    ) -> Self {
        Self {
            session,
            site,
            retry,
            selector_timeout_ms,
        }
    }

    pub fn site(&self) -> &SiteDefinition {
        &self.site
    }

    pub fn timing(&self) -> &SiteTiming {
        &self.site.timing
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        let label = format!("navigate to {url}");
        Ok(self.retry.run(&label, || self.session.navigate(url)).await?)
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        let label = format!("click {selector}");
        Ok(self.retry.run(&label, || self.session.click(selector)).await?)
    }

    pub async fn hover(&self, selector: &str) -> Result<()> {
        let label = format!("hover {selector}");
        Ok(self.retry.run(&label, || self.session.hover(selector)).await?)
    }

    pub async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let label = format!("type into {selector}");
        Ok(self
            .retry
            .run(&label, || self.session.fill_field(selector, text))
            .await?)
    }

    pub async fn wait_for(&self, selector: &str) -> Result<()> {
        self.wait_for_with(&self.retry, selector).await
    }

    /// Wait for `selector` with an explicit retry budget.
    pub async fn wait_for_with(&self, retry: &RetryPolicy, selector: &str) -> Result<()> {
        let label = format!("wait for {selector}");
        Ok(retry
            .run(&label, || {
                self.session
                    .wait_for_selector(selector, self.selector_timeout_ms)
            })
            .await?)
    }

    pub async fn wait_for_navigation(&self) -> Result<()> {
        Ok(self
            .retry
            .run("wait for navigation", || self.session.wait_for_navigation())
            .await?)
    }

    pub async fn exists(&self, selector: &str) -> Result<bool> {
        let label = format!("query {selector}");
        Ok(self.retry.run(&label, || self.session.exists(selector)).await?)
    }

    pub async fn element_classes(&self, selector: &str) -> Result<Option<Vec<String>>> {
        let label = format!("read classes of {selector}");
        Ok(self
            .retry
            .run(&label, || self.session.element_classes(selector))
            .await?)
    }

    pub async fn read_rows(&self, row_selector: &str) -> Result<Vec<Vec<String>>> {
        let label = format!("read rows {row_selector}");
        Ok(self
            .retry
            .run(&label, || self.session.table_rows(row_selector))
            .await?)
    }

    pub async fn capture(&self, selector: &str) -> Result<Option<Vec<u8>>> {
        let label = format!("capture {selector}");
        Ok(self
            .retry
            .run(&label, || self.session.screenshot_element(selector))
            .await?)
    }

    pub async fn scroll_to_origin(&self) -> Result<()> {
        Ok(self
            .retry
            .run("scroll to origin", || self.session.scroll_to_origin())
            .await?)
    }

    /// Load the search page, clear interstitial prompts and submit `query`.
    ///
    /// Returns once the navigation triggered by the submission has settled.
    pub async fn submit_query(&self, query: &CrawlQuery) -> Result<()> {
        let selectors = &self.site.selectors;

        self.goto(&self.site.search_url).await?;
        settle(self.timing().post_load()).await;

        self.dismiss_interstitials().await;

        self.wait_for(&selectors.query_field).await?;
        self.type_text(&selectors.query_field, query.as_str()).await?;
        settle(self.timing().typing()).await;

        self.session
            .press_key(&selectors.query_field, &selectors.submit_key)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("submitting query: {e}")))?;
        self.wait_for_navigation().await?;

        debug!(query = %query, "query submitted");
        Ok(())
    }

    /// Click every configured interstitial that is present. Absence and click
    /// failures are not errors.
    pub async fn dismiss_interstitials(&self) {
        for selector in &self.site.selectors.interstitials {
            match self.session.exists(selector).await {
                Ok(true) => {
                    if let Err(e) = self.session.click(selector).await {
                        warn!(selector = %selector, error = %e, "could not dismiss interstitial");
                    } else {
                        debug!(selector = %selector, "dismissed interstitial");
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(selector = %selector, error = %e, "interstitial lookup failed"),
            }
        }
    }

    /// Open a tabbed panel whose link only becomes clickable while its menu is
    /// hovered, then wait for the panel's content region.
    ///
    /// Hover and click failures are errors; a content region that never
    /// appears is reported as [`PanelState::Missing`].
    pub async fn hover_then_activate(
        &self,
        hover_target: &str,
        activate_target: &str,
    ) -> Result<PanelState> {
        // The hover menu is rendered asynchronously.
        settle(self.timing().hover()).await;
        self.hover(hover_target).await?;
        settle(self.timing().hover()).await;
        self.click(activate_target).await?;

        let region = &self.site.selectors.content_region;
        match self.wait_for(region).await {
            Ok(()) => {
                settle(self.timing().post_activate()).await;
                Ok(PanelState::Mounted)
            }
            Err(e) => {
                warn!(target = %activate_target, error = %e, "panel content never mounted");
                Ok(PanelState::Missing)
            }
        }
    }

    /// Classify the page reached after submitting a query.
    pub async fn classify_result(&self) -> Result<PageClassification> {
        let url = self
            .retry
            .run("read current url", || self.session.current_url())
            .await?;
        let classification = PageClassification::from_url(&url, &self.site.profile_marker);
        debug!(url = %url, ?classification, "classified result page");
        Ok(classification)
    }

    /// Tear the session down.
    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
