//! Crawl state machine and the `Crawler` entry point.
//!
//! A crawl moves `Idle → Submitted → Classified → Extracting → Done`, or to
//! `Failed` from any state. [`Crawler::crawl`] owns the browser session and
//! closes it before returning, whatever the outcome.

use crate::error::{CrawlError, Result};
use crate::profile::ProfileExtractor;
use crate::table::TableExtractor;
use regscope_browser::{NavigationController, RetryPolicy, SessionProvider};
use regscope_core::{AppConfig, CrawlQuery, CrawlResult, PageClassification, SiteDefinition};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a crawl currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    /// Nothing has happened yet
    Idle,
    /// Query typed in and submitted
    Submitted,
    /// Result page kind known
    Classified(PageClassification),
    /// Extractor running
    Extracting(PageClassification),
    /// Result produced
    Done,
    /// Crawl aborted with the given error message
    Failed(String),
}

impl CrawlState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Submitted => f.write_str("submitted"),
            Self::Classified(PageClassification::ListPage) => f.write_str("classified(list)"),
            Self::Classified(PageClassification::ProfilePage) => {
                f.write_str("classified(profile)")
            }
            Self::Extracting(_) => f.write_str("extracting"),
            Self::Done => f.write_str("done"),
            Self::Failed(_) => f.write_str("failed"),
        }
    }
}

/// Drives one query through a navigation controller.
#[derive(Debug)]
pub struct CrawlStateMachine {
    query: CrawlQuery,
    history: Vec<CrawlState>,
}

impl CrawlStateMachine {
    /// A machine in [`CrawlState::Idle`].
    #[must_use]
    pub fn new(query: CrawlQuery) -> Self {
        Self {
            query,
            history: vec![CrawlState::Idle],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &CrawlState {
        self.history.last().unwrap_or(&CrawlState::Idle)
    }

    /// Every state visited, oldest first.
    #[must_use]
    pub fn history(&self) -> &[CrawlState] {
        &self.history
    }

    fn transition(&mut self, next: CrawlState) {
        if self.state().is_terminal() {
            warn!(
                query = %self.query,
                from = %self.state(),
                to = %next,
                "ignoring transition out of terminal state"
            );
            return;
        }
        debug!(query = %self.query, from = %self.state(), to = %next, "crawl transition");
        self.history.push(next);
    }

    /// Submit, classify and extract. Leaves the machine in `Done` or `Failed`.
    /// Does not close the session.
    pub async fn run(&mut self, nav: &NavigationController) -> Result<CrawlResult> {
        let outcome = self.advance(nav).await;
        self.settle_outcome(&outcome);
        outcome
    }

    async fn advance(&mut self, nav: &NavigationController) -> Result<CrawlResult> {
        nav.submit_query(&self.query).await?;
        self.transition(CrawlState::Submitted);

        let classification = nav.classify_result().await?;
        self.transition(CrawlState::Classified(classification));
        self.transition(CrawlState::Extracting(classification));

        match classification {
            PageClassification::ListPage => {
                let outcome = TableExtractor::new(nav).extract().await?;
                if outcome.records.is_empty() {
                    info!(query = %self.query, pages = outcome.pages_read, "no rows on any page");
                    Ok(CrawlResult::NotFound)
                } else {
                    Ok(CrawlResult::Table {
                        records: outcome.records,
                    })
                }
            }
            PageClassification::ProfilePage => {
                let captures = ProfileExtractor::new(nav).extract().await?;
                Ok(CrawlResult::Profile { captures })
            }
        }
    }

    fn settle_outcome(&mut self, outcome: &Result<CrawlResult>) {
        match outcome {
            Ok(_) => self.transition(CrawlState::Done),
            Err(e) => self.transition(CrawlState::Failed(e.to_string())),
        }
    }
}

/// Runs crawls, one isolated session each.
pub struct Crawler {
    provider: Arc<dyn SessionProvider>,
    site: Arc<SiteDefinition>,
    retry: RetryPolicy,
    selector_timeout_ms: u64,
    deadline: Option<Duration>,
}

impl Crawler {
    /// Crawler with no overall deadline and a 10 second selector wait.
    #[must_use]
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        site: Arc<SiteDefinition>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            site,
            retry,
            selector_timeout_ms: 10_000,
            deadline: None,
        }
    }

    /// Crawler configured from the `[site]`, `[retry]`, `[browser]` and
    /// `[crawl]` sections.
    #[must_use]
    pub fn from_config(provider: Arc<dyn SessionProvider>, config: &AppConfig) -> Self {
        let deadline = match config.crawl.deadline_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self::new(
            provider,
            Arc::new(config.site.clone()),
            RetryPolicy::from_config(&config.retry),
        )
        .with_selector_timeout(config.browser.selector_timeout_ms)
        .with_deadline(deadline)
    }

    /// How long one selector wait polls before counting as a failed attempt.
    #[must_use]
    pub fn with_selector_timeout(mut self, timeout_ms: u64) -> Self {
        self.selector_timeout_ms = timeout_ms;
        self
    }

    /// Upper bound on a whole crawl. The session is still closed when it
    /// elapses.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Crawl `query` and return what the registry has for it.
    pub async fn crawl(&self, query: &str) -> Result<CrawlResult> {
        let query = CrawlQuery::new(query).map_err(|e| CrawlError::InvalidQuery(e.to_string()))?;
        info!(
            query = %query,
            by_number = query.looks_like_registration_number(),
            "starting crawl"
        );

        let session = self
            .provider
            .open_session()
            .await
            .map_err(CrawlError::Browser)?;
        let nav = NavigationController::new(
            session,
            Arc::clone(&self.site),
            self.retry.clone(),
            self.selector_timeout_ms,
        );

        let mut machine = CrawlStateMachine::new(query.clone());
        let outcome = match self.deadline {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, machine.run(&nav)).await;
                timed.unwrap_or_else(|_| {
                    let elapsed = Err(CrawlError::Deadline(limit));
                    machine.settle_outcome(&elapsed);
                    elapsed
                })
            }
            None => machine.run(&nav).await,
        };

        if let Err(e) = nav.close().await {
            warn!(query = %query, error = %e, "session teardown failed");
        }

        match &outcome {
            Ok(_) => info!(query = %query, "crawl finished"),
            Err(e) => warn!(query = %query, state = %machine.state(), error = %e, "crawl failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_starts_idle() {
        let machine = CrawlStateMachine::new(CrawlQuery::new("Acme").unwrap());
        assert_eq!(machine.state(), &CrawlState::Idle);
        assert_eq!(machine.history().len(), 1);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut machine = CrawlStateMachine::new(CrawlQuery::new("Acme").unwrap());
        machine.transition(CrawlState::Submitted);
        machine.settle_outcome(&Err(CrawlError::Extraction("gone".to_string())));
        assert!(machine.state().is_terminal());

        machine.transition(CrawlState::Done);
        assert_eq!(
            machine.state(),
            &CrawlState::Failed("extraction failed: gone".to_string())
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            CrawlState::Classified(PageClassification::ProfilePage).to_string(),
            "classified(profile)"
        );
        assert_eq!(CrawlState::Failed("x".to_string()).to_string(), "failed");
    }
}
