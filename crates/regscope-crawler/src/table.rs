//! Paginated results-table extraction.

use crate::error::{CrawlError, Result};
use regscope_browser::{BrowserError, NavigationController, RetryPolicy};
use regscope_core::{Record, RECORD_CELL_COUNT};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records collected from a results list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOutcome {
    /// Rows from every page, in site order
    pub records: Vec<Record>,
    /// Number of pages whose rows were read
    pub pages_read: usize,
}

/// Walks a results table page by page until the "next" control is absent or
/// disabled.
pub struct TableExtractor<'a> {
    nav: &'a NavigationController,
}

impl<'a> TableExtractor<'a> {
    /// Extractor driving `nav`.
    #[must_use]
    pub fn new(nav: &'a NavigationController) -> Self {
        Self { nav }
    }

    /// Read every page of the table.
    ///
    /// A missing table container is fatal. Rows with fewer cells than the
    /// fixed layout are kept with the missing fields left empty.
    pub async fn extract(&self) -> Result<TableOutcome> {
        let selectors = &self.nav.site().selectors;

        if self.nav.wait_for(&selectors.table_container).await.is_err() {
            return Err(CrawlError::Extraction(format!(
                "results table {} not found",
                selectors.table_container
            )));
        }

        let mut outcome = TableOutcome::default();
        loop {
            let page = outcome.pages_read + 1;
            let rows = self.read_page(page).await?;
            outcome.pages_read = page;

            let before = outcome.records.len();
            outcome
                .records
                .extend(rows.iter().filter_map(|cells| to_record(page, cells)));
            debug!(page, rows = outcome.records.len() - before, "read table page");

            if !self.has_next_page().await? {
                break;
            }

            self.nav.click(&selectors.next_page).await?;
            settle(self.nav.timing().page_turn()).await;
            // An empty page is settled by `read_page`.
            if let Err(e) = self.nav.wait_for(&selectors.populated_cell).await {
                debug!(page = page + 1, error = %e, "next page rendered no cells");
            }
        }

        info!(
            pages = outcome.pages_read,
            records = outcome.records.len(),
            "table extraction finished"
        );
        Ok(outcome)
    }

    /// Rows of the current page. A later page that renders empty gets a
    /// bounded wait for its cells before it is accepted as empty.
    async fn read_page(&self, page: usize) -> Result<Vec<Vec<String>>> {
        let selectors = &self.nav.site().selectors;
        let rows = self.nav.read_rows(&selectors.table_rows).await?;
        if !rows.is_empty() || page == 1 {
            return Ok(rows);
        }

        let nav = self.nav;
        let once = &RetryPolicy::new(1, Duration::ZERO);
        let repopulated = nav
            .retry()
            .run("wait for rows to repopulate", || async move {
                nav.wait_for_with(once, &selectors.populated_cell).await?;
                let rows = nav.read_rows(&selectors.table_rows).await?;
                if rows.is_empty() {
                    Err(BrowserError::SelectorNotFound(selectors.table_rows.clone()))
                } else {
                    Ok(rows)
                }
            })
            .await;

        match repopulated {
            Ok(rows) => Ok(rows),
            Err(e) => {
                warn!(page, error = %e, "page stayed empty, accepting it as having no rows");
                Ok(Vec::new())
            }
        }
    }

    async fn has_next_page(&self) -> Result<bool> {
        let selectors = &self.nav.site().selectors;
        let Some(classes) = self.nav.element_classes(&selectors.next_page).await? else {
            debug!("next control absent");
            return Ok(false);
        };

        let disabled = classes
            .iter()
            .any(|class| selectors.next_disabled_classes.contains(class));
        if disabled {
            debug!(?classes, "next control disabled");
        }
        Ok(!disabled)
    }
}

/// Map one row's cells. Rows without any data cell (headers, placeholder
/// "no results" rows) are skipped.
fn to_record(page: usize, cells: &[String]) -> Option<Record> {
    if cells.iter().skip(1).all(|cell| cell.trim().is_empty()) {
        debug!(page, cells = cells.len(), "skipping row without data");
        return None;
    }
    if cells.len() < RECORD_CELL_COUNT {
        warn!(
            page,
            cells = cells.len(),
            expected = RECORD_CELL_COUNT,
            "short row, missing fields left empty"
        );
    }
    Some(Record::from_cells(cells))
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
