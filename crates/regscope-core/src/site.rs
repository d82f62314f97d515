//! Site definition: where to search and which selectors to drive.
//!
//! The crawl logic only ever refers to logical targets (query field, next
//! page control, profile tabs, ...). Their concrete CSS selectors and the
//! settle delays required by the site's asynchronous rendering live here so a
//! markup change on the registry site is a configuration change only.

use crate::error::{ConfigError, ConfigResult};
use crate::types::ProfileTab;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete definition of the target registry site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteDefinition {
    /// Human-readable site name
    pub name: String,

    /// Page holding the search form
    pub search_url: String,

    /// URL segment that identifies a single-entity profile page
    pub profile_marker: String,

    /// Logical target to selector mapping
    pub selectors: SelectorMap,

    /// Settle delays
    pub timing: SiteTiming,
}

impl Default for SiteDefinition {
    fn default() -> Self {
        Self {
            name: "DBD DataWarehouse".to_string(),
            search_url: "https://datawarehouse.dbd.go.th/index".to_string(),
            profile_marker: "profile".to_string(),
            selectors: SelectorMap::default(),
            timing: SiteTiming::default(),
        }
    }
}

impl SiteDefinition {
    /// Load a site definition from a standalone TOML file.
    ///
    /// # Errors
    /// Returns error if the file can't be read, isn't valid TOML or fails
    /// validation.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let definition: Self = toml::from_str(&contents)?;
        definition.validate()?;

        tracing::debug!(
            path = %path.display(),
            name = %definition.name,
            "loaded site definition"
        );

        Ok(definition)
    }

    /// Validate the definition for completeness.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("site.search_url", self.search_url.as_str()),
            ("site.profile_marker", self.profile_marker.as_str()),
            ("site.selectors.query_field", self.selectors.query_field.as_str()),
            ("site.selectors.submit_key", self.selectors.submit_key.as_str()),
            (
                "site.selectors.table_container",
                self.selectors.table_container.as_str(),
            ),
            ("site.selectors.table_rows", self.selectors.table_rows.as_str()),
            (
                "site.selectors.populated_cell",
                self.selectors.populated_cell.as_str(),
            ),
            ("site.selectors.next_page", self.selectors.next_page.as_str()),
            ("site.selectors.tab_menu", self.selectors.tab_menu.as_str()),
            (
                "site.selectors.content_region",
                self.selectors.content_region.as_str(),
            ),
            ("site.selectors.tabs.summary", self.selectors.tabs.summary.as_str()),
            (
                "site.selectors.tabs.statement",
                self.selectors.tabs.statement.as_str(),
            ),
            ("site.selectors.tabs.history", self.selectors.tabs.history.as_str()),
        ];

        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: (*field).to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        if !self.search_url.starts_with("http://") && !self.search_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "site.search_url".to_string(),
                reason: format!("must be an absolute http(s) URL, got `{}`", self.search_url),
            });
        }

        Ok(())
    }
}

/// CSS selectors for every logical target the crawl touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorMap {
    /// Warning and consent prompts dismissed before searching, if present
    pub interstitials: Vec<String>,

    /// Search text input
    pub query_field: String,

    /// Key pressed in the query field to submit
    pub submit_key: String,

    /// Results table root; its absence on a list page is fatal
    pub table_container: String,

    /// Data rows of the results table, header excluded
    pub table_rows: String,

    /// A data cell, used to wait for the table to repopulate
    pub populated_cell: String,

    /// Next-page control
    pub next_page: String,

    /// Classes that mark the next-page control as unusable
    pub next_disabled_classes: Vec<String>,

    /// Menu that must be hovered before a profile tab becomes clickable
    pub tab_menu: String,

    /// Profile tab links
    pub tabs: ProfileTabSelectors,

    /// Region captured for each profile tab
    pub content_region: String,
}

impl Default for SelectorMap {
    fn default() -> Self {
        Self {
            interstitials: vec!["#btnWarning".to_string(), ".cwc-accept-button".to_string()],
            query_field: "#key-word".to_string(),
            submit_key: "Enter".to_string(),
            table_container: "#fixTable".to_string(),
            table_rows: "#fixTable tr:not(:first-child)".to_string(),
            populated_cell: "#fixTable tr td".to_string(),
            next_page: "#next".to_string(),
            next_disabled_classes: vec!["hide".to_string(), "disabled".to_string()],
            tab_menu: "#menu2".to_string(),
            tabs: ProfileTabSelectors::default(),
            content_region: ".page-content".to_string(),
        }
    }
}

/// Selectors of the three profile tabs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileTabSelectors {
    /// Company summary tab
    pub summary: String,
    /// Financial statement tab
    pub statement: String,
    /// Registration history tab
    pub history: String,
}

impl Default for ProfileTabSelectors {
    fn default() -> Self {
        Self {
            summary: r##"a[href="#tab21"]"##.to_string(),
            statement: r##"a[href="#tab22"]"##.to_string(),
            history: r##"a[href="#tab23"]"##.to_string(),
        }
    }
}

impl ProfileTabSelectors {
    /// Selector for the given tab.
    #[must_use]
    pub fn for_tab(&self, tab: ProfileTab) -> &str {
        match tab {
            ProfileTab::Summary => &self.summary,
            ProfileTab::Statement => &self.statement,
            ProfileTab::History => &self.history,
        }
    }
}

/// Settle delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteTiming {
    /// After the search page has loaded
    pub post_load_settle_ms: u64,
    /// After typing the query, before submitting
    pub typing_settle_ms: u64,
    /// Before and after hovering the tab menu
    pub hover_settle_ms: u64,
    /// After a profile tab's content has mounted
    pub post_activate_settle_ms: u64,
    /// After clicking the next-page control
    pub page_turn_settle_ms: u64,
}

impl Default for SiteTiming {
    fn default() -> Self {
        Self {
            post_load_settle_ms: 2000,
            typing_settle_ms: 500,
            hover_settle_ms: 1000,
            post_activate_settle_ms: 500,
            page_turn_settle_ms: 2000,
        }
    }
}

impl SiteTiming {
    /// Timing with every delay set to zero, for scripted sessions.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            post_load_settle_ms: 0,
            typing_settle_ms: 0,
            hover_settle_ms: 0,
            post_activate_settle_ms: 0,
            page_turn_settle_ms: 0,
        }
    }

    /// Delay after the search page has loaded.
    #[must_use]
    pub fn post_load(&self) -> Duration {
        Duration::from_millis(self.post_load_settle_ms)
    }

    /// Delay after typing the query.
    #[must_use]
    pub fn typing(&self) -> Duration {
        Duration::from_millis(self.typing_settle_ms)
    }

    /// Delay around the tab menu hover.
    #[must_use]
    pub fn hover(&self) -> Duration {
        Duration::from_millis(self.hover_settle_ms)
    }

    /// Delay after a tab's content has mounted.
    #[must_use]
    pub fn post_activate(&self) -> Duration {
        Duration::from_millis(self.post_activate_settle_ms)
    }

    /// Delay after turning a page.
    #[must_use]
    pub fn page_turn(&self) -> Duration {
        Duration::from_millis(self.page_turn_settle_ms)
    }
}
