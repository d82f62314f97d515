//! Crawl domain types.
//!
//! This module defines the input, the two result shapes and the small enums
//! shared by the cache, browser and crawler crates.

use crate::error::RegscopeError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Message returned when a list crawl observed no rows at all.
pub const NOT_FOUND_MESSAGE: &str = "Not Found data";

/// Number of cells in a well-formed results row (ordinal + 13 fields).
pub const RECORD_CELL_COUNT: usize = 14;

/// A company name or registration number to search for.
///
/// Immutable once accepted; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CrawlQuery(String);

impl CrawlQuery {
    /// Create a new `CrawlQuery`.
    ///
    /// # Errors
    /// Returns error if the query is empty or whitespace only.
    pub fn new(query: impl Into<String>) -> Result<Self, RegscopeError> {
        let query = query.into();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(RegscopeError::Validation(
                "query must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the query is a 13-digit juristic registration number.
    #[must_use]
    pub fn looks_like_registration_number(&self) -> bool {
        self.0.len() == 13 && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for CrawlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the search results table.
///
/// Every field holds the cell text verbatim; numbers keep the site's own
/// formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Internal identifier
    #[serde(rename = "ID")]
    pub identifier: String,
    /// Juristic registration number
    #[serde(rename = "Number")]
    pub registration_number: String,
    /// Company name
    #[serde(rename = "Name")]
    pub name: String,
    /// Legal entity type
    #[serde(rename = "Type")]
    pub legal_type: String,
    /// Registration status
    #[serde(rename = "Status")]
    pub status: String,
    /// Industry classification code
    #[serde(rename = "TSIC")]
    pub industry_code: String,
    /// Industry description
    #[serde(rename = "Industry")]
    pub industry_description: String,
    /// Province of the head office
    #[serde(rename = "Province")]
    pub province: String,
    /// Registered capital
    #[serde(rename = "Capital")]
    pub capital: String,
    /// Total revenue
    #[serde(rename = "TotalRevenue")]
    pub revenue: String,
    /// Net profit
    #[serde(rename = "NetProfit")]
    pub net_profit: String,
    /// Total assets
    #[serde(rename = "TotalAssets")]
    pub total_assets: String,
    /// Shareholder equity
    #[serde(rename = "ShareholderEquity")]
    pub shareholder_equity: String,
}

impl Record {
    /// Map a row's cells onto the fixed column layout.
    ///
    /// Cell 0 is the row ordinal and is skipped. Missing cells become empty
    /// strings.
    #[must_use]
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
        Self {
            identifier: cell(1),
            registration_number: cell(2),
            name: cell(3),
            legal_type: cell(4),
            status: cell(5),
            industry_code: cell(6),
            industry_description: cell(7),
            province: cell(8),
            capital: cell(9),
            revenue: cell(10),
            net_profit: cell(11),
            total_assets: cell(12),
            shareholder_equity: cell(13),
        }
    }
}

/// A base64-encoded PNG capture of one page region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageArtifact(String);

impl ImageArtifact {
    /// Encode raw image bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BASE64.encode(bytes))
    }

    /// The artifact recorded when a region could not be captured.
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The base64 text.
    #[must_use]
    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Decode back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.0)
    }
}

/// Outcome of one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlResult {
    /// Rows collected from every page of a results list, in site order
    Table {
        /// Collected rows
        records: Vec<Record>,
    },
    /// One capture per profile tab, in [`ProfileTab::ALL`] order
    Profile {
        /// Tab captures
        captures: Vec<ImageArtifact>,
    },
    /// A results list with no rows on any page
    NotFound,
}

impl Serialize for CrawlResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Table { records } => map.serialize_entry("records", records)?,
            Self::Profile { captures } => map.serialize_entry("captures", captures)?,
            Self::NotFound => map.serialize_entry("message", NOT_FOUND_MESSAGE)?,
        }
        map.end()
    }
}

/// Kind of page reached after submitting a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClassification {
    /// Search results with a paginated table
    ListPage,
    /// A single-entity profile with tabbed sections
    ProfilePage,
}

impl PageClassification {
    /// Classify a destination URL by the presence of the profile marker.
    #[must_use]
    pub fn from_url(url: &str, profile_marker: &str) -> Self {
        if url.contains(profile_marker) {
            Self::ProfilePage
        } else {
            Self::ListPage
        }
    }
}

/// Profile tabs, in capture order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileTab {
    /// Company summary
    Summary,
    /// Financial statement
    Statement,
    /// Registration history
    History,
}

impl ProfileTab {
    /// Every tab, in the order they are visited.
    pub const ALL: [Self; 3] = [Self::Summary, Self::Statement, Self::History];

    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Statement => "statement",
            Self::History => "history",
        }
    }
}

impl fmt::Display for ProfileTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of network resource requested while rendering a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// HTML documents
    Document,
    /// JavaScript
    Script,
    /// CSS
    Stylesheet,
    /// Images
    Image,
    /// Fonts
    Font,
    /// Audio and video
    Media,
    /// XHR and fetch calls
    Xhr,
    /// Anything else
    Other,
}
