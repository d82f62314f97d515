//! Regscope Core - Foundation crate for the registry crawler.
//!
//! This crate provides shared types, error handling, configuration management
//! and the site definition that all other regscope crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`site`] - Selector map and timing for the target registry site
//! - [`types`] - Crawl domain types (`CrawlQuery`, `Record`, `CrawlResult`, ...)
//!
//! # Example
//!
//! ```rust
//! use regscope_core::{AppConfig, CrawlQuery};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.site.validate()?;
//!
//! let query = CrawlQuery::new("0105536092641")?;
//! assert!(query.looks_like_registration_number());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod site;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BackoffKind, BrowserConfig, CacheConfig, CacheMode, CrawlConfig, RetryConfig,
    ServerConfig,
};
pub use error::{ConfigError, ConfigResult, RegscopeError, Result};
pub use site::{ProfileTabSelectors, SelectorMap, SiteDefinition, SiteTiming};
pub use types::{
    CrawlQuery, CrawlResult, ImageArtifact, PageClassification, ProfileTab, Record, ResourceKind,
    NOT_FOUND_MESSAGE, RECORD_CELL_COUNT,
};
