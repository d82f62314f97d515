//! Regscope Crawler - one query in, one result out.
//!
//! A crawl opens an isolated browser session, submits the query to the
//! registry search form and, depending on where the site lands, either walks
//! every page of the results table or captures each tab of a company profile.
//! The session is torn down on every exit path.
//!
//! # Example
//!
//! ```rust,ignore
//! use regscope_crawler::Crawler;
//! use std::sync::Arc;
//!
//! let crawler = Crawler::from_config(Arc::new(browser_engine), &config);
//! let result = crawler.crawl("0105536092641").await?;
//! println!("{}", serde_json::to_string(&result)?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[allow(missing_docs)]
pub mod error;
pub mod machine;
pub mod profile;
pub mod table;

pub use error::{CrawlError, Result};
pub use machine::{CrawlState, CrawlStateMachine, Crawler};
pub use profile::ProfileExtractor;
pub use table::{TableExtractor, TableOutcome};
