//! Browser automation for the registry crawler.
//!
//! Provides isolated headless browser sessions with request interception,
//! and a navigation layer that retries every flaky step.

pub mod actions;
pub mod engine;
pub mod error;
mod intercept;
pub mod navigation;
pub mod retry;
pub mod session;

pub use actions::{BrowserActions, SessionProvider};
pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use navigation::{NavigationController, PanelState};
pub use retry::{ExhaustedRetries, RetryPolicy};
pub use session::ChromiumSession;
