use crate::error::Result;

/// Primitive actions on one isolated browsing session.
///
/// Implemented by [`crate::ChromiumSession`] for a real browser; anything that
/// can honour these calls (a scripted double in tests) can drive a crawl.
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Navigate to an absolute URL and wait for the load event
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait for the navigation in progress to settle
    async fn wait_for_navigation(&self) -> Result<()>;

    /// URL of the current document
    async fn current_url(&self) -> Result<String>;

    /// Whether an element matches `selector` right now
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Move the pointer over an element by selector
    async fn hover(&self, selector: &str) -> Result<()>;

    /// Replace the value of a form field by typing `value` into it
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Press a named key (e.g. `Enter`) with the element focused
    async fn press_key(&self, selector: &str, key: &str) -> Result<()>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Class list of the first matching element, `None` if nothing matches
    async fn element_classes(&self, selector: &str) -> Result<Option<Vec<String>>>;

    /// Trimmed text of every `td` cell of every row matching `row_selector`
    async fn table_rows(&self, row_selector: &str) -> Result<Vec<Vec<String>>>;

    /// Scroll the window back to its origin
    async fn scroll_to_origin(&self) -> Result<()>;

    /// PNG capture of the first matching element, `None` if nothing matches
    async fn screenshot_element(&self, selector: &str) -> Result<Option<Vec<u8>>>;

    /// Tear the session down. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Opens isolated sessions, one per crawl.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a fresh session
    async fn open_session(&self) -> Result<Box<dyn BrowserActions>>;
}
