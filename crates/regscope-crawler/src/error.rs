use regscope_browser::BrowserError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("navigation failed: {0}")]
    Navigation(#[from] BrowserError),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("could not open browser session: {0}")]
    Browser(#[source] BrowserError),

    #[error("crawl did not finish within {0:?}")]
    Deadline(Duration),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_errors_surface_as_navigation() {
        let err: CrawlError = BrowserError::Timeout("#next".to_string()).into();
        assert!(matches!(err, CrawlError::Navigation(_)));
        assert_eq!(err.to_string(), "navigation failed: timeout: #next");
    }

    #[test]
    fn test_deadline_display() {
        let err = CrawlError::Deadline(Duration::from_secs(5));
        assert_eq!(err.to_string(), "crawl did not finish within 5s");
    }
}
