use crate::retry::ExhaustedRetries;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    ScriptError(String),

    #[error("{operation} gave up after {attempts} attempts: {cause}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        #[source]
        cause: Box<BrowserError>,
    },
}

impl BrowserError {
    /// The innermost error, looking through retry exhaustion.
    pub fn root_cause(&self) -> &BrowserError {
        match self {
            Self::ExhaustedRetries { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

impl From<ExhaustedRetries<BrowserError>> for BrowserError {
    fn from(err: ExhaustedRetries<BrowserError>) -> Self {
        Self::ExhaustedRetries {
            operation: err.operation,
            attempts: err.attempts,
            cause: Box::new(err.cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::NavigationError("page not found".to_string());
        assert_eq!(err.to_string(), "navigation failed: page not found");
    }

    #[test]
    fn test_exhausted_retries_keeps_cause() {
        let err: BrowserError = ExhaustedRetries {
            operation: "wait for #fixTable".to_string(),
            attempts: 3,
            cause: BrowserError::Timeout("#fixTable".to_string()),
        }
        .into();

        assert_eq!(
            err.to_string(),
            "wait for #fixTable gave up after 3 attempts: timeout: #fixTable"
        );
        assert!(matches!(err.root_cause(), BrowserError::Timeout(_)));
    }
}
