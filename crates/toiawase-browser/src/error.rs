use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Failures surfaced by the browser layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    ScriptError(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::ChromiumError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_error_display() {
        let err = BrowserError::NavigationError("https://example.jp: net::ERR_FAILED".to_string());
        assert_eq!(
            err.to_string(),
            "navigation failed: https://example.jp: net::ERR_FAILED"
        );
    }

    #[test]
    fn test_timeout_display_names_the_wait() {
        let err = BrowserError::Timeout("page close".to_string());
        assert_eq!(err.to_string(), "timed out waiting for page close");
    }

    #[test]
    fn test_script_error_display() {
        let err = BrowserError::ScriptError("ReferenceError: x is not defined".to_string());
        assert!(err.to_string().contains("ReferenceError"));
    }
}
