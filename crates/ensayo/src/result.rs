//! Result and error types for Ensayo.

use thiserror::Error;

/// Result type for Ensayo operations
pub type EnsayoResult<T> = Result<T, EnsayoError>;

/// Errors that can occur in Ensayo
#[derive(Debug, Error)]
pub enum EnsayoError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page-level driver error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// An intermediate frame in a frame path could not be found
    #[error("Frame not found for selector {selector}")]
    FrameNotFound {
        /// Selector of the missing frame
        selector: String,
    },

    /// A bounded wait exhausted its retry budget
    #[error("Timed out after {ms}ms waiting: {condition}")]
    WaitTimeout {
        /// Description of the condition waited for (names the selector)
        condition: String,
        /// Retry budget in milliseconds
        ms: u64,
    },

    /// A driver call failed (element missing, detached, not actionable)
    #[error("Driver action failed on {selector}: {message}")]
    Action {
        /// Selector the action targeted
        selector: String,
        /// Error message
        message: String,
    },

    /// A locator description failed validation
    #[error("Invalid target: {message}")]
    InvalidTarget {
        /// What was wrong with the description
        message: String,
    },

    /// Explicit expectation mismatch
    #[error("Assertion failed: {message}")]
    Assertion {
        /// Error message
        message: String,
    },

    /// Download capture error
    #[error("Download failed: {message}")]
    Download {
        /// Error message
        message: String,
    },

    /// Screenshot capture error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnsayoError {
    /// True for errors that end a scenario (timeouts and assertions);
    /// everything else is a fault a lenient helper may swallow.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. } | Self::Assertion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_message_names_condition() {
        let err = EnsayoError::WaitTimeout {
            condition: "element #save is not visible".to_string(),
            ms: 1000,
        };
        let text = err.to_string();
        assert!(text.contains("#save"));
        assert!(text.contains("1000ms"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EnsayoError::WaitTimeout {
            condition: "x".into(),
            ms: 1
        }
        .is_fatal());
        assert!(EnsayoError::Assertion {
            message: "x".into()
        }
        .is_fatal());
        assert!(!EnsayoError::Action {
            selector: "#a".into(),
            message: "gone".into()
        }
        .is_fatal());
        assert!(!EnsayoError::FrameNotFound {
            selector: "#frame".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EnsayoError = io.into();
        assert!(matches!(err, EnsayoError::Io(_)));
    }
}
