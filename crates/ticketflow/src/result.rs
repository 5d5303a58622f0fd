//! Result and error types for Ticketflow.

use thiserror::Error;

/// Result type for Ticketflow operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Malformed wait policy, chain or configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// The browser session cannot be reached
    #[error("Browser session unavailable: {message}")]
    SessionUnavailable {
        /// Error message
        message: String,
    },

    /// Handle issued before the most recent navigation
    #[error("Stale element handle {handle}: the page navigated since it was issued")]
    StaleElement {
        /// Handle id
        handle: String,
    },

    /// Element no longer attached to the document
    #[error("Element {handle} is detached from the document")]
    Detached {
        /// Handle id
        handle: String,
    },

    /// Script evaluation failed in the page
    #[error("Script execution failed: {message}")]
    ScriptError {
        /// Error message
        message: String,
    },

    /// Click, clear or type failed
    #[error("Interaction with {target} failed: {message}")]
    InteractionFailed {
        /// Element description
        target: String,
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A required wait never became true
    #[error("Timed out after {ms}ms waiting for {target} to be {condition}")]
    Timeout {
        /// Logical target
        target: String,
        /// Condition waited for
        condition: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Every fallback candidate was exhausted
    #[error("Could not resolve {target}; attempted strategies: {}", attempted.join(" -> "))]
    NotFound {
        /// Logical target
        target: String,
        /// Every candidate that was tried, in order
        attempted: Vec<String>,
    },

    /// Page flow operation called from the wrong state
    #[error("{flow} cannot {operation} while {state}")]
    InvalidState {
        /// Flow name
        flow: String,
        /// Operation attempted
        operation: String,
        /// Current state
        state: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Create an invalid configuration error
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a session unavailable error
    #[must_use]
    pub fn session_unavailable(message: impl Into<String>) -> Self {
        Self::SessionUnavailable {
            message: message.into(),
        }
    }

    /// Whether the error must abort the current operation instead of
    /// counting as an unsatisfied probe
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SessionUnavailable { .. } | Self::InvalidConfiguration { .. }
        )
    }
}
