//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// One or more scenarios failed
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed {
        /// Failed scenarios
        failed: usize,
        /// Scenarios run
        total: usize,
    },

    /// Feature not compiled in
    #[error("{message}")]
    Unsupported {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness library error
    #[error("Harness error: {0}")]
    Harness(#[from] ticketflow::HarnessError),
}

impl CliError {
    /// Create an unsupported-feature error
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenarios_failed_message() {
        let err = CliError::ScenariosFailed { failed: 1, total: 3 };
        assert_eq!(err.to_string(), "1 of 3 scenario(s) failed");
    }

    #[test]
    fn test_harness_error_converts() {
        let err: CliError = ticketflow::HarnessError::invalid_configuration("bad").into();
        assert!(err.to_string().starts_with("Harness error:"));
    }
}
