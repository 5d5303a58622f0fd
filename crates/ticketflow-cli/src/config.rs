//! CLI configuration

use std::path::Path;

use ticketflow::HarnessConfig;

use crate::error::CliResult;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Level from the `-q` flag and `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Tracing filter for this level; `configured` applies at normal verbosity
    #[must_use]
    pub fn log_filter(self, configured: &str) -> String {
        match self {
            Self::Quiet => "error".to_string(),
            Self::Normal => configured.to_string(),
            Self::Verbose => "ticketflow=debug,info".to_string(),
            Self::Debug => "ticketflow=trace,debug".to_string(),
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stdout().features().colors_supported(),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }
}

/// Harness configuration from `path` (or defaults), with environment
/// overrides applied
pub fn load_harness_config(path: Option<&Path>) -> CliResult<HarnessConfig> {
    let config = match path {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    Ok(config.apply_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Debug);
        }

        #[test]
        fn test_log_filter() {
            assert_eq!(Verbosity::Normal.log_filter("warn"), "warn");
            assert_eq!(Verbosity::Quiet.log_filter("warn"), "error");
            assert!(Verbosity::Verbose.log_filter("warn").contains("ticketflow=debug"));
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_file_values_survive() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("ticketflow.yaml");
            std::fs::write(&path, "events_path: events/all\n").unwrap();
            let config = load_harness_config(Some(&path)).unwrap();
            assert_eq!(config.events_path, "events/all");
        }

        #[test]
        fn test_missing_file_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            assert!(load_harness_config(Some(&dir.path().join("nope.yaml"))).is_err());
        }
    }
}
