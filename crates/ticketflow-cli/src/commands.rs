//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

/// Ticketflow: run end-to-end scenarios against the ticketing site
#[derive(Parser, Debug)]
#[command(name = "ticketflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Harness configuration file (YAML)
    #[arg(short, long, global = true, env = "TICKETFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios in a fresh browser each
    Run(RunArgs),

    /// List the available scenarios
    List,

    /// Show or check the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenarios to run, all of them when omitted
    #[arg(value_enum)]
    pub scenarios: Vec<ScenarioName>,

    /// City picked before logging in
    #[arg(long, default_value = "Mumbai")]
    pub city: String,

    /// Mobile number entered by the invalid-mobile scenario
    #[arg(long, default_value = "12345")]
    pub mobile: String,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Override the site root
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory for failure screenshots
    #[arg(short, long)]
    pub artifacts: Option<PathBuf>,

    /// Stop after the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Only validate, print nothing on success
    #[arg(long)]
    pub check: bool,
}

/// Named end-to-end scenarios
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioName {
    /// Invalid mobile number is rejected at login
    InvalidMobile,
    /// First recommended movie opens its details page
    MovieDetails,
    /// Events listing shows at least one event
    Events,
}

impl ScenarioName {
    /// Every scenario, in run order
    pub const ALL: [Self; 3] = [Self::InvalidMobile, Self::MovieDetails, Self::Events];

    /// Kebab-case name used on the command line and in reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMobile => "invalid-mobile",
            Self::MovieDetails => "movie-details",
            Self::Events => "events",
        }
    }

    /// One-line description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidMobile => "select a city, enter an invalid mobile number, expect rejection",
            Self::MovieDetails => "open the first recommended movie, expect its details page",
            Self::Events => "open the events listing, expect at least one event card",
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["ticketflow", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.scenarios.is_empty());
        assert_eq!(args.city, "Mumbai");
        assert_eq!(args.mobile, "12345");
        assert!(!args.headed);
    }

    #[test]
    fn test_run_named_scenarios() {
        let cli = Cli::parse_from(["ticketflow", "-vv", "run", "events", "movie-details", "--headed"]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.scenarios, vec![ScenarioName::Events, ScenarioName::MovieDetails]);
        assert!(args.headed);
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        assert!(Cli::try_parse_from(["ticketflow", "run", "checkout"]).is_err());
    }

    #[test]
    fn test_scenario_names_match_value_enum() {
        for name in ScenarioName::ALL {
            let parsed = ScenarioName::from_str(name.as_str(), false).unwrap();
            assert_eq!(parsed, name);
        }
    }
}
