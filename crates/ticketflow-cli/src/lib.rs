//! Ticketflow CLI library
//!
//! Command-line front end that runs the named end-to-end scenarios through
//! the harness and reports them.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
pub mod scenarios;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, RunArgs, ScenarioName};
pub use config::{load_harness_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ReportPrinter;
pub use scenarios::{run_scenario, ScenarioSettings};

use ticketflow::{ScenarioRunner, SessionFactory};
use tracing::info;

/// Run `names` in order, printing each report.
///
/// Fails with [`CliError::ScenariosFailed`] when any scenario failed.
pub async fn run_all<F: SessionFactory>(
    runner: &ScenarioRunner<F>,
    names: &[ScenarioName],
    settings: &ScenarioSettings,
    printer: &ReportPrinter,
    fail_fast: bool,
) -> CliResult<()> {
    let mut passed = 0;
    let mut failed = 0;
    for &name in names {
        let report = run_scenario(runner, name, settings).await;
        printer.report(&report);
        if report.passed() {
            passed += 1;
        } else {
            failed += 1;
            if fail_fast {
                info!(scenario = %name, "stopping after first failure");
                break;
            }
        }
    }
    printer.summary(passed, failed);
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed,
            total: passed + failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketflow::flows::EventLocators;
    use ticketflow::mock::{MockElement, MockSession, MockSessionFactory};
    use ticketflow::HarnessConfig;

    fn settings() -> ScenarioSettings {
        ScenarioSettings {
            config: HarnessConfig::default(),
            city: "Mumbai".to_string(),
            mobile: "12345".to_string(),
        }
    }

    fn quiet() -> ReportPrinter {
        ReportPrinter::new(
            &CliConfig::new()
                .with_verbosity(Verbosity::Quiet)
                .with_color(ColorChoice::Never),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_pass() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new();
        session.add_element(
            MockElement::new("card").matching(EventLocators::default().first_card),
        );
        let runner = ScenarioRunner::new(MockSessionFactory::new(session), dir.path());
        let names = [ScenarioName::Events];
        assert!(run_all(&runner, &names, &settings(), &quiet(), false).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScenarioRunner::new(MockSessionFactory::unreachable(), dir.path());
        let names = [ScenarioName::Events, ScenarioName::MovieDetails];
        match run_all(&runner, &names, &settings(), &quiet(), true).await {
            Err(CliError::ScenariosFailed { failed, total }) => {
                assert_eq!((failed, total), (1, 1));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        match run_all(&runner, &names, &settings(), &quiet(), false).await {
            Err(CliError::ScenariosFailed { failed, total }) => {
                assert_eq!((failed, total), (2, 2));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
