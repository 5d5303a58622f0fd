//! Terminal output for scenario reports

use console::{style, Style, Term};
use ticketflow::ScenarioReport;

use crate::config::CliConfig;

/// Writes scenario results to stdout
#[derive(Debug)]
pub struct ReportPrinter {
    term: Term,
    use_color: bool,
    quiet: bool,
}

impl ReportPrinter {
    /// Printer honoring the color and verbosity settings of `config`
    #[must_use]
    pub fn new(config: &CliConfig) -> Self {
        Self {
            term: Term::stdout(),
            use_color: config.color.should_color(),
            quiet: config.verbosity.is_quiet(),
        }
    }

    /// Status line for one scenario
    #[must_use]
    pub fn format_report(&self, report: &ScenarioReport) -> String {
        let status = match (report.passed(), self.use_color) {
            (true, true) => style("✓ PASS").green().bold().to_string(),
            (false, true) => style("✗ FAIL").red().bold().to_string(),
            (true, false) => "PASS".to_string(),
            (false, false) => "FAIL".to_string(),
        };
        let mut line = format!(
            "{status} {} ({:.2}s)",
            report.name,
            report.elapsed.as_secs_f64()
        );
        if let Err(e) = &report.result {
            line.push_str(&format!("\n    {e}"));
        }
        if let Some(path) = &report.artifact {
            line.push_str(&format!("\n    screenshot: {}", path.display()));
        }
        line
    }

    /// Totals line
    #[must_use]
    pub fn format_summary(&self, passed: usize, failed: usize) -> String {
        if !self.use_color {
            return format!("{passed} passed, {failed} failed");
        }
        let passed_style = Style::new().green().bold();
        let failed_style = if failed > 0 {
            Style::new().red().bold()
        } else {
            Style::new().dim()
        };
        format!(
            "{} passed, {} failed",
            passed_style.apply_to(passed),
            failed_style.apply_to(failed)
        )
    }

    /// Print one scenario result; failures are printed even when quiet
    pub fn report(&self, report: &ScenarioReport) {
        if self.quiet && report.passed() {
            return;
        }
        let _ = self.term.write_line(&self.format_report(report));
    }

    /// Print the totals
    pub fn summary(&self, passed: usize, failed: usize) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&self.format_summary(passed, failed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;
    use std::path::PathBuf;
    use std::time::Duration;
    use ticketflow::HarnessError;

    fn report(result: ticketflow::HarnessResult<()>, artifact: Option<PathBuf>) -> ScenarioReport {
        ScenarioReport {
            name: "events".to_string(),
            run_id: uuid::Uuid::nil(),
            result,
            artifact,
            elapsed: Duration::from_millis(1_250),
        }
    }

    fn plain() -> ReportPrinter {
        ReportPrinter::new(&CliConfig::new().with_color(ColorChoice::Never))
    }

    #[test]
    fn test_pass_line() {
        assert_eq!(plain().format_report(&report(Ok(()), None)), "PASS events (1.25s)");
    }

    #[test]
    fn test_fail_line_with_screenshot() {
        let line = plain().format_report(&report(
            Err(HarnessError::session_unavailable("tab crashed")),
            Some(PathBuf::from("target/shots/events_1.png")),
        ));
        assert!(line.starts_with("FAIL events"));
        assert!(line.contains("tab crashed"));
        assert!(line.contains("screenshot: target/shots/events_1.png"));
    }

    #[test]
    fn test_plain_summary() {
        assert_eq!(plain().format_summary(2, 1), "2 passed, 1 failed");
    }
}
