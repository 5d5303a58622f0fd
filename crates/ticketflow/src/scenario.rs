//! Scenario lifecycle: open a session, run the body, capture a screenshot
//! on failure, always close.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use regex::Regex;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::driver::{BrowserSession, SessionFactory};
use crate::result::{HarnessError, HarnessResult};

/// Outcome of one scenario run
#[derive(Debug)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Unique id of this run, also logged
    pub run_id: Uuid,
    /// Body result, or the close error when the body passed
    pub result: HarnessResult<()>,
    /// Failure screenshot, if one was captured
    pub artifact: Option<PathBuf>,
    /// Wall time including session setup and teardown
    pub elapsed: Duration,
}

impl ScenarioReport {
    /// Whether the scenario passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.result.is_ok()
    }

    /// The result, dropping the rest of the report
    pub fn into_result(self) -> HarnessResult<()> {
        self.result
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed() { "PASS" } else { "FAIL" };
        write!(f, "{status} {} ({:.2}s)", self.name, self.elapsed.as_secs_f64())?;
        if let Err(e) = &self.result {
            write!(f, ": {e}")?;
        }
        if let Some(path) = &self.artifact {
            write!(f, " [screenshot: {}]", path.display())?;
        }
        Ok(())
    }
}

/// Runs scenario bodies against sessions from a [`SessionFactory`]
pub struct ScenarioRunner<F: SessionFactory> {
    factory: F,
    artifacts_dir: PathBuf,
}

impl<F: SessionFactory> fmt::Debug for ScenarioRunner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("artifacts_dir", &self.artifacts_dir)
            .finish_non_exhaustive()
    }
}

impl<F: SessionFactory> ScenarioRunner<F> {
    /// Runner writing failure screenshots under `artifacts_dir`
    pub fn new(factory: F, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Screenshot directory
    #[must_use]
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Run `body` in a fresh session.
    ///
    /// The session is closed on both paths. A failed screenshot never masks
    /// the body's error, and a close error only surfaces when the body passed.
    pub async fn run<B>(&self, name: &str, body: B) -> ScenarioReport
    where
        B: for<'a> FnOnce(&'a mut F::Session) -> BoxFuture<'a, HarnessResult<()>>,
    {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        info!(scenario = name, %run_id, "scenario started");

        let mut session = match self.factory.open().await {
            Ok(session) => session,
            Err(e) => {
                error!(scenario = name, %run_id, error = %e, "could not open session");
                return ScenarioReport {
                    name: name.to_string(),
                    run_id,
                    result: Err(e),
                    artifact: None,
                    elapsed: started.elapsed(),
                };
            }
        };

        let outcome = body(&mut session).await;
        let artifact = match &outcome {
            Ok(()) => None,
            Err(e) => {
                warn!(scenario = name, %run_id, error = %e, "scenario failed");
                self.capture(&session, name).await
            }
        };

        let closed = session.close().await;
        let result = match (outcome, closed) {
            (Ok(()), Err(close)) => Err(close),
            (Err(e), Err(close)) => {
                warn!(scenario = name, %run_id, error = %close, "session close failed");
                Err(e)
            }
            (outcome, Ok(())) => outcome,
        };

        let elapsed = started.elapsed();
        info!(
            scenario = name,
            %run_id,
            passed = result.is_ok(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scenario finished"
        );
        ScenarioReport {
            name: name.to_string(),
            run_id,
            result,
            artifact,
            elapsed,
        }
    }

    async fn capture(&self, session: &F::Session, name: &str) -> Option<PathBuf> {
        match self.write_screenshot(session, name).await {
            Ok(path) => {
                info!(path = %path.display(), "failure screenshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "could not capture failure screenshot");
                None
            }
        }
    }

    async fn write_screenshot(&self, session: &F::Session, name: &str) -> HarnessResult<PathBuf> {
        let png = session.screenshot().await?;
        if png.is_empty() {
            return Err(HarnessError::ScreenshotError {
                message: "browser returned an empty image".to_string(),
            });
        }
        tokio::fs::create_dir_all(&self.artifacts_dir).await?;
        let file = format!(
            "{}_{}.png",
            artifact_stem(name),
            Utc::now().format("%Y%m%dT%H%M%S%3f")
        );
        let path = self.artifacts_dir.join(file);
        tokio::fs::write(&path, png).await?;
        Ok(path)
    }
}

/// Scenario name reduced to a file-name-safe stem
#[must_use]
pub fn artifact_stem(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let pattern = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"));
    let stem = pattern.replace_all(name.trim(), "_");
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "scenario".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockSession, MockSessionFactory, MOCK_PNG};

    fn pass() -> BoxFuture<'static, HarnessResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn fail(err: HarnessError) -> BoxFuture<'static, HarnessResult<()>> {
        Box::pin(async move { Err(err) })
    }

    fn runner(session: &MockSession, dir: &Path) -> ScenarioRunner<MockSessionFactory> {
        ScenarioRunner::new(MockSessionFactory::new(session.clone()), dir)
    }

    #[test]
    fn test_artifact_stem() {
        assert_eq!(artifact_stem("Invalid mobile / OTP"), "Invalid_mobile_OTP");
        assert_eq!(artifact_stem("movie-details"), "movie-details");
        assert_eq!(artifact_stem("  ***  "), "scenario");
    }

    #[tokio::test]
    async fn test_passing_scenario_closes_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new();
        let report = runner(&session, dir.path())
            .run("events", |s| {
                Box::pin(async move { s.navigate("https://example.test/events").await })
            })
            .await;
        assert!(report.passed());
        assert!(report.artifact.is_none());
        assert!(session.is_closed());
        assert!(!session.was_called("screenshot"));
        assert!(report.to_string().starts_with("PASS events"));
    }

    #[tokio::test]
    async fn test_failing_scenario_writes_screenshot_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new();
        let report = runner(&session, dir.path())
            .run("invalid mobile", |_| {
                fail(HarnessError::Timeout {
                    target: "continue button".into(),
                    condition: "clickable".into(),
                    ms: 10_000,
                })
            })
            .await;

        assert!(matches!(report.result, Err(HarnessError::Timeout { .. })));
        let artifact = report.artifact.clone().unwrap();
        assert!(artifact.starts_with(dir.path()));
        assert!(artifact
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("invalid_mobile_"));
        assert_eq!(std::fs::read(&artifact).unwrap(), MOCK_PNG);
        let history = session.history();
        let shot = history.iter().position(|c| c == "screenshot").unwrap();
        let close = history.iter().position(|c| c == "close").unwrap();
        assert!(shot < close);
    }

    #[tokio::test]
    async fn test_screenshot_failure_keeps_body_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new();
        session.fail_screenshots();
        let report = runner(&session, dir.path())
            .run("movie-details", |_| {
                fail(HarnessError::session_unavailable("tab crashed"))
            })
            .await;
        assert!(matches!(report.result, Err(HarnessError::SessionUnavailable { .. })));
        assert!(report.artifact.is_none());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_close_error_surfaces_only_when_body_passed() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new();
        session.fail_close();
        let report = runner(&session, dir.path())
            .run("events", |_| pass())
            .await;
        assert!(matches!(report.result, Err(HarnessError::SessionUnavailable { .. })));

        let session = MockSession::new();
        session.fail_close();
        let report = runner(&session, dir.path())
            .run("events", |_| {
                fail(HarnessError::ScriptError {
                    message: "boom".into(),
                })
            })
            .await;
        assert!(matches!(report.result, Err(HarnessError::ScriptError { .. })));
    }

    #[tokio::test]
    async fn test_open_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScenarioRunner::new(MockSessionFactory::unreachable(), dir.path());
        let report = runner.run("events", |_| pass()).await;
        assert!(!report.passed());
        assert!(report.into_result().is_err());
    }
}
