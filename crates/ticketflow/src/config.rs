//! Harness configuration.
//!
//! Loaded from YAML with every field defaulted, then overlaid with
//! `TICKETFLOW_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::result::{HarnessError, HarnessResult};
use crate::wait::{WaitCondition, WaitPolicy};

/// Environment variable overriding `base_url`
pub const ENV_BASE_URL: &str = "TICKETFLOW_BASE_URL";
/// Environment variable overriding `browser`
pub const ENV_BROWSER: &str = "TICKETFLOW_BROWSER";
/// Environment variable overriding `headless`
pub const ENV_HEADLESS: &str = "TICKETFLOW_HEADLESS";

/// Browser family to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Google Chrome
    #[default]
    Chrome,
    /// Chromium
    Chromium,
    /// Microsoft Edge
    Edge,
}

impl BrowserKind {
    /// Executable names probed when no explicit path is configured
    #[must_use]
    pub const fn executable_candidates(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            Self::Chromium => &["chromium", "chromium-browser"],
            Self::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chrome => "chrome",
            Self::Chromium => "chromium",
            Self::Edge => "edge",
        })
    }
}

impl FromStr for BrowserKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "chromium" => Ok(Self::Chromium),
            "edge" | "msedge" => Ok(Self::Edge),
            other => Err(HarnessError::invalid_configuration(format!(
                "unsupported browser '{other}' (expected chrome, chromium or edge)"
            ))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Browser window size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
        }
    }
}

/// Timeout magnitudes used by the page flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Single-locator waits
    pub default_ms: u64,
    /// Each fallback candidate
    pub candidate_ms: u64,
    /// Poll cadence
    pub poll_interval_ms: u64,
    /// Waits that span a page load
    pub page_load_ms: u64,
    /// Waiting for a new window after a click
    pub window_switch_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_ms: 10_000,
            candidate_ms: 2_000,
            poll_interval_ms: 500,
            page_load_ms: 30_000,
            window_switch_ms: 3_000,
        }
    }
}

impl Timeouts {
    /// Policy for `condition` with `timeout_ms`, using the configured poll
    /// interval unless it is not shorter than the timeout
    pub fn policy(&self, condition: WaitCondition, timeout_ms: u64) -> HarnessResult<WaitPolicy> {
        if self.poll_interval_ms < timeout_ms {
            WaitPolicy::new(condition, timeout_ms, self.poll_interval_ms)
        } else {
            WaitPolicy::with_timeout(condition, timeout_ms)
        }
    }

    /// Policy with the default timeout
    pub fn default_policy(&self, condition: WaitCondition) -> HarnessResult<WaitPolicy> {
        self.policy(condition, self.default_ms)
    }

    /// Policy with the per-candidate timeout
    pub fn candidate_policy(&self, condition: WaitCondition) -> HarnessResult<WaitPolicy> {
        self.policy(condition, self.candidate_ms)
    }

    /// Policy with the page-load timeout
    pub fn page_load_policy(&self, condition: WaitCondition) -> HarnessResult<WaitPolicy> {
        self.policy(condition, self.page_load_ms)
    }

    /// Reject magnitudes that cannot form a valid policy
    pub fn validate(&self) -> HarnessResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::invalid_configuration(
                "timeouts.poll_interval_ms must be greater than zero",
            ));
        }
        for (name, value) in [
            ("default_ms", self.default_ms),
            ("candidate_ms", self.candidate_ms),
            ("page_load_ms", self.page_load_ms),
            ("window_switch_ms", self.window_switch_ms),
        ] {
            if value < 2 {
                return Err(HarnessError::invalid_configuration(format!(
                    "timeouts.{name} must be at least 2ms, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Site root
    pub base_url: String,
    /// Events listing path, joined onto `base_url`
    pub events_path: String,
    /// Browser family
    pub browser: BrowserKind,
    /// Explicit browser executable
    pub executable_path: Option<PathBuf>,
    /// Run without a visible window
    pub headless: bool,
    /// Window size
    pub viewport: Viewport,
    /// Where failure screenshots go
    pub artifacts_dir: PathBuf,
    /// `EnvFilter` directive
    pub log_filter: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Wait magnitudes
    pub timeouts: Timeouts,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "https://in.bookmyshow.com/".to_string(),
            events_path: "explore/events".to_string(),
            browser: BrowserKind::Chrome,
            executable_path: None,
            headless: true,
            viewport: Viewport::default(),
            artifacts_dir: PathBuf::from("target/ticketflow-artifacts"),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            timeouts: Timeouts::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse YAML; missing fields take their defaults
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> HarnessResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Overlay `TICKETFLOW_*` variables from the process environment
    pub fn apply_env(self) -> HarnessResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup`
    pub fn apply_overrides<F>(mut self, lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(browser) = lookup(ENV_BROWSER) {
            self.browser = browser.parse()?;
        }
        if let Some(headless) = lookup(ENV_HEADLESS) {
            self.headless = parse_bool(ENV_HEADLESS, &headless)?;
        }
        Ok(self)
    }

    /// Check the configuration before anything is launched
    pub fn validate(&self) -> HarnessResult<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(HarnessError::invalid_configuration("base_url must not be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(HarnessError::invalid_configuration(format!(
                "base_url '{base}' must be an http(s) URL"
            )));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(HarnessError::invalid_configuration(
                "viewport dimensions must be non-zero",
            ));
        }
        self.timeouts.validate()
    }

    /// `base_url` joined with `path`
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Events listing URL
    #[must_use]
    pub fn events_url(&self) -> String {
        self.url_for(&self.events_path)
    }
}

fn parse_bool(key: &str, value: &str) -> HarnessResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HarnessError::invalid_configuration(format!(
            "{key}: '{other}' is not a boolean"
        ))),
    }
}
