//! Wait policies and the synchronized resolver.
//!
//! A [`WaitPolicy`] names a condition and a time budget. The
//! [`SynchronizedResolver`] evaluates the condition against a [`Locator`] or
//! an [`ElementHandle`] at the policy's poll cadence, suspending on the tokio
//! timer between probes, until the condition holds or the budget runs out.
//!
//! ```text
//!   t=0      t=poll    t=2*poll   ...   t=timeout
//!    │         │          │                 │
//!  probe ─▶ sleep ─▶ probe ─▶ sleep ─▶ ... probe ─▶ Timeout
//!    └── true ─▶ Success (no extra wait)
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::driver::{BrowserSession, ElementHandle};
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (20 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

// =============================================================================
// WAIT CONDITION
// =============================================================================

/// Condition a wait is satisfied by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WaitCondition {
    /// Exists, non-zero rendered size, not styled hidden
    Visible,
    /// Visible, enabled, and the hit-test target at its center
    Clickable,
    /// Attached to the document
    Present,
    /// Absent, or present but not visible
    Invisible,
    /// Active window URL contains the substring
    UrlContains(String),
}

impl WaitCondition {
    /// Short name used in logs and errors
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Clickable => "clickable",
            Self::Present => "present",
            Self::Invisible => "invisible",
            Self::UrlContains(_) => "url-contains",
        }
    }

    /// Whether success hands back an element
    #[must_use]
    pub const fn yields_element(&self) -> bool {
        matches!(self, Self::Visible | Self::Clickable | Self::Present)
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlContains(fragment) => write!(f, "url containing {fragment:?}"),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timeout, poll cadence and condition for one wait.
///
/// Always valid once constructed: `timeout_ms > 0`, `poll_interval_ms > 0`
/// and `poll_interval_ms < timeout_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout_ms: u64,
    poll_interval_ms: u64,
    condition: WaitCondition,
}

impl WaitPolicy {
    /// Policy with an explicit poll interval
    pub fn new(
        condition: WaitCondition,
        timeout_ms: u64,
        poll_interval_ms: u64,
    ) -> HarnessResult<Self> {
        if timeout_ms == 0 {
            return Err(HarnessError::invalid_configuration(
                "wait timeout must be greater than zero",
            ));
        }
        if poll_interval_ms == 0 {
            return Err(HarnessError::invalid_configuration(
                "poll interval must be greater than zero",
            ));
        }
        if poll_interval_ms >= timeout_ms {
            return Err(HarnessError::invalid_configuration(format!(
                "poll interval {poll_interval_ms}ms must be shorter than timeout {timeout_ms}ms"
            )));
        }
        if let WaitCondition::UrlContains(fragment) = &condition {
            if fragment.is_empty() {
                return Err(HarnessError::invalid_configuration(
                    "url-contains condition needs a non-empty substring",
                ));
            }
        }
        Ok(Self {
            timeout_ms,
            poll_interval_ms,
            condition,
        })
    }

    /// Policy with the default poll interval, shortened to a quarter of the
    /// timeout when the timeout is not longer than the default interval
    pub fn with_timeout(condition: WaitCondition, timeout_ms: u64) -> HarnessResult<Self> {
        let poll = if timeout_ms > DEFAULT_POLL_INTERVAL_MS {
            DEFAULT_POLL_INTERVAL_MS
        } else {
            (timeout_ms / 4).max(1)
        };
        Self::new(condition, timeout_ms, poll)
    }

    /// `Visible` with the default poll interval
    pub fn visible(timeout_ms: u64) -> HarnessResult<Self> {
        Self::with_timeout(WaitCondition::Visible, timeout_ms)
    }

    /// `Clickable` with the default poll interval
    pub fn clickable(timeout_ms: u64) -> HarnessResult<Self> {
        Self::with_timeout(WaitCondition::Clickable, timeout_ms)
    }

    /// `Present` with the default poll interval
    pub fn present(timeout_ms: u64) -> HarnessResult<Self> {
        Self::with_timeout(WaitCondition::Present, timeout_ms)
    }

    /// `Invisible` with the default poll interval
    pub fn invisible(timeout_ms: u64) -> HarnessResult<Self> {
        Self::with_timeout(WaitCondition::Invisible, timeout_ms)
    }

    /// `UrlContains` with the default poll interval
    pub fn url_contains(fragment: impl Into<String>, timeout_ms: u64) -> HarnessResult<Self> {
        Self::with_timeout(WaitCondition::UrlContains(fragment.into()), timeout_ms)
    }

    /// Same timing, different condition
    pub fn with_condition(&self, condition: WaitCondition) -> HarnessResult<Self> {
        Self::new(condition, self.timeout_ms, self.poll_interval_ms)
    }

    /// Timeout in milliseconds
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Poll interval in milliseconds
    #[must_use]
    pub const fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    /// Timeout as a duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Condition waited for
    #[must_use]
    pub const fn condition(&self) -> &WaitCondition {
        &self.condition
    }
}

// =============================================================================
// RESOLUTION OUTCOME
// =============================================================================

/// Result of one resolution call
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// The condition held
    Success {
        /// Satisfying element, `None` for `Invisible` and `UrlContains`
        element: Option<ElementHandle>,
        /// Index of the candidate that succeeded (0 for single resolves)
        strategy_index: usize,
        /// Time spent
        elapsed: Duration,
    },
    /// The budget ran out
    Timeout {
        /// Locator probed last, if the target was a locator
        last_attempted: Option<Locator>,
        /// Condition waited for
        condition: WaitCondition,
        /// Time spent
        elapsed: Duration,
    },
    /// Every fallback candidate failed
    NotFound {
        /// Every locator tried, in order
        attempted: Vec<Locator>,
    },
}

impl ResolutionOutcome {
    /// Whether the condition held
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Satisfying element
    #[must_use]
    pub const fn element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Success { element, .. } => element.as_ref(),
            _ => None,
        }
    }

    /// Candidate index that succeeded
    #[must_use]
    pub const fn strategy_index(&self) -> Option<usize> {
        match self {
            Self::Success { strategy_index, .. } => Some(*strategy_index),
            _ => None,
        }
    }

    /// Time spent, `None` for `NotFound`
    #[must_use]
    pub const fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::Success { elapsed, .. } | Self::Timeout { elapsed, .. } => Some(*elapsed),
            Self::NotFound { .. } => None,
        }
    }

    /// Convert a failure outcome into an error naming `target`
    pub fn require(self, target: &str) -> HarnessResult<Option<ElementHandle>> {
        match self {
            Self::Success { element, .. } => Ok(element),
            Self::Timeout {
                condition, elapsed, ..
            } => Err(HarnessError::Timeout {
                target: target.to_string(),
                condition: condition.to_string(),
                ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            }),
            Self::NotFound { attempted } => Err(HarnessError::NotFound {
                target: target.to_string(),
                attempted: attempted.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Like [`require`](Self::require) but demands an element
    pub fn require_element(self, target: &str) -> HarnessResult<ElementHandle> {
        self.require(target)?.ok_or_else(|| {
            HarnessError::invalid_configuration(format!(
                "{target}: wait condition does not yield an element"
            ))
        })
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// What a resolve call evaluates its condition against
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Re-evaluated on every probe
    Locator(&'a Locator),
    /// An element already in hand
    Element(&'a ElementHandle),
}

impl<'a> From<&'a Locator> for Target<'a> {
    fn from(locator: &'a Locator) -> Self {
        Self::Locator(locator)
    }
}

impl<'a> From<&'a ElementHandle> for Target<'a> {
    fn from(element: &'a ElementHandle) -> Self {
        Self::Element(element)
    }
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locator(locator) => write!(f, "{locator}"),
            Self::Element(element) => write!(f, "element {element}"),
        }
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

/// Result of [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled<T> {
    /// The probe produced a value
    Ready {
        /// Value produced
        value: T,
        /// Time spent
        elapsed: Duration,
    },
    /// The budget ran out
    TimedOut {
        /// Time spent
        elapsed: Duration,
    },
}

/// Run `probe` every `poll_interval` until it yields `Some` or `timeout`
/// has elapsed.
///
/// The final sleep is clamped so the last probe happens at the deadline.
/// Non-fatal probe errors count as "not yet"; fatal ones are returned.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    mut probe: F,
) -> HarnessResult<Polled<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Option<T>>>,
{
    let start = Instant::now();
    loop {
        match probe().await {
            Ok(Some(value)) => {
                return Ok(Polled::Ready {
                    value,
                    elapsed: start.elapsed(),
                })
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!(error = %e, "probe failed, treating as unsatisfied"),
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(Polled::TimedOut { elapsed });
        }
        sleep(poll_interval.min(timeout - elapsed)).await;
    }
}

// =============================================================================
// SYNCHRONIZED RESOLVER
// =============================================================================

/// What a satisfied probe hands back
enum Satisfied {
    Element(ElementHandle),
    Condition,
}

impl Satisfied {
    fn into_element(self) -> Option<ElementHandle> {
        match self {
            Self::Element(element) => Some(element),
            Self::Condition => None,
        }
    }
}

/// Applies wait policies to locators and element handles
pub struct SynchronizedResolver<'s, S: BrowserSession + ?Sized> {
    session: &'s S,
}

impl<S: BrowserSession + ?Sized> fmt::Debug for SynchronizedResolver<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizedResolver").finish_non_exhaustive()
    }
}

impl<'s, S: BrowserSession + ?Sized> SynchronizedResolver<'s, S> {
    /// Resolver over `session`
    #[must_use]
    pub const fn new(session: &'s S) -> Self {
        Self { session }
    }

    /// Wait until `policy`'s condition holds for `target`.
    ///
    /// `Timeout` is an outcome, not an error. Only fatal session errors are
    /// returned as `Err`.
    pub async fn resolve<'t>(
        &self,
        target: impl Into<Target<'t>>,
        policy: &WaitPolicy,
    ) -> HarnessResult<ResolutionOutcome> {
        let target = target.into();
        if let Target::Locator(locator) = target {
            locator.validate()?;
        }
        let condition = policy.condition();

        let polled = poll_until(policy.timeout(), policy.poll_interval(), move || {
            self.probe(target, condition)
        })
        .await?;

        match polled {
            Polled::Ready { value, elapsed } => {
                info!(
                    target = %target,
                    condition = %condition,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "resolved"
                );
                Ok(ResolutionOutcome::Success {
                    element: value.into_element(),
                    strategy_index: 0,
                    elapsed,
                })
            }
            Polled::TimedOut { elapsed } => {
                debug!(
                    target = %target,
                    condition = %condition,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "wait timed out"
                );
                Ok(ResolutionOutcome::Timeout {
                    last_attempted: match target {
                        Target::Locator(locator) => Some(locator.clone()),
                        Target::Element(_) => None,
                    },
                    condition: condition.clone(),
                    elapsed,
                })
            }
        }
    }

    /// Evaluate `condition` once without waiting
    pub async fn check_now<'t>(
        &self,
        target: impl Into<Target<'t>>,
        condition: &WaitCondition,
    ) -> HarnessResult<bool> {
        match self.probe(target.into(), condition).await {
            Ok(found) => Ok(found.is_some()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(error = %e, "immediate check failed");
                Ok(false)
            }
        }
    }

    async fn probe(
        &self,
        target: Target<'_>,
        condition: &WaitCondition,
    ) -> HarnessResult<Option<Satisfied>> {
        if let WaitCondition::UrlContains(fragment) = condition {
            let url = self.session.current_url().await?;
            return Ok(url.contains(fragment.as_str()).then_some(Satisfied::Condition));
        }

        match target {
            Target::Locator(locator) => {
                let matches = self.session.find_all(locator).await?;
                if *condition == WaitCondition::Invisible {
                    for element in &matches {
                        if self.is_visible_quiet(element).await? {
                            return Ok(None);
                        }
                    }
                    return Ok(Some(Satisfied::Condition));
                }
                for element in matches {
                    match self.holds(&element, condition).await {
                        Ok(true) => return Ok(Some(Satisfied::Element(element))),
                        Ok(false) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => debug!(element = %element, error = %e, "skipping match"),
                    }
                }
                Ok(None)
            }
            Target::Element(element) => {
                if *condition == WaitCondition::Invisible {
                    return Ok((!self.is_visible_quiet(element).await?)
                        .then_some(Satisfied::Condition));
                }
                Ok(self
                    .holds(element, condition)
                    .await?
                    .then(|| Satisfied::Element(element.clone())))
            }
        }
    }

    async fn holds(&self, element: &ElementHandle, condition: &WaitCondition) -> HarnessResult<bool> {
        match condition {
            WaitCondition::Visible => self.is_visible(element).await,
            WaitCondition::Clickable => self.is_clickable(element).await,
            WaitCondition::Present => self.session.is_attached(element).await,
            WaitCondition::Invisible => Ok(!self.is_visible_quiet(element).await?),
            WaitCondition::UrlContains(_) => Ok(false),
        }
    }

    async fn is_visible(&self, element: &ElementHandle) -> HarnessResult<bool> {
        if !self.session.is_displayed(element).await? {
            return Ok(false);
        }
        Ok(self
            .session
            .bounding_box(element)
            .await?
            .is_some_and(|bbox| bbox.has_area()))
    }

    /// Visibility where a stale or detached element counts as not visible
    async fn is_visible_quiet(&self, element: &ElementHandle) -> HarnessResult<bool> {
        match self.is_visible(element).await {
            Ok(visible) => Ok(visible),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => Ok(false),
        }
    }

    async fn is_clickable(&self, element: &ElementHandle) -> HarnessResult<bool> {
        if !self.session.is_displayed(element).await? || !self.session.is_enabled(element).await? {
            return Ok(false);
        }
        match self.session.bounding_box(element).await? {
            Some(bbox) if bbox.has_area() => self.session.hit_test(element, bbox.center()).await,
            _ => Ok(false),
        }
    }
}
