//! Ordered multi-strategy resolution for one logical target.
//!
//! Obfuscated class names drift between deployments, so flows describe a
//! target as a chain of candidate locators and take the first one that
//! resolves. A success past the first candidate still counts, but is logged
//! as a warning so the drift gets noticed.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::driver::BrowserSession;
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{ResolutionOutcome, SynchronizedResolver, WaitPolicy};

/// One `(locator, policy)` step of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackCandidate {
    /// Locator tried
    pub locator: Locator,
    /// Policy it is resolved with
    pub policy: WaitPolicy,
}

impl FallbackCandidate {
    /// Create a candidate
    #[must_use]
    pub const fn new(locator: Locator, policy: WaitPolicy) -> Self {
        Self { locator, policy }
    }
}

/// Validated, non-empty chain of candidates for a named target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    target: String,
    candidates: Vec<FallbackCandidate>,
    terminal: Option<FallbackCandidate>,
}

impl FallbackChain {
    /// Start building a chain for `target`
    #[must_use]
    pub fn builder(target: impl Into<String>) -> FallbackChainBuilder {
        FallbackChainBuilder {
            target: target.into(),
            candidates: Vec::new(),
            terminal: None,
        }
    }

    /// Logical target name
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Candidates in evaluation order, terminal last
    pub fn candidates(&self) -> impl Iterator<Item = &FallbackCandidate> {
        self.candidates.iter().chain(self.terminal.iter())
    }

    /// Number of candidates including the terminal one
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len() + usize::from(self.terminal.is_some())
    }

    /// Always false; chains are non-empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Worst-case wall time: the sum of every candidate's timeout
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        self.candidates().map(|c| c.policy.timeout()).sum()
    }
}

impl fmt::Display for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.target)?;
        for (i, candidate) in self.candidates().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", candidate.locator)?;
        }
        f.write_str("]")
    }
}

/// Builder for [`FallbackChain`]
#[derive(Debug, Clone)]
pub struct FallbackChainBuilder {
    target: String,
    candidates: Vec<FallbackCandidate>,
    terminal: Option<FallbackCandidate>,
}

impl FallbackChainBuilder {
    /// Append a candidate
    #[must_use]
    pub fn candidate(mut self, locator: Locator, policy: WaitPolicy) -> Self {
        self.candidates.push(FallbackCandidate::new(locator, policy));
        self
    }

    /// Finish with "first visible child of `container`"
    #[must_use]
    pub fn first_visible_child_of(mut self, container: &Locator, policy: WaitPolicy) -> Self {
        self.terminal = Some(FallbackCandidate::new(container.children(), policy));
        self
    }

    /// Validate and build
    pub fn build(self) -> HarnessResult<FallbackChain> {
        if self.target.trim().is_empty() {
            return Err(HarnessError::invalid_configuration(
                "fallback chain needs a target name",
            ));
        }
        if self.candidates.is_empty() && self.terminal.is_none() {
            return Err(HarnessError::invalid_configuration(format!(
                "fallback chain for {} has no candidates",
                self.target
            )));
        }
        for candidate in self.candidates.iter().chain(self.terminal.iter()) {
            candidate.locator.validate()?;
            if !candidate.policy.condition().yields_element() {
                return Err(HarnessError::invalid_configuration(format!(
                    "fallback candidate {} for {} waits for {}, which yields no element",
                    candidate.locator,
                    self.target,
                    candidate.policy.condition()
                )));
            }
        }
        Ok(FallbackChain {
            target: self.target,
            candidates: self.candidates,
            terminal: self.terminal,
        })
    }
}

/// Resolves chains through a [`SynchronizedResolver`]
pub struct FallbackChainResolver<'s, S: BrowserSession + ?Sized> {
    resolver: SynchronizedResolver<'s, S>,
}

impl<S: BrowserSession + ?Sized> fmt::Debug for FallbackChainResolver<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChainResolver").finish_non_exhaustive()
    }
}

impl<'s, S: BrowserSession + ?Sized> FallbackChainResolver<'s, S> {
    /// Resolver over `session`
    #[must_use]
    pub const fn new(session: &'s S) -> Self {
        Self {
            resolver: SynchronizedResolver::new(session),
        }
    }

    /// Try each candidate in order, stopping at the first success.
    ///
    /// Returns `NotFound` listing every locator when all of them fail.
    /// `elapsed` on success covers the whole chain.
    pub async fn resolve_first_match(
        &self,
        chain: &FallbackChain,
    ) -> HarnessResult<ResolutionOutcome> {
        let start = Instant::now();
        let mut attempted = Vec::with_capacity(chain.len());

        for (index, candidate) in chain.candidates().enumerate() {
            attempted.push(candidate.locator.clone());
            let outcome = self
                .resolver
                .resolve(&candidate.locator, &candidate.policy)
                .await?;

            match outcome {
                ResolutionOutcome::Success { element, .. } => {
                    if index > 0 {
                        warn!(
                            target_name = chain.target(),
                            strategy_index = index,
                            locator = %candidate.locator,
                            "resolved through fallback candidate, primary locator may have drifted"
                        );
                    }
                    return Ok(ResolutionOutcome::Success {
                        element,
                        strategy_index: index,
                        elapsed: start.elapsed(),
                    });
                }
                other => debug!(
                    target_name = chain.target(),
                    strategy_index = index,
                    locator = %candidate.locator,
                    outcome = ?other,
                    "fallback candidate failed"
                ),
            }
        }

        Ok(ResolutionOutcome::NotFound { attempted })
    }

    /// Whether any candidate resolves
    pub async fn any_matches(&self, chain: &FallbackChain) -> HarnessResult<bool> {
        Ok(self.resolve_first_match(chain).await?.is_success())
    }
}
