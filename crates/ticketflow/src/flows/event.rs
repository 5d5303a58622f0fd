//! Events listing flow.

use std::fmt;

use super::PageFlow;
use crate::config::Timeouts;
use crate::driver::{BrowserSession, ElementHandle};
use crate::fallback::{FallbackChain, FallbackChainResolver};
use crate::locator::Locator;
use crate::result::HarnessResult;
use crate::wait::{SynchronizedResolver, WaitCondition};

/// Event card locators, tried in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLocators {
    /// First card by index attribute
    pub first_card: Locator,
    /// Card container class
    pub card_container: Locator,
    /// Any element flagged as an event card
    pub event_card: Locator,
}

impl Default for EventLocators {
    fn default() -> Self {
        Self {
            first_card: Locator::attribute("data-card-index", "0"),
            card_container: Locator::class_fragment("card-container"),
            event_card: Locator::has_attribute("data-event-card"),
        }
    }
}

/// Events listing flow over one session
pub struct EventFlow<'s, S: BrowserSession + ?Sized> {
    session: &'s mut S,
    timeouts: Timeouts,
    events_url: String,
    url_fragment: String,
    locators: EventLocators,
}

impl<S: BrowserSession + ?Sized> fmt::Debug for EventFlow<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFlow")
            .field("events_url", &self.events_url)
            .finish_non_exhaustive()
    }
}

impl<S: BrowserSession + ?Sized> PageFlow for EventFlow<'_, S> {
    fn page_name(&self) -> &'static str {
        "event flow"
    }

    fn url_fragment(&self) -> &str {
        &self.url_fragment
    }
}

impl<'s, S: BrowserSession + ?Sized> EventFlow<'s, S> {
    /// Flow for the listing at `events_url`; `url_fragment` identifies the
    /// listing in the address bar
    pub fn new(
        session: &'s mut S,
        timeouts: Timeouts,
        events_url: impl Into<String>,
        url_fragment: impl Into<String>,
    ) -> Self {
        Self {
            session,
            timeouts,
            events_url: events_url.into(),
            url_fragment: url_fragment.into(),
            locators: EventLocators::default(),
        }
    }

    /// Replace the default locators
    #[must_use]
    pub fn with_locators(mut self, locators: EventLocators) -> Self {
        self.locators = locators;
        self
    }

    /// Load the events listing
    pub async fn open_events(&mut self) -> HarnessResult<()> {
        self.session.navigate(&self.events_url).await
    }

    /// Whether the active window shows the listing
    pub async fn is_open(&self) -> HarnessResult<bool> {
        let fragment = self.url_fragment().trim_start_matches('/');
        if fragment.is_empty() {
            return Ok(true);
        }
        let policy = self
            .timeouts
            .default_policy(WaitCondition::UrlContains(fragment.to_string()))?;
        Ok(SynchronizedResolver::new(&*self.session)
            .resolve(&self.locators.first_card, &policy)
            .await?
            .is_success())
    }

    fn chain(&self) -> HarnessResult<FallbackChain> {
        let candidate = self.timeouts.candidate_policy(WaitCondition::Visible)?;
        FallbackChain::builder("event card")
            .candidate(self.locators.first_card.clone(), candidate.clone())
            .candidate(self.locators.card_container.clone(), candidate.clone())
            .candidate(self.locators.event_card.clone(), candidate)
            .build()
    }

    /// First visible event card
    pub async fn first_event_card(&self) -> HarnessResult<ElementHandle> {
        let chain = self.chain()?;
        FallbackChainResolver::new(&*self.session)
            .resolve_first_match(&chain)
            .await?
            .require_element(chain.target())
    }

    /// Whether any event card shows up
    pub async fn has_at_least_one_event(&self) -> HarnessResult<bool> {
        let chain = self.chain()?;
        FallbackChainResolver::new(&*self.session)
            .any_matches(&chain)
            .await
    }
}
