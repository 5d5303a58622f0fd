//! Ticketflow: resilient element resolution for ticketing-site browser tests
//!
//! Pages on the ticketing site render late, shift their markup between
//! releases and open details in new tabs. Ticketflow keeps the tests that
//! drive them readable by separating three layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    TICKETFLOW Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ PageFlow   │    │ Fallback   │    │ Synchron-  │            │
//! │   │ login /    │───►│ Chain      │───►│ ized       │            │
//! │   │ movie /    │    │ Resolver   │    │ Resolver   │            │
//! │   │ event      │    │            │    │ WaitPolicy │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │                   │
//! │                                   ┌─────────▼─────────┐         │
//! │                                   │  BrowserSession   │         │
//! │                                   │  Chromium | Mock  │         │
//! │                                   └───────────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ticketflow::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> HarnessResult<()> {
//! let session = MockSession::new();
//! let button = Locator::text("Continue").with_tag("button");
//! session.add_element(MockElement::new("continue").matching(button.clone()));
//!
//! let policy = WaitPolicy::clickable(2_000)?;
//! let outcome = SynchronizedResolver::new(&session).resolve(&button, &policy).await?;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Chromium backend over CDP
#[cfg(feature = "browser")]
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::significant_drop_tightening
)]
pub mod browser;

/// Harness configuration and timeout magnitudes
#[allow(clippy::missing_errors_doc)]
pub mod config;

/// Session abstraction the resolvers drive
pub mod driver;

/// Ordered fallback chains of locators
#[allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
pub mod fallback;

/// Login, movie and event page flows
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod flows;

/// Closed locator language
pub mod locator;

/// Tracing subscriber setup
#[allow(clippy::missing_errors_doc)]
pub mod logging;

/// Scripted in-memory session for tests and dry runs
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_panics_doc
)]
pub mod mock;

mod result;

/// Scenario lifecycle and failure screenshots
pub mod scenario;

/// Wait policies and the synchronized resolver
#[allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
pub mod wait;

pub use config::{BrowserKind, HarnessConfig, LogFormat, Timeouts, Viewport};
pub use driver::{BrowserSession, ElementHandle, SessionFactory, WindowHandle};
pub use fallback::{FallbackCandidate, FallbackChain, FallbackChainBuilder, FallbackChainResolver};
pub use locator::{BoundingBox, Locator, Point, Strategy};
pub use result::{HarnessError, HarnessResult};
pub use scenario::{ScenarioReport, ScenarioRunner};
pub use wait::{
    poll_until, Polled, ResolutionOutcome, SynchronizedResolver, Target, WaitCondition,
    WaitPolicy,
};

#[cfg(feature = "browser")]
pub use browser::{ChromiumFactory, ChromiumSession, LaunchOptions};

/// Everything a scenario body usually needs
pub mod prelude {
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::fallback::*;
    pub use super::flows::*;
    pub use super::locator::*;
    pub use super::logging::init_tracing;
    pub use super::mock::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::wait::*;

    #[cfg(feature = "browser")]
    pub use super::browser::*;
}
