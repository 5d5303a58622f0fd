//! Page flows for the ticketing site.
//!
//! A flow owns the locators of one screen and turns them into
//! intention-revealing operations. Probes answer `bool`; actions fail with a
//! [`HarnessError`](crate::HarnessError) naming the logical target.

pub mod event;
pub mod login;
pub mod movie;

pub use event::{EventFlow, EventLocators};
pub use login::{ClearMethod, LoginFlow, LoginLocators, LoginState};
pub use movie::{MovieFlow, MovieLocators};

use crate::driver::{BrowserSession, ElementHandle};
use crate::locator::Locator;
use crate::result::HarnessResult;
use crate::wait::{SynchronizedResolver, WaitPolicy};

/// A screen of the site driven through one browser session
pub trait PageFlow {
    /// Name used in logs and errors
    fn page_name(&self) -> &'static str;

    /// Substring of the URL this screen lives on, empty when any URL will do
    fn url_fragment(&self) -> &str {
        ""
    }
}

/// Wait for `locator` under `policy` and hand back the element, or fail
/// naming `target`
pub(crate) async fn require<S: BrowserSession + ?Sized>(
    session: &S,
    locator: &Locator,
    policy: &WaitPolicy,
    target: &str,
) -> HarnessResult<ElementHandle> {
    SynchronizedResolver::new(session)
        .resolve(locator, policy)
        .await?
        .require_element(target)
}

/// Wait until `locator` is clickable, then click it
pub(crate) async fn click<S: BrowserSession + ?Sized>(
    session: &S,
    locator: &Locator,
    policy: &WaitPolicy,
    target: &str,
) -> HarnessResult<()> {
    let element = require(session, locator, policy, target).await?;
    session.click(&element).await
}

/// Whether `locator` satisfies `policy` before it times out
pub(crate) async fn probe<S: BrowserSession + ?Sized>(
    session: &S,
    locator: &Locator,
    policy: &WaitPolicy,
) -> HarnessResult<bool> {
    Ok(SynchronizedResolver::new(session)
        .resolve(locator, policy)
        .await?
        .is_success())
}
