//! Login-by-mobile flow.
//!
//! ```text
//! CityUnselected ─select_city─▶ CitySelected ─go_to_login_page─▶ LoginPanelOpen
//!                                    ▲                                 │
//!                          close_login_popup              enter_mobile_number
//!                                    │                                 ▼
//!                                    └──────────────────────────  MobileEntered
//!                                                                      │ probes
//!                                              ┌───────────────────────┴──────┐
//!                                              ▼                              ▼
//!                                       OtpPromptVisible                 ErrorShown
//! ```
//!
//! Calling an operation from a state it is not defined for is an
//! `InvalidState` error and touches nothing in the browser.

use std::fmt;

use tracing::{debug, info, warn};

use super::{click, probe, require, PageFlow};
use crate::config::Timeouts;
use crate::driver::{BrowserSession, ElementHandle, FORCE_CLEAR_SCRIPT};
use crate::fallback::{FallbackChain, FallbackChainResolver};
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{SynchronizedResolver, WaitCondition};

/// Where the login flow stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginState {
    /// No city chosen yet
    CityUnselected,
    /// City chosen, login panel closed
    CitySelected,
    /// Login panel open, mobile field empty
    LoginPanelOpen,
    /// Mobile number typed
    MobileEntered,
    /// OTP input shown
    OtpPromptVisible,
    /// Validation error shown
    ErrorShown,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CityUnselected => "city unselected",
            Self::CitySelected => "city selected",
            Self::LoginPanelOpen => "login panel open",
            Self::MobileEntered => "mobile entered",
            Self::OtpPromptVisible => "OTP prompt visible",
            Self::ErrorShown => "error shown",
        })
    }
}

/// Which clear path `enter_mobile_number` took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMethod {
    /// The interactive clear emptied the field
    Interactive,
    /// Script-level clear after the interactive one failed or left residue
    Forced,
}

/// Locators of the city picker and login popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLocators {
    /// City search input
    pub city_search: Locator,
    /// First suggestion in the city list
    pub city_suggestion: Locator,
    /// Any suggestion row, used as the last resort
    pub generic_suggestion: Locator,
    /// Header sign-in control
    pub sign_in: Locator,
    /// Mobile number input
    pub mobile_field: Locator,
    /// Continue button in any state
    pub continue_button: Locator,
    /// Continue button while disabled
    pub continue_disabled: Locator,
    /// Continue button while enabled
    pub continue_enabled: Locator,
    /// OTP digit inputs
    pub otp_input: Locator,
    /// Invalid number message
    pub error_message: Locator,
    /// Popup close control
    pub close_popup: Locator,
    /// Popup back control
    pub back_button: Locator,
}

impl Default for LoginLocators {
    fn default() -> Self {
        Self {
            city_search: Locator::attribute("placeholder", "Search for your city").with_tag("input"),
            city_suggestion: Locator::class_fragment("sc-fv93km-0")
                .with_tag("div")
                .with_descendant("//div[1]//div[1]"),
            generic_suggestion: Locator::class_fragment("sc-")
                .with_tag("div")
                .with_descendant("//div[1]"),
            sign_in: Locator::exact_text("Sign in").with_tag("div"),
            mobile_field: Locator::attribute("id", "userMobileNumber"),
            continue_button: Locator::exact_text("Continue").with_tag("div"),
            continue_disabled: Locator::path(
                "//div[normalize-space()='Continue' and (@aria-disabled='true' \
                 or contains(@class,'disabled') or contains(@class,'Disabled') \
                 or contains(@class,'isDisabled'))]",
            ),
            continue_enabled: Locator::path(
                "//div[normalize-space()='Continue' and not(@aria-disabled='true')]",
            ),
            otp_input: Locator::attribute("type", "tel").with_tag("input"),
            error_message: Locator::exact_text("Invalid mobile number").with_tag("div"),
            close_popup: Locator::class_fragment("sc-1ydq0aj-6").with_tag("div"),
            back_button: Locator::class_fragment("sc-1ydq0aj-0").with_tag("div"),
        }
    }
}

impl LoginLocators {
    /// Text candidate for a city name
    #[must_use]
    pub fn city_by_name(name: &str) -> Locator {
        Locator::text(name).with_tag("div")
    }
}

/// Login-by-mobile flow over one session
pub struct LoginFlow<'s, S: BrowserSession + ?Sized> {
    session: &'s mut S,
    timeouts: Timeouts,
    locators: LoginLocators,
    state: LoginState,
}

impl<S: BrowserSession + ?Sized> fmt::Debug for LoginFlow<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginFlow")
            .field("state", &self.state)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<S: BrowserSession + ?Sized> PageFlow for LoginFlow<'_, S> {
    fn page_name(&self) -> &'static str {
        "login flow"
    }
}

impl<'s, S: BrowserSession + ?Sized> LoginFlow<'s, S> {
    /// Flow starting in `CityUnselected`
    pub fn new(session: &'s mut S, timeouts: Timeouts) -> Self {
        Self {
            session,
            timeouts,
            locators: LoginLocators::default(),
            state: LoginState::CityUnselected,
        }
    }

    /// Replace the default locators
    #[must_use]
    pub fn with_locators(mut self, locators: LoginLocators) -> Self {
        self.locators = locators;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> LoginState {
        self.state
    }

    /// Locators in use
    #[must_use]
    pub const fn locators(&self) -> &LoginLocators {
        &self.locators
    }

    fn guard(&self, operation: &str, allowed: &[LoginState]) -> HarnessResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(HarnessError::InvalidState {
                flow: self.page_name().to_string(),
                operation: operation.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    /// Load `url` and start over from `CityUnselected`
    pub async fn open(&mut self, url: &str) -> HarnessResult<()> {
        self.session.navigate(url).await?;
        self.state = LoginState::CityUnselected;
        Ok(())
    }

    /// Replace the city search text with `name` and click a suggestion.
    ///
    /// Returns the index of the candidate that matched. On failure the flow
    /// stays in `CityUnselected`.
    pub async fn select_city(&mut self, name: &str) -> HarnessResult<usize> {
        self.guard("select a city", &[LoginState::CityUnselected])?;
        let session = &*self.session;
        let visible = self.timeouts.default_policy(WaitCondition::Visible)?;
        let candidate = self.timeouts.candidate_policy(WaitCondition::Visible)?;

        let chain = FallbackChain::builder(format!("city suggestion for {name}"))
            .candidate(self.locators.city_suggestion.clone(), candidate.clone())
            .candidate(LoginLocators::city_by_name(name), candidate.clone())
            .candidate(self.locators.generic_suggestion.clone(), candidate)
            .build()?;

        let search = require(session, &self.locators.city_search, &visible, "city search box").await?;
        clear_field(session, &search).await?;
        session.type_text(&search, name).await?;

        let outcome = FallbackChainResolver::new(session)
            .resolve_first_match(&chain)
            .await?;
        let index = outcome.strategy_index().unwrap_or_default();
        let suggestion = outcome.require_element(chain.target())?;

        let clickable = self.timeouts.default_policy(WaitCondition::Clickable)?;
        let suggestion = SynchronizedResolver::new(session)
            .resolve(&suggestion, &clickable)
            .await?
            .require_element(chain.target())?;
        session.click(&suggestion).await?;

        info!(city = name, strategy_index = index, "city selected");
        self.state = LoginState::CitySelected;
        Ok(index)
    }

    /// Open the login panel
    pub async fn go_to_login_page(&mut self) -> HarnessResult<()> {
        self.guard("open the login panel", &[LoginState::CitySelected])?;
        let policy = self.timeouts.default_policy(WaitCondition::Clickable)?;
        click(&*self.session, &self.locators.sign_in, &policy, "sign-in button").await?;
        self.state = LoginState::LoginPanelOpen;
        Ok(())
    }

    /// Replace the mobile field's contents with `value`
    pub async fn enter_mobile_number(&mut self, value: &str) -> HarnessResult<ClearMethod> {
        self.guard(
            "enter a mobile number",
            &[LoginState::LoginPanelOpen, LoginState::MobileEntered],
        )?;
        let session = &*self.session;
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        let field = require(session, &self.locators.mobile_field, &policy, "mobile number field").await?;

        let method = clear_field(session, &field).await?;
        session.type_text(&field, value).await?;
        self.state = LoginState::MobileEntered;
        Ok(method)
    }

    /// Submit the mobile number
    pub async fn click_continue(&mut self) -> HarnessResult<()> {
        self.guard("click continue", &[LoginState::MobileEntered])?;
        let policy = self.timeouts.default_policy(WaitCondition::Clickable)?;
        click(&*self.session, &self.locators.continue_button, &policy, "continue button").await
    }

    /// Whether the OTP prompt appeared
    pub async fn verify_otp_box_visible(&mut self) -> HarnessResult<bool> {
        self.guard(
            "check for the OTP prompt",
            &[LoginState::MobileEntered, LoginState::OtpPromptVisible],
        )?;
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        let visible = probe(&*self.session, &self.locators.otp_input, &policy).await?;
        if visible {
            self.state = LoginState::OtpPromptVisible;
        }
        Ok(visible)
    }

    /// Text of the invalid-number message, `None` when it never shows
    pub async fn error_message(&mut self) -> HarnessResult<Option<String>> {
        self.guard(
            "read the error message",
            &[LoginState::MobileEntered, LoginState::ErrorShown],
        )?;
        let session = &*self.session;
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        let outcome = SynchronizedResolver::new(session)
            .resolve(&self.locators.error_message, &policy)
            .await?;
        let Some(element) = outcome.element() else {
            return Ok(None);
        };
        let text = session.text(element).await?;
        self.state = LoginState::ErrorShown;
        Ok(Some(text.trim().to_string()))
    }

    /// Leave the OTP or error screen for the mobile entry screen
    pub async fn back_to_login(&mut self) -> HarnessResult<()> {
        self.guard(
            "go back to the login panel",
            &[LoginState::OtpPromptVisible, LoginState::ErrorShown],
        )?;
        let policy = self.timeouts.default_policy(WaitCondition::Clickable)?;
        click(&*self.session, &self.locators.back_button, &policy, "popup back button").await?;
        self.state = LoginState::LoginPanelOpen;
        Ok(())
    }

    /// Dismiss the login popup
    pub async fn close_login_popup(&mut self) -> HarnessResult<()> {
        self.guard(
            "close the login popup",
            &[
                LoginState::LoginPanelOpen,
                LoginState::MobileEntered,
                LoginState::OtpPromptVisible,
                LoginState::ErrorShown,
            ],
        )?;
        let policy = self.timeouts.default_policy(WaitCondition::Clickable)?;
        click(&*self.session, &self.locators.close_popup, &policy, "popup close button").await?;
        self.state = LoginState::CitySelected;
        Ok(())
    }

    /// Whether the mobile number field shows up
    pub async fn is_mobile_number_field_visible(&self) -> HarnessResult<bool> {
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        probe(&*self.session, &self.locators.mobile_field, &policy).await
    }

    /// Whether the Continue button is visible right now
    pub async fn is_continue_button_visible(&self) -> HarnessResult<bool> {
        SynchronizedResolver::new(&*self.session)
            .check_now(&self.locators.continue_button, &WaitCondition::Visible)
            .await
    }

    /// Whether the disabled Continue variant shows up
    pub async fn is_continue_button_disabled(&self) -> HarnessResult<bool> {
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        probe(&*self.session, &self.locators.continue_disabled, &policy).await
    }

    /// Whether the enabled Continue variant shows up
    pub async fn is_continue_button_enabled(&self) -> HarnessResult<bool> {
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        probe(&*self.session, &self.locators.continue_enabled, &policy).await
    }
}

/// Empty an input, falling back to [`FORCE_CLEAR_SCRIPT`] when the
/// interactive clear errors or leaves text behind
async fn clear_field<S: BrowserSession + ?Sized>(
    session: &S,
    field: &ElementHandle,
) -> HarnessResult<ClearMethod> {
    let method = match session.clear(field).await {
        Ok(()) if session.value(field).await?.is_empty() => ClearMethod::Interactive,
        Ok(()) => {
            debug!(field = %field, "interactive clear left a value behind");
            ClearMethod::Forced
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            debug!(field = %field, error = %e, "interactive clear failed");
            ClearMethod::Forced
        }
    };
    if method == ClearMethod::Forced {
        warn!(field = %field, "falling back to script-level clear");
        session
            .run_script(FORCE_CLEAR_SCRIPT, std::slice::from_ref(field))
            .await?;
    }
    Ok(method)
}
