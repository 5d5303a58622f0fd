//! Scenario bodies wiring the page flows end to end.

use futures::future::BoxFuture;
use tracing::{debug, info};

use ticketflow::flows::{EventFlow, LoginFlow, LoginState, MovieFlow, PageFlow};
use ticketflow::{
    BrowserSession, HarnessConfig, HarnessError, HarnessResult, ScenarioReport, ScenarioRunner,
    SessionFactory,
};

use crate::commands::ScenarioName;

/// Inputs shared by every scenario of a run
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    /// Resolved harness configuration
    pub config: HarnessConfig,
    /// City picked before logging in
    pub city: String,
    /// Mobile number that must be rejected
    pub mobile: String,
}

/// Run one named scenario through `runner`
pub async fn run_scenario<F: SessionFactory>(
    runner: &ScenarioRunner<F>,
    name: ScenarioName,
    settings: &ScenarioSettings,
) -> ScenarioReport {
    let settings = settings.clone();
    runner
        .run(name.as_str(), move |session| body(name, session, settings))
        .await
}

fn body<S: BrowserSession>(
    name: ScenarioName,
    session: &mut S,
    settings: ScenarioSettings,
) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        match name {
            ScenarioName::InvalidMobile => invalid_mobile(session, &settings).await,
            ScenarioName::MovieDetails => movie_details(session, &settings).await,
            ScenarioName::Events => events(session, &settings).await,
        }
    })
}

/// City, login panel, invalid number; the site must refuse it either by
/// keeping Continue disabled or by showing the error message.
pub async fn invalid_mobile<S: BrowserSession>(
    session: &mut S,
    settings: &ScenarioSettings,
) -> HarnessResult<()> {
    let mut flow = LoginFlow::new(session, settings.config.timeouts);
    flow.open(&settings.config.base_url).await?;
    let strategy = flow.select_city(&settings.city).await?;
    debug!(strategy, "city suggestion matched");
    flow.go_to_login_page().await?;

    if !flow.is_mobile_number_field_visible().await? {
        return Err(HarnessError::NotFound {
            target: "mobile number field".to_string(),
            attempted: vec![flow.locators().mobile_field.to_string()],
        });
    }
    flow.enter_mobile_number(&settings.mobile).await?;

    if flow.is_continue_button_disabled().await? {
        info!(mobile = %settings.mobile, "continue stays disabled");
        return Ok(());
    }
    flow.click_continue().await?;
    if let Some(message) = flow.error_message().await? {
        info!(mobile = %settings.mobile, %message, "mobile number rejected");
        return Ok(());
    }
    if flow.verify_otp_box_visible().await? {
        return Err(HarnessError::InvalidState {
            flow: flow.page_name().to_string(),
            operation: "reject an invalid mobile number".to_string(),
            state: LoginState::OtpPromptVisible.to_string(),
        });
    }
    Err(HarnessError::NotFound {
        target: "invalid mobile number message".to_string(),
        attempted: vec![flow.locators().error_message.to_string()],
    })
}

/// First recommended movie opens a details page with a title
pub async fn movie_details<S: BrowserSession>(
    session: &mut S,
    settings: &ScenarioSettings,
) -> HarnessResult<()> {
    let mut flow = MovieFlow::new(session, settings.config.timeouts, &settings.config.base_url);
    flow.open_home().await?;
    let window = flow.select_first_recommended_movie().await?;
    debug!(new_window = window.is_some(), "recommended movie opened");

    if !flow.is_movie_details_page_displayed().await? {
        return Err(HarnessError::Timeout {
            target: "movie details page".to_string(),
            condition: "visible".to_string(),
            ms: settings.config.timeouts.page_load_ms,
        });
    }
    let poster = flow.is_movie_poster_visible().await?;
    let booking = flow.is_booking_option_available().await?;
    info!(poster, booking, "movie details page displayed");
    Ok(())
}

/// Events listing shows at least one card
pub async fn events<S: BrowserSession>(
    session: &mut S,
    settings: &ScenarioSettings,
) -> HarnessResult<()> {
    let config = &settings.config;
    let mut flow = EventFlow::new(session, config.timeouts, config.events_url(), &config.events_path);
    flow.open_events().await?;
    let card = flow.first_event_card().await?;
    info!(card = %card, "event card found");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketflow::flows::{EventLocators, LoginLocators, MovieLocators};
    use ticketflow::mock::{MockElement, MockSession, MockSessionFactory};
    use ticketflow::Timeouts;

    fn settings() -> ScenarioSettings {
        ScenarioSettings {
            config: HarnessConfig {
                timeouts: Timeouts {
                    default_ms: 2_000,
                    candidate_ms: 1_000,
                    page_load_ms: 3_000,
                    window_switch_ms: 1_000,
                    ..Timeouts::default()
                },
                ..HarnessConfig::default()
            },
            city: "Mumbai".to_string(),
            mobile: "12345".to_string(),
        }
    }

    fn runner(session: &MockSession, dir: &std::path::Path) -> ScenarioRunner<MockSessionFactory> {
        ScenarioRunner::new(MockSessionFactory::new(session.clone()), dir)
    }

    fn login_page(session: &MockSession) -> LoginLocators {
        let locators = LoginLocators::default();
        session.add_element(MockElement::new("city-search").matching(locators.city_search.clone()));
        session.add_element(
            MockElement::new("mumbai").matching(LoginLocators::city_by_name("Mumbai")),
        );
        session.add_element(MockElement::new("sign-in").matching(locators.sign_in.clone()));
        session.add_element(MockElement::new("mobile").matching(locators.mobile_field.clone()));
        locators
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_scenario_futures_are_send() {
        let mut session = MockSession::new();
        let settings = settings();
        assert_send(&invalid_mobile(&mut session, &settings));
        assert_send(&movie_details(&mut session, &settings));
        assert_send(&events(&mut session, &settings));
        assert_send(&body(ScenarioName::MovieDetails, &mut session, settings.clone()));
    }

    mod invalid_mobile_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_disabled_continue_passes() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let locators = login_page(&session);
            session.add_element(
                MockElement::new("continue-off").matching(locators.continue_disabled.clone()),
            );

            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::InvalidMobile, &settings())
                    .await;
            assert!(report.passed(), "{report}");
            assert!(session.was_called("click:mumbai"));
            assert_eq!(session.value_of("mobile").as_deref(), Some("12345"));
            assert!(!session.was_called("click:continue"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_error_message_passes() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let locators = login_page(&session);
            session.add_element(
                MockElement::new("continue").matching(locators.continue_button.clone()),
            );
            session.add_element(
                MockElement::new("error")
                    .matching(locators.error_message.clone())
                    .with_text("Invalid mobile number"),
            );

            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::InvalidMobile, &settings())
                    .await;
            assert!(report.passed(), "{report}");
            assert!(session.was_called("click:continue"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_otp_prompt_fails_with_screenshot() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let locators = login_page(&session);
            session.add_element(
                MockElement::new("continue").matching(locators.continue_button.clone()),
            );
            session.add_element(MockElement::new("otp").matching(locators.otp_input.clone()));

            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::InvalidMobile, &settings())
                    .await;
            assert!(matches!(report.result, Err(HarnessError::InvalidState { .. })));
            assert!(report.artifact.is_some());
            assert!(session.is_closed());
        }
    }

    mod movie_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_details_page_in_new_window() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let locators = MovieLocators::default();
            session.add_element(
                MockElement::new("card")
                    .matching(locators.recommended_links.clone())
                    .opens_window("details", "https://in.bookmyshow.com/movies/x/ET001"),
            );
            session.add_element(MockElement::new("title").matching(locators.movie_name.clone()));

            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::MovieDetails, &settings())
                    .await;
            assert!(report.passed(), "{report}");
            assert_eq!(session.active_window().as_str(), "details");
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_title_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let locators = MovieLocators::default();
            session.add_element(
                MockElement::new("card").matching(locators.recommended_links.clone()),
            );

            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::MovieDetails, &settings())
                    .await;
            assert!(matches!(report.result, Err(HarnessError::Timeout { .. })));
        }
    }

    mod event_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_card_found() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let locators = EventLocators::default();
            session.add_element(MockElement::new("card-0").matching(locators.first_card.clone()));

            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::Events, &settings()).await;
            assert!(report.passed(), "{report}");
            assert!(session.was_called("navigate:https://in.bookmyshow.com/explore/events"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_listing_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let session = MockSession::new();
            let report =
                run_scenario(&runner(&session, dir.path()), ScenarioName::Events, &settings()).await;
            match report.result {
                Err(HarnessError::NotFound { attempted, .. }) => assert_eq!(attempted.len(), 3),
                other => panic!("expected not found, got {other:?}"),
            }
        }
    }
}
