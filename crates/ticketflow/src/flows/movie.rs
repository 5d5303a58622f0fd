//! Movie browsing flow: recommended movies, details page, movies tab.

use std::fmt;

use tracing::{debug, info};

use super::{click, probe, PageFlow};
use crate::config::Timeouts;
use crate::driver::{BrowserSession, WindowHandle};
use crate::fallback::{FallbackChain, FallbackChainResolver};
use crate::locator::Locator;
use crate::result::HarnessResult;
use crate::wait::{poll_until, Polled, SynchronizedResolver, WaitCondition};

/// Locators of the home page and movie details page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieLocators {
    /// Anchors in the recommended section
    pub recommended_links: Locator,
    /// Carousel below the recommended heading
    pub recommended_carousel: Locator,
    /// Any title heading on the details page
    pub movie_name: Locator,
    /// Poster section
    pub poster: Locator,
    /// "Book tickets" label
    pub booking_option: Locator,
    /// Header link to the movies listing
    pub movies_tab: Locator,
    /// Filter panel
    pub filters: Locator,
    /// Genre filter heading
    pub genre_filter: Locator,
    /// "Coming Soon" image link
    pub explore_upcoming: Locator,
    /// "Now Showing" image link
    pub in_cinemas_near_you: Locator,
}

impl Default for MovieLocators {
    fn default() -> Self {
        Self {
            recommended_links: Locator::path("//h2[contains(.,'Recommended')]/following::div[1]//a"),
            recommended_carousel: Locator::path("//h2[contains(.,'Recommended')]/following::div[1]"),
            movie_name: Locator::path(
                "//h1 | //h2 | //div[starts-with(@class,'Title') or contains(@class,'title')]",
            ),
            poster: Locator::class_fragment("sc-qswwm9-0").with_tag("section"),
            booking_option: Locator::text("Book tickets").with_tag("span"),
            movies_tab: Locator::exact_text("Movies").with_tag("a"),
            filters: Locator::class_fragment("sc-1y4pbdw-4").with_tag("div"),
            genre_filter: Locator::text("Genre").with_tag("div"),
            explore_upcoming: Locator::attribute("alt", "Coming Soon").with_tag("img"),
            in_cinemas_near_you: Locator::attribute("alt", "Now Showing").with_tag("img"),
        }
    }
}

/// Movie browsing flow over one session
pub struct MovieFlow<'s, S: BrowserSession + ?Sized> {
    session: &'s mut S,
    timeouts: Timeouts,
    home_url: String,
    locators: MovieLocators,
}

impl<S: BrowserSession + ?Sized> fmt::Debug for MovieFlow<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovieFlow")
            .field("home_url", &self.home_url)
            .finish_non_exhaustive()
    }
}

impl<S: BrowserSession + ?Sized> PageFlow for MovieFlow<'_, S> {
    fn page_name(&self) -> &'static str {
        "movie flow"
    }
}

impl<'s, S: BrowserSession + ?Sized> MovieFlow<'s, S> {
    /// Flow whose home page is `home_url`
    pub fn new(session: &'s mut S, timeouts: Timeouts, home_url: impl Into<String>) -> Self {
        Self {
            session,
            timeouts,
            home_url: home_url.into(),
            locators: MovieLocators::default(),
        }
    }

    /// Replace the default locators
    #[must_use]
    pub fn with_locators(mut self, locators: MovieLocators) -> Self {
        self.locators = locators;
        self
    }

    /// Load the home page
    pub async fn open_home(&mut self) -> HarnessResult<()> {
        self.session.navigate(&self.home_url).await
    }

    /// Click the first visible recommended movie and follow it into a new
    /// window if one opens.
    ///
    /// Returns the window switched to, if any.
    pub async fn select_first_recommended_movie(&mut self) -> HarnessResult<Option<WindowHandle>> {
        let candidate = self.timeouts.candidate_policy(WaitCondition::Visible)?;
        let chain = FallbackChain::builder("recommended movie")
            .candidate(self.locators.recommended_links.clone(), candidate.clone())
            .first_visible_child_of(&self.locators.recommended_carousel, candidate)
            .build()?;

        let opened = {
            let session = &*self.session;
            let outcome = FallbackChainResolver::new(session)
                .resolve_first_match(&chain)
                .await?;
            let card = outcome.require_element(chain.target())?;

            let clickable = self.timeouts.default_policy(WaitCondition::Clickable)?;
            let card = SynchronizedResolver::new(session)
                .resolve(&card, &clickable)
                .await?
                .require_element(chain.target())?;

            let before = session.window_handles().await?;
            session.click(&card).await?;

            let switch = self.timeouts.policy(WaitCondition::Present, self.timeouts.window_switch_ms)?;
            let polled = poll_until(switch.timeout(), switch.poll_interval(), || {
                let before = &before;
                async move {
                    let now = session.window_handles().await?;
                    Ok(now.into_iter().find(|w| !before.contains(w)))
                }
            })
            .await?;
            match polled {
                Polled::Ready { value, .. } => Some(value),
                Polled::TimedOut { .. } => {
                    debug!("no new window opened, staying on the current one");
                    None
                }
            }
        };

        if let Some(window) = &opened {
            self.session.switch_to_window(window).await?;
            info!(window = %window, "switched to movie window");
        }
        Ok(opened)
    }

    /// Whether the details page finished loading
    pub async fn is_movie_details_page_displayed(&self) -> HarnessResult<bool> {
        let policy = self.timeouts.page_load_policy(WaitCondition::Visible)?;
        probe(&*self.session, &self.locators.movie_name, &policy).await
    }

    /// Whether a title heading is shown
    pub async fn is_movie_name_displayed(&self) -> HarnessResult<bool> {
        self.visible(&self.locators.movie_name).await
    }

    /// Whether the poster section is shown
    pub async fn is_movie_poster_visible(&self) -> HarnessResult<bool> {
        self.visible(&self.locators.poster).await
    }

    /// Whether "Book tickets" is offered
    pub async fn is_booking_option_available(&self) -> HarnessResult<bool> {
        self.visible(&self.locators.booking_option).await
    }

    /// Open the movies listing
    pub async fn click_movies_tab(&mut self) -> HarnessResult<()> {
        let policy = self.timeouts.default_policy(WaitCondition::Clickable)?;
        click(&*self.session, &self.locators.movies_tab, &policy, "movies tab").await
    }

    /// Whether the filter panel is shown
    pub async fn is_filters_visible(&self) -> HarnessResult<bool> {
        self.visible(&self.locators.filters).await
    }

    /// Whether the genre filter is shown
    pub async fn is_genre_filter_visible(&self) -> HarnessResult<bool> {
        self.visible(&self.locators.genre_filter).await
    }

    /// Open the upcoming movies listing
    pub async fn click_explore_upcoming_movies(&mut self) -> HarnessResult<()> {
        let policy = self.timeouts.default_policy(WaitCondition::Clickable)?;
        click(
            &*self.session,
            &self.locators.explore_upcoming,
            &policy,
            "explore upcoming movies link",
        )
        .await
    }

    /// Whether the "Now Showing" link is shown
    pub async fn is_in_cinemas_near_you_visible(&self) -> HarnessResult<bool> {
        self.visible(&self.locators.in_cinemas_near_you).await
    }

    async fn visible(&self, locator: &Locator) -> HarnessResult<bool> {
        let policy = self.timeouts.default_policy(WaitCondition::Visible)?;
        probe(&*self.session, locator, &policy).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockSession};
    use std::time::Duration;

    fn fast() -> Timeouts {
        Timeouts {
            default_ms: 3_000,
            candidate_ms: 1_000,
            page_load_ms: 5_000,
            window_switch_ms: 1_000,
            ..Timeouts::default()
        }
    }

    const HOME: &str = "https://in.bookmyshow.com/";

    mod recommended_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_card_opens_new_window() {
            let mut session = MockSession::new();
            let locators = MovieLocators::default();
            session.add_element(
                MockElement::new("hidden-card")
                    .matching(locators.recommended_links.clone())
                    .hidden(),
            );
            session.add_element(
                MockElement::new("card")
                    .matching(locators.recommended_links.clone())
                    .opens_window("movie-tab", "https://in.bookmyshow.com/movies/x/ET001"),
            );
            session.add_element(MockElement::new("title").matching(locators.movie_name.clone()));

            let mut flow = MovieFlow::new(&mut session, fast(), HOME);
            flow.open_home().await.unwrap();
            let window = flow.select_first_recommended_movie().await.unwrap();
            assert_eq!(window.as_ref().map(WindowHandle::as_str), Some("movie-tab"));
            assert!(flow.is_movie_details_page_displayed().await.unwrap());
            assert!(session.was_called("click:card"));
            assert!(!session.was_called("click:hidden-card"));
            assert_eq!(session.active_window().as_str(), "movie-tab");
        }

        #[tokio::test(start_paused = true)]
        async fn test_carousel_child_when_anchors_missing() {
            let mut session = MockSession::new();
            let locators = MovieLocators::default();
            session.add_element(
                MockElement::new("tile")
                    .matching(locators.recommended_carousel.children())
                    .navigates_to("https://in.bookmyshow.com/movies/y/ET002"),
            );

            let mut flow = MovieFlow::new(&mut session, fast(), HOME);
            let window = flow.select_first_recommended_movie().await.unwrap();
            assert!(window.is_none());
            assert!(session.was_called("click:tile"));
            assert!(!session.was_called("switch_to_window"));
            assert!(session.elapsed() >= Duration::from_millis(2_000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_recommendations_is_not_found() {
            let mut session = MockSession::new();
            let mut flow = MovieFlow::new(&mut session, fast(), HOME);
            let err = flow.select_first_recommended_movie().await.unwrap_err();
            assert!(err.to_string().contains("recommended movie"));
        }
    }

    mod probe_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_movies_tab_listing() {
            let mut session = MockSession::new();
            let locators = MovieLocators::default();
            session.add_element(MockElement::new("movies-tab").matching(locators.movies_tab.clone()));
            session.add_element(MockElement::new("filters").matching(locators.filters.clone()));
            session.add_element(MockElement::new("genre").matching(locators.genre_filter.clone()));
            session.add_element(MockElement::new("coming-soon").matching(locators.explore_upcoming.clone()));
            session.add_element(MockElement::new("now-showing").matching(locators.in_cinemas_near_you.clone()));

            let mut flow = MovieFlow::new(&mut session, fast(), HOME);
            flow.click_movies_tab().await.unwrap();
            assert!(flow.is_filters_visible().await.unwrap());
            assert!(flow.is_genre_filter_visible().await.unwrap());
            flow.click_explore_upcoming_movies().await.unwrap();
            assert!(flow.is_in_cinemas_near_you_visible().await.unwrap());
            assert!(!flow.is_booking_option_available().await.unwrap());
            assert!(!flow.is_movie_poster_visible().await.unwrap());
            assert!(!flow.is_movie_name_displayed().await.unwrap());
        }
    }
}
