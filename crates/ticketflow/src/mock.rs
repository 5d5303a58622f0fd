//! Scripted in-memory browser session.
//!
//! Every element carries availability windows (attached, displayed, enabled,
//! unobstructed) measured on the tokio clock from the moment the session was
//! created. Tests run with paused time, so "becomes clickable at 3000ms" is
//! deterministic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::driver::{BrowserSession, ElementHandle, SessionFactory, WindowHandle, FORCE_CLEAR_SCRIPT};
use crate::locator::{BoundingBox, Locator, Point};
use crate::result::{HarnessError, HarnessResult};

/// PNG signature returned by mock screenshots
pub const MOCK_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Half-open interval of session time during which a property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    from: Duration,
    until: Option<Duration>,
}

impl Availability {
    /// Holds for the whole session
    pub const ALWAYS: Self = Self {
        from: Duration::ZERO,
        until: None,
    };

    /// Never holds
    pub const NEVER: Self = Self {
        from: Duration::MAX,
        until: None,
    };

    /// Holds from `ms` onwards
    #[must_use]
    pub const fn from_ms(ms: u64) -> Self {
        Self {
            from: Duration::from_millis(ms),
            until: None,
        }
    }

    /// Holds until `ms`
    #[must_use]
    pub const fn until_ms(ms: u64) -> Self {
        Self {
            from: Duration::ZERO,
            until: Some(Duration::from_millis(ms)),
        }
    }

    /// Holds in `[from_ms, until_ms)`
    #[must_use]
    pub const fn between_ms(from_ms: u64, until_ms: u64) -> Self {
        Self {
            from: Duration::from_millis(from_ms),
            until: Some(Duration::from_millis(until_ms)),
        }
    }

    /// Whether the property holds at `elapsed`
    #[must_use]
    pub fn active_at(&self, elapsed: Duration) -> bool {
        elapsed >= self.from && self.until.map_or(true, |end| elapsed < end)
    }
}

/// How an element reacts to an interactive clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearBehavior {
    /// Value becomes empty
    #[default]
    Empties,
    /// Clear raises an error (read-only overlay)
    Errors,
    /// Clear reports success but the value is untouched
    LeavesValue,
}

/// Scripted element
#[derive(Debug, Clone)]
pub struct MockElement {
    name: String,
    matches: Vec<Locator>,
    attached: Availability,
    displayed: Availability,
    enabled: Availability,
    unobstructed: Availability,
    bounding_box: BoundingBox,
    text: String,
    value: String,
    clear_behavior: ClearBehavior,
    opens_window: Option<(WindowHandle, String)>,
    navigates_to: Option<String>,
}

impl MockElement {
    /// Visible, enabled, unobstructed element named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matches: Vec::new(),
            attached: Availability::ALWAYS,
            displayed: Availability::ALWAYS,
            enabled: Availability::ALWAYS,
            unobstructed: Availability::ALWAYS,
            bounding_box: BoundingBox::new(10.0, 10.0, 120.0, 32.0),
            text: String::new(),
            value: String::new(),
            clear_behavior: ClearBehavior::Empties,
            opens_window: None,
            navigates_to: None,
        }
    }

    /// Returned by `find_all` for `locator`
    #[must_use]
    pub fn matching(mut self, locator: Locator) -> Self {
        self.matches.push(locator);
        self
    }

    /// Attached to the document during `window`
    #[must_use]
    pub const fn attached(mut self, window: Availability) -> Self {
        self.attached = window;
        self
    }

    /// Rendered during `window`
    #[must_use]
    pub const fn displayed(mut self, window: Availability) -> Self {
        self.displayed = window;
        self
    }

    /// Rendered from `ms` onwards
    #[must_use]
    pub const fn visible_from(self, ms: u64) -> Self {
        self.displayed(Availability::from_ms(ms))
    }

    /// Attached but never rendered (off-screen duplicate)
    #[must_use]
    pub const fn hidden(self) -> Self {
        self.displayed(Availability::NEVER)
    }

    /// Disabled until `ms`
    #[must_use]
    pub const fn disabled_until(mut self, ms: u64) -> Self {
        self.enabled = Availability::from_ms(ms);
        self
    }

    /// Never enabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = Availability::NEVER;
        self
    }

    /// Covered by an overlay until `ms`
    #[must_use]
    pub const fn obstructed_until(mut self, ms: u64) -> Self {
        self.unobstructed = Availability::from_ms(ms);
        self
    }

    /// Rendered box
    #[must_use]
    pub const fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = bbox;
        self
    }

    /// Text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Initial form value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Reaction to an interactive clear
    #[must_use]
    pub const fn with_clear_behavior(mut self, behavior: ClearBehavior) -> Self {
        self.clear_behavior = behavior;
        self
    }

    /// Clicking opens a new window at `url`
    #[must_use]
    pub fn opens_window(mut self, window: impl Into<String>, url: impl Into<String>) -> Self {
        self.opens_window = Some((WindowHandle::new(window), url.into()));
        self
    }

    /// Clicking navigates the active window to `url`
    #[must_use]
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }
}

#[derive(Debug)]
struct MockState {
    elements: Vec<MockElement>,
    generation: u64,
    current_url: String,
    scheduled_urls: Vec<(Duration, String)>,
    windows: Vec<(WindowHandle, String)>,
    active_window: usize,
    call_history: Vec<String>,
    unavailable: bool,
    screenshot_fails: bool,
    close_fails: bool,
}

/// Scripted session for tests; clones share state
#[derive(Debug, Clone)]
pub struct MockSession {
    started: Instant,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// Empty session on `about:blank` with a single window
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: Arc::new(Mutex::new(MockState {
                elements: Vec::new(),
                generation: 0,
                current_url: "about:blank".to_string(),
                scheduled_urls: Vec::new(),
                windows: vec![(WindowHandle::new("main"), "about:blank".to_string())],
                active_window: 0,
                call_history: Vec::new(),
                unavailable: false,
                screenshot_fails: false,
                close_fails: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session time since creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Add a scripted element
    pub fn add_element(&self, element: MockElement) {
        self.state().elements.push(element);
    }

    /// The active window's URL becomes `url` at `ms`
    pub fn set_url_at(&self, ms: u64, url: impl Into<String>) {
        self.state()
            .scheduled_urls
            .push((Duration::from_millis(ms), url.into()));
    }

    /// Every later call fails with `SessionUnavailable`
    pub fn set_unavailable(&self) {
        self.state().unavailable = true;
    }

    /// Screenshots fail
    pub fn fail_screenshots(&self) {
        self.state().screenshot_fails = true;
    }

    /// Closing fails
    pub fn fail_close(&self) {
        self.state().close_fails = true;
    }

    /// Current `value` of a named element
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<String> {
        self.state()
            .elements
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.clone())
    }

    /// Call history for verification
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(prefix))
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state()
            .call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Whether `close` ran
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.was_called("close")
    }

    /// Currently active window
    #[must_use]
    pub fn active_window(&self) -> WindowHandle {
        let state = self.state();
        state.windows[state.active_window].0.clone()
    }

    fn live(&self, call: String) -> HarnessResult<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        if state.unavailable {
            return Err(HarnessError::session_unavailable("mock session is closed"));
        }
        state.call_history.push(call);
        Ok(state)
    }

    fn element_index(
        state: &MockState,
        handle: &ElementHandle,
        elapsed: Duration,
    ) -> HarnessResult<usize> {
        handle.ensure_generation(state.generation)?;
        state
            .elements
            .iter()
            .position(|e| e.name == handle.id() && e.attached.active_at(elapsed))
            .ok_or_else(|| HarnessError::Detached {
                handle: handle.to_string(),
            })
    }

    fn navigate_state(state: &mut MockState, url: &str) {
        state.generation += 1;
        state.current_url = url.to_string();
        state.scheduled_urls.clear();
        let active = state.active_window;
        state.windows[active].1 = url.to_string();
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        let mut state = self.live(format!("navigate:{url}"))?;
        Self::navigate_state(&mut state, url);
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> HarnessResult<Vec<ElementHandle>> {
        let elapsed = self.elapsed();
        let state = self.live(format!("find_all:{locator}"))?;
        Ok(state
            .elements
            .iter()
            .filter(|e| e.attached.active_at(elapsed) && e.matches.contains(locator))
            .map(|e| ElementHandle::new(e.name.clone(), state.generation))
            .collect())
    }

    async fn is_attached(&self, element: &ElementHandle) -> HarnessResult<bool> {
        let elapsed = self.elapsed();
        let state = self.live(format!("is_attached:{}", element.id()))?;
        element.ensure_generation(state.generation)?;
        Ok(state
            .elements
            .iter()
            .any(|e| e.name == element.id() && e.attached.active_at(elapsed)))
    }

    async fn is_displayed(&self, element: &ElementHandle) -> HarnessResult<bool> {
        let elapsed = self.elapsed();
        let state = self.live(format!("is_displayed:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        Ok(state.elements[idx].displayed.active_at(elapsed))
    }

    async fn is_enabled(&self, element: &ElementHandle) -> HarnessResult<bool> {
        let elapsed = self.elapsed();
        let state = self.live(format!("is_enabled:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        Ok(state.elements[idx].enabled.active_at(elapsed))
    }

    async fn bounding_box(&self, element: &ElementHandle) -> HarnessResult<Option<BoundingBox>> {
        let elapsed = self.elapsed();
        let state = self.live(format!("bounding_box:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        let el = &state.elements[idx];
        Ok(el.displayed.active_at(elapsed).then_some(el.bounding_box))
    }

    async fn hit_test(&self, element: &ElementHandle, point: Point) -> HarnessResult<bool> {
        let elapsed = self.elapsed();
        let state = self.live(format!("hit_test:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        let el = &state.elements[idx];
        Ok(el.unobstructed.active_at(elapsed) && el.bounding_box.contains(&point))
    }

    async fn clear(&self, element: &ElementHandle) -> HarnessResult<()> {
        let elapsed = self.elapsed();
        let mut state = self.live(format!("clear:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        let el = &mut state.elements[idx];
        match el.clear_behavior {
            ClearBehavior::Empties => {
                el.value.clear();
                Ok(())
            }
            ClearBehavior::LeavesValue => Ok(()),
            ClearBehavior::Errors => Err(HarnessError::InteractionFailed {
                target: element.to_string(),
                message: "invalid element state: element is read-only".to_string(),
            }),
        }
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> HarnessResult<()> {
        let elapsed = self.elapsed();
        let mut state = self.live(format!("type_text:{}:{text}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        state.elements[idx].value.push_str(text);
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> HarnessResult<()> {
        let elapsed = self.elapsed();
        let mut state = self.live(format!("click:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        let el = state.elements[idx].clone();
        if !el.displayed.active_at(elapsed) {
            return Err(HarnessError::InteractionFailed {
                target: element.to_string(),
                message: "element not interactable".to_string(),
            });
        }
        if let Some((window, url)) = el.opens_window {
            state.windows.push((window, url));
        }
        if let Some(url) = el.navigates_to {
            Self::navigate_state(&mut state, &url);
        }
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> HarnessResult<String> {
        let elapsed = self.elapsed();
        let state = self.live(format!("text:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        Ok(state.elements[idx].text.clone())
    }

    async fn value(&self, element: &ElementHandle) -> HarnessResult<String> {
        let elapsed = self.elapsed();
        let state = self.live(format!("value:{}", element.id()))?;
        let idx = Self::element_index(&state, element, elapsed)?;
        Ok(state.elements[idx].value.clone())
    }

    async fn run_script(
        &self,
        script: &str,
        args: &[ElementHandle],
    ) -> HarnessResult<serde_json::Value> {
        let elapsed = self.elapsed();
        let mut state = self.live(format!("run_script:{}", args.len()))?;
        if script == FORCE_CLEAR_SCRIPT {
            let target = args.first().ok_or_else(|| HarnessError::ScriptError {
                message: "arguments[0] is undefined".to_string(),
            })?;
            let idx = Self::element_index(&state, target, elapsed)?;
            state.elements[idx].value.clear();
        }
        Ok(serde_json::Value::Null)
    }

    async fn current_url(&self) -> HarnessResult<String> {
        let elapsed = self.elapsed();
        let state = self.live("current_url".to_string())?;
        let scheduled = state
            .scheduled_urls
            .iter()
            .filter(|(at, _)| *at <= elapsed)
            .max_by_key(|(at, _)| *at)
            .map(|(_, url)| url.clone());
        Ok(scheduled.unwrap_or_else(|| state.current_url.clone()))
    }

    async fn window_handles(&self) -> HarnessResult<Vec<WindowHandle>> {
        let state = self.live("window_handles".to_string())?;
        Ok(state.windows.iter().map(|(w, _)| w.clone()).collect())
    }

    async fn switch_to_window(&mut self, window: &WindowHandle) -> HarnessResult<()> {
        let mut state = self.live(format!("switch_to_window:{window}"))?;
        let idx = state
            .windows
            .iter()
            .position(|(w, _)| w == window)
            .ok_or_else(|| HarnessError::InteractionFailed {
                target: window.to_string(),
                message: "no such window".to_string(),
            })?;
        state.active_window = idx;
        state.generation += 1;
        state.current_url = state.windows[idx].1.clone();
        state.scheduled_urls.clear();
        Ok(())
    }

    async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
        let state = self.live("screenshot".to_string())?;
        if state.screenshot_fails {
            return Err(HarnessError::ScreenshotError {
                message: "mock screenshot disabled".to_string(),
            });
        }
        Ok(MOCK_PNG.to_vec())
    }

    async fn close(&mut self) -> HarnessResult<()> {
        let mut state = self.live("close".to_string())?;
        state.unavailable = true;
        if state.close_fails {
            return Err(HarnessError::session_unavailable("browser already gone"));
        }
        Ok(())
    }
}

/// Hands out clones of one scripted session
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    session: MockSession,
    fail_open: bool,
}

impl MockSessionFactory {
    /// Factory returning clones of `session`
    #[must_use]
    pub const fn new(session: MockSession) -> Self {
        Self {
            session,
            fail_open: false,
        }
    }

    /// Factory whose `open` always fails
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            session: MockSession::new(),
            fail_open: true,
        }
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    async fn open(&self) -> HarnessResult<MockSession> {
        if self.fail_open {
            return Err(HarnessError::session_unavailable("no browser to connect to"));
        }
        Ok(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod availability_tests {
        use super::*;

        #[test]
        fn test_windows() {
            let ms = Duration::from_millis;
            assert!(Availability::ALWAYS.active_at(ms(0)));
            assert!(!Availability::NEVER.active_at(ms(1_000_000)));
            assert!(!Availability::from_ms(300).active_at(ms(299)));
            assert!(Availability::from_ms(300).active_at(ms(300)));
            assert!(Availability::until_ms(300).active_at(ms(299)));
            assert!(!Availability::until_ms(300).active_at(ms(300)));
            assert!(Availability::between_ms(100, 200).active_at(ms(150)));
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_find_all_respects_attachment() {
            let session = MockSession::new();
            let loc = Locator::text("Delhi");
            session.add_element(
                MockElement::new("late")
                    .matching(loc.clone())
                    .attached(Availability::from_ms(500)),
            );
            assert!(session.find_all(&loc).await.unwrap().is_empty());
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(session.find_all(&loc).await.unwrap().len(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_navigation_invalidates_handles() {
            let mut session = MockSession::new();
            let loc = Locator::exact_text("Sign in");
            session.add_element(MockElement::new("sign-in").matching(loc.clone()));
            let handle = session.find_all(&loc).await.unwrap().remove(0);
            session.navigate("https://example.test/").await.unwrap();
            assert!(matches!(
                session.click(&handle).await,
                Err(HarnessError::StaleElement { .. })
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn test_clear_behaviors() {
            let session = MockSession::new();
            let loc = Locator::attribute("id", "userMobileNumber");
            session.add_element(
                MockElement::new("mobile")
                    .matching(loc.clone())
                    .with_value("123")
                    .with_clear_behavior(ClearBehavior::Errors),
            );
            let field = session.find_all(&loc).await.unwrap().remove(0);
            assert!(session.clear(&field).await.is_err());
            session.run_script(FORCE_CLEAR_SCRIPT, &[field]).await.unwrap();
            assert_eq!(session.value_of("mobile").as_deref(), Some(""));
        }

        #[tokio::test(start_paused = true)]
        async fn test_scheduled_url() {
            let session = MockSession::new();
            session.set_url_at(700, "https://example.test/buytickets");
            assert_eq!(session.current_url().await.unwrap(), "about:blank");
            tokio::time::sleep(Duration::from_millis(700)).await;
            assert!(session.current_url().await.unwrap().ends_with("/buytickets"));
        }

        #[tokio::test]
        async fn test_close_makes_session_unavailable() {
            let mut session = MockSession::new();
            session.close().await.unwrap();
            assert!(session.is_closed());
            assert!(matches!(
                session.current_url().await,
                Err(HarnessError::SessionUnavailable { .. })
            ));
        }

        #[tokio::test]
        async fn test_click_opens_window() {
            let mut session = MockSession::new();
            let loc = Locator::path("//a");
            session.add_element(
                MockElement::new("card")
                    .matching(loc.clone())
                    .opens_window("tab-2", "https://example.test/movies/x"),
            );
            let card = session.find_all(&loc).await.unwrap().remove(0);
            session.click(&card).await.unwrap();
            let windows = session.window_handles().await.unwrap();
            assert_eq!(windows.len(), 2);
            session.switch_to_window(&windows[1]).await.unwrap();
            assert_eq!(session.active_window().as_str(), "tab-2");
            assert!(session.current_url().await.unwrap().contains("/movies/"));
        }
    }
}
