//! BrowserSession - abstract browser session trait
//!
//! The resolution core only talks to the browser through this trait, which
//! keeps it independent of the automation backend.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  BrowserSession (Abstract Trait)                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐          ┌─────────────────────┐     │
//! │  │  ChromiumSession    │          │  MockSession        │     │
//! │  │  (feature browser)  │          │  (scripted, tests)  │     │
//! │  │  CDP via            │          │  tokio clock driven │     │
//! │  │  chromiumoxide      │          │                     │     │
//! │  └─────────────────────┘          └─────────────────────┘     │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::locator::{BoundingBox, Locator, Point};
use crate::result::{HarnessError, HarnessResult};

/// Script that empties an input and notifies framework listeners.
/// The element is passed as `arguments[0]`.
pub const FORCE_CLEAR_SCRIPT: &str = "arguments[0].value = ''; \
     arguments[0].dispatchEvent(new Event('input', { bubbles: true }));";

/// Live reference to one UI node.
///
/// Handles are only valid for the navigation generation they were issued in;
/// sessions reject older handles with [`HarnessError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    id: String,
    generation: u64,
}

impl ElementHandle {
    /// Create a handle for a session-specific id in a navigation generation
    #[must_use]
    pub fn new(id: impl Into<String>, generation: u64) -> Self {
        Self {
            id: id.into(),
            generation,
        }
    }

    /// Session-specific element id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Navigation generation the handle was issued in
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Fail with `StaleElement` unless issued in `current`
    pub fn ensure_generation(&self, current: u64) -> HarnessResult<()> {
        if self.generation == current {
            Ok(())
        } else {
            Err(HarnessError::StaleElement {
                handle: self.to_string(),
            })
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.generation)
    }
}

/// Identifier of a browser window or tab
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(String);

impl WindowHandle {
    /// Wrap a backend window id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Backend window id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities the resolution core consumes from a live browser session.
///
/// Methods that can only observe the page take `&self`; operations that
/// change which page or window is active take `&mut self`.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the active window; invalidates every issued handle
    async fn navigate(&mut self, url: &str) -> HarnessResult<()>;

    /// All elements matching `locator`, in document order
    async fn find_all(&self, locator: &Locator) -> HarnessResult<Vec<ElementHandle>>;

    /// Whether the element is still attached to the document
    async fn is_attached(&self, element: &ElementHandle) -> HarnessResult<bool>;

    /// Whether the element is rendered and not styled hidden
    async fn is_displayed(&self, element: &ElementHandle) -> HarnessResult<bool>;

    /// Whether the element accepts interaction
    async fn is_enabled(&self, element: &ElementHandle) -> HarnessResult<bool>;

    /// Rendered box, `None` when not laid out
    async fn bounding_box(&self, element: &ElementHandle) -> HarnessResult<Option<BoundingBox>>;

    /// Whether the element (or one of its descendants) is the topmost node
    /// at `point`
    async fn hit_test(&self, element: &ElementHandle, point: Point) -> HarnessResult<bool>;

    /// Interactive clear of an editable element
    async fn clear(&self, element: &ElementHandle) -> HarnessResult<()>;

    /// Type `text` into the element as keystrokes
    async fn type_text(&self, element: &ElementHandle, text: &str) -> HarnessResult<()>;

    /// Click the element
    async fn click(&self, element: &ElementHandle) -> HarnessResult<()>;

    /// Visible text content
    async fn text(&self, element: &ElementHandle) -> HarnessResult<String>;

    /// Current `value` property of a form control
    async fn value(&self, element: &ElementHandle) -> HarnessResult<String>;

    /// Run `script` with `args` bound to `arguments[0..]`
    async fn run_script(
        &self,
        script: &str,
        args: &[ElementHandle],
    ) -> HarnessResult<serde_json::Value>;

    /// URL of the active window
    async fn current_url(&self) -> HarnessResult<String>;

    /// Every open window, in opening order
    async fn window_handles(&self) -> HarnessResult<Vec<WindowHandle>>;

    /// Make `window` the active window; invalidates every issued handle
    async fn switch_to_window(&mut self, window: &WindowHandle) -> HarnessResult<()>;

    /// PNG screenshot of the active window
    async fn screenshot(&self) -> HarnessResult<Vec<u8>>;

    /// Release the session
    async fn close(&mut self) -> HarnessResult<()>;
}

/// Opens sessions for the scenario runner
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Session type produced
    type Session: BrowserSession;

    /// Open a fresh session
    async fn open(&self) -> HarnessResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_generation_check() {
        let handle = ElementHandle::new("e7", 2);
        assert!(handle.ensure_generation(2).is_ok());
        match handle.ensure_generation(3) {
            Err(HarnessError::StaleElement { handle }) => assert_eq!(handle, "e7@2"),
            other => panic!("expected stale element, got {other:?}"),
        }
    }

    #[test]
    fn test_window_handle_display() {
        let window = WindowHandle::new("tab-2");
        assert_eq!(window.as_str(), "tab-2");
        assert_eq!(window.to_string(), "tab-2");
    }

    #[test]
    fn test_force_clear_script_targets_first_argument() {
        assert!(FORCE_CLEAR_SCRIPT.starts_with("arguments[0].value = ''"));
    }
}
