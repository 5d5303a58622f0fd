//! Chromium-backed session over the Chrome `DevTools` Protocol.
//!
//! Element handles map to a page-side registry (`window.__tf`) keyed by the
//! session's navigation generation. Navigating or switching windows bumps the
//! generation, so older handles are rejected before any CDP traffic and a
//! registry left over from an earlier generation is discarded on next use.
//!
//! Each registry also carries a random nonce that prefixes its ids. A page
//! that replaces its document without going through `navigate` gets a fresh
//! registry and nonce, so handles into the old document come back detached
//! instead of aliasing new nodes. Every find reuses the id of a node it has
//! already seen and drops entries for nodes no longer in the document.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{BrowserKind, HarnessConfig};
use crate::driver::{BrowserSession, ElementHandle, SessionFactory, WindowHandle};
use crate::locator::{BoundingBox, Locator, Point};
use crate::result::{HarnessError, HarnessResult};

/// Launch parameters derived from [`HarnessConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a window
    pub headless: bool,
    /// Window width
    pub width: u32,
    /// Window height
    pub height: u32,
    /// Executable to start, `None` lets chromiumoxide detect Chrome
    pub executable: Option<PathBuf>,
    /// Disable the sandbox (containers, CI)
    pub sandbox: bool,
}

impl LaunchOptions {
    /// Options for `config`, resolving the browser executable from `PATH`
    /// when none is configured
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        let executable = match &config.executable_path {
            Some(path) => Some(path.clone()),
            None => find_executable(config.browser)?,
        };
        Ok(Self {
            headless: config.headless,
            width: config.viewport.width,
            height: config.viewport.height,
            executable,
            sandbox: std::env::var_os("CI").is_none(),
        })
    }
}

/// Look up a browser binary on `PATH`.
///
/// Chrome falls back to chromiumoxide's own detection; Chromium and Edge
/// must be found.
fn find_executable(kind: BrowserKind) -> HarnessResult<Option<PathBuf>> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    let found = std::env::split_paths(&path).find_map(|dir| {
        kind.executable_candidates()
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    });
    match (found, kind) {
        (Some(path), _) => Ok(Some(path)),
        (None, BrowserKind::Chrome) => Ok(None),
        (None, other) => Err(HarnessError::invalid_configuration(format!(
            "no {other} executable found on PATH; set executable_path"
        ))),
    }
}

/// JSON-quote a string for embedding in a script
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Script that snapshots every match of `xpath` into the registry for
/// `generation` and returns their ids. `nonce` is only used when the
/// registry has to be created.
fn find_script(xpath: &str, generation: u64, nonce: &str) -> String {
    format!(
        "(() => {{\
           const gen = {generation};\
           if (!window.__tf || window.__tf.gen !== gen) {{\
             window.__tf = {{ gen, nonce: {nonce}, next: 0, refs: {{}}, ids: new Map() }};\
           }}\
           const reg = window.__tf;\
           for (const [id, node] of Object.entries(reg.refs)) {{\
             if (!node.isConnected) {{ reg.ids.delete(node); delete reg.refs[id]; }}\
           }}\
           const snap = document.evaluate({xpath}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);\
           const found = [];\
           for (let i = 0; i < snap.snapshotLength; i++) {{\
             const node = snap.snapshotItem(i);\
             let id = reg.ids.get(node);\
             if (id === undefined) {{\
               id = reg.nonce + ':' + (reg.next++);\
               reg.ids.set(node, id);\
               reg.refs[id] = node;\
             }}\
             found.push(id);\
           }}\
           return found;\
         }})()",
        xpath = js_string(xpath),
        nonce = js_string(nonce),
    )
}

/// Script running `body` as `function(el, ...args)` against registered
/// elements. Resolves to `{ missing: true }` when any of them is gone.
fn element_script(ids: &[&str], generation: u64, body: &str, args: &str) -> String {
    let ids: Vec<String> = ids.iter().map(|id| js_string(id)).collect();
    format!(
        "(() => {{\
           const reg = window.__tf;\
           if (!reg || reg.gen !== {generation}) return {{ missing: true }};\
           const ids = [{ids}];\
           if (ids.some(id => !id.startsWith(reg.nonce + ':'))) return {{ missing: true }};\
           const els = ids.map(id => reg.refs[id]);\
           if (els.some(el => !el || !el.isConnected)) return {{ missing: true }};\
           const value = (function() {{ {body} }}).apply(null, els.concat([{args}]));\
           return {{ missing: false, value: value === undefined ? null : value }};\
         }})()",
        ids = ids.join(", "),
    )
}

/// Hit test at a point. A point outside the viewport scrolls the element
/// into view first and tests its new center instead.
const HIT_TEST_SCRIPT: &str = "const [el, x, y] = arguments; \
    let px = x; let py = y; \
    if (px < 0 || py < 0 || px >= window.innerWidth || py >= window.innerHeight) { \
      el.scrollIntoView({ block: 'center', inline: 'center' }); \
      const r = el.getBoundingClientRect(); \
      px = r.x + r.width / 2; py = r.y + r.height / 2; \
    } \
    const top = document.elementFromPoint(px, py); \
    return !!top && (top === el || el.contains(top));";

fn session_error(e: CdpError) -> HarnessError {
    match e {
        CdpError::Ws(_) | CdpError::NoResponse | CdpError::ChannelSendError(_) => {
            HarnessError::session_unavailable(e.to_string())
        }
        other => HarnessError::ScriptError {
            message: other.to_string(),
        },
    }
}

/// Live Chromium session
#[derive(Debug)]
pub struct ChromiumSession {
    browser: Mutex<CdpBrowser>,
    handler: tokio::task::JoinHandle<()>,
    page: CdpPage,
    window: WindowHandle,
    generation: u64,
}

impl ChromiumSession {
    /// Launch a browser and open a blank page
    pub async fn launch(options: &LaunchOptions) -> HarnessResult<Self> {
        let mut builder = CdpConfig::builder().window_size(options.width, options.height);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(HarnessError::session_unavailable)?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| HarnessError::session_unavailable(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarnessError::session_unavailable(e.to_string()))?;
        let window = WindowHandle::new(page.target_id().inner().clone());
        info!(window = %window, "browser launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            page,
            window,
            generation: 0,
        })
    }

    async fn eval(&self, script: String) -> HarnessResult<Value> {
        let result = self.page.evaluate(script).await.map_err(session_error)?;
        result
            .into_value::<Value>()
            .map_err(|e| HarnessError::ScriptError {
                message: e.to_string(),
            })
    }

    /// Run `body` against `elements`; `None` when one is gone
    async fn on_elements(
        &self,
        elements: &[ElementHandle],
        body: &str,
        args: &str,
    ) -> HarnessResult<Option<Value>> {
        for element in elements {
            element.ensure_generation(self.generation)?;
        }
        let ids: Vec<&str> = elements.iter().map(ElementHandle::id).collect();
        let reply = self
            .eval(element_script(&ids, self.generation, body, args))
            .await?;
        if reply.get("missing").and_then(Value::as_bool).unwrap_or(true) {
            return Ok(None);
        }
        Ok(Some(reply.get("value").cloned().unwrap_or(Value::Null)))
    }

    async fn on_element(&self, element: &ElementHandle, body: &str) -> HarnessResult<Value> {
        self.on_elements(std::slice::from_ref(element), body, "")
            .await?
            .ok_or_else(|| HarnessError::Detached {
                handle: element.to_string(),
            })
    }

    async fn flag(&self, element: &ElementHandle, body: &str) -> HarnessResult<bool> {
        Ok(self.on_element(element, body).await?.as_bool().unwrap_or(false))
    }

    async fn mouse(&self, kind: DispatchMouseEventType, at: Point) -> HarnessResult<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(at.x)
            .y(at.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(|message| HarnessError::InteractionFailed {
                target: "mouse".to_string(),
                message,
            })?;
        self.page.execute(params).await.map_err(session_error)?;
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.generation += 1;
        self.page
            .goto(url)
            .await
            .map_err(|e| HarnessError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        debug!(url, generation = self.generation, "navigated");
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> HarnessResult<Vec<ElementHandle>> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let ids = self
            .eval(find_script(&locator.expression(), self.generation, &nonce))
            .await?;
        let ids: Vec<String> = serde_json::from_value(ids)?;
        Ok(ids
            .into_iter()
            .map(|id| ElementHandle::new(id, self.generation))
            .collect())
    }

    async fn is_attached(&self, element: &ElementHandle) -> HarnessResult<bool> {
        Ok(self
            .on_elements(std::slice::from_ref(element), "return true;", "")
            .await?
            .is_some())
    }

    async fn is_displayed(&self, element: &ElementHandle) -> HarnessResult<bool> {
        self.flag(
            element,
            "const el = arguments[0]; const s = getComputedStyle(el); \
             return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';",
        )
        .await
    }

    async fn is_enabled(&self, element: &ElementHandle) -> HarnessResult<bool> {
        self.flag(
            element,
            "const el = arguments[0]; \
             return !el.disabled && el.getAttribute('aria-disabled') !== 'true';",
        )
        .await
    }

    async fn bounding_box(&self, element: &ElementHandle) -> HarnessResult<Option<BoundingBox>> {
        let rect = self
            .on_element(
                element,
                "const r = arguments[0].getBoundingClientRect(); \
                 return { x: r.x, y: r.y, width: r.width, height: r.height };",
            )
            .await?;
        let bbox: BoundingBox = serde_json::from_value(rect)?;
        Ok(bbox.has_area().then_some(bbox))
    }

    async fn hit_test(&self, element: &ElementHandle, point: Point) -> HarnessResult<bool> {
        let args = format!("{}, {}", point.x, point.y);
        let hit = self
            .on_elements(std::slice::from_ref(element), HIT_TEST_SCRIPT, &args)
            .await?
            .ok_or_else(|| HarnessError::Detached {
                handle: element.to_string(),
            })?;
        Ok(hit.as_bool().unwrap_or(false))
    }

    async fn clear(&self, element: &ElementHandle) -> HarnessResult<()> {
        let cleared = self
            .on_element(
                element,
                "const el = arguments[0]; \
                 if (el.readOnly || el.disabled || !('value' in el)) return false; \
                 el.focus(); if (el.select) el.select(); \
                 document.execCommand('delete'); return true;",
            )
            .await?;
        if cleared.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(HarnessError::InteractionFailed {
                target: element.to_string(),
                message: "invalid element state: element is not editable".to_string(),
            })
        }
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> HarnessResult<()> {
        self.on_element(element, "arguments[0].focus(); return true;")
            .await?;
        for ch in text.chars() {
            let params = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::Char)
                .text(ch.to_string())
                .build()
                .map_err(|message| HarnessError::InteractionFailed {
                    target: element.to_string(),
                    message,
                })?;
            self.page.execute(params).await.map_err(session_error)?;
        }
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> HarnessResult<()> {
        self.on_element(
            element,
            "arguments[0].scrollIntoView({ block: 'center', inline: 'center' }); return true;",
        )
        .await?;
        let bbox = self
            .bounding_box(element)
            .await?
            .ok_or_else(|| HarnessError::InteractionFailed {
                target: element.to_string(),
                message: "element has no rendered box".to_string(),
            })?;
        let center = bbox.center();
        self.mouse(DispatchMouseEventType::MouseMoved, center).await?;
        self.mouse(DispatchMouseEventType::MousePressed, center).await?;
        self.mouse(DispatchMouseEventType::MouseReleased, center).await
    }

    async fn text(&self, element: &ElementHandle) -> HarnessResult<String> {
        let text = self
            .on_element(element, "return arguments[0].innerText || arguments[0].textContent || '';")
            .await?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    async fn value(&self, element: &ElementHandle) -> HarnessResult<String> {
        let value = self
            .on_element(element, "const v = arguments[0].value; return v == null ? '' : String(v);")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn run_script(&self, script: &str, args: &[ElementHandle]) -> HarnessResult<Value> {
        if args.is_empty() {
            let wrapped = format!(
                "(() => {{ const value = (function() {{ {script} }})(); \
                 return {{ value: value === undefined ? null : value }}; }})()"
            );
            let reply = self.eval(wrapped).await?;
            return Ok(reply.get("value").cloned().unwrap_or(Value::Null));
        }
        self.on_elements(args, script, "")
            .await?
            .ok_or_else(|| HarnessError::Detached {
                handle: args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            })
    }

    async fn current_url(&self) -> HarnessResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(session_error)?
            .unwrap_or_default())
    }

    async fn window_handles(&self) -> HarnessResult<Vec<WindowHandle>> {
        let browser = self.browser.lock().await;
        let pages = browser.pages().await.map_err(session_error)?;
        Ok(pages
            .iter()
            .map(|page| WindowHandle::new(page.target_id().inner().clone()))
            .collect())
    }

    async fn switch_to_window(&mut self, window: &WindowHandle) -> HarnessResult<()> {
        let page = {
            let browser = self.browser.lock().await;
            let pages = browser.pages().await.map_err(session_error)?;
            pages
                .into_iter()
                .find(|page| page.target_id().inner() == window.as_str())
                .ok_or_else(|| HarnessError::InteractionFailed {
                    target: window.to_string(),
                    message: "no such window".to_string(),
                })?
        };
        self.page = page;
        self.window = window.clone();
        self.generation += 1;
        debug!(window = %window, generation = self.generation, "switched window");
        Ok(())
    }

    async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self
            .page
            .execute(params)
            .await
            .map_err(|e| HarnessError::ScreenshotError {
                message: e.to_string(),
            })?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| HarnessError::ScreenshotError {
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> HarnessResult<()> {
        let result = {
            let mut browser = self.browser.lock().await;
            browser.close().await
        };
        self.handler.abort();
        result.map_err(|e| HarnessError::session_unavailable(e.to_string()))?;
        info!(window = %self.window, "browser closed");
        Ok(())
    }
}

/// Launches one Chromium per scenario
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    options: LaunchOptions,
}

impl ChromiumFactory {
    /// Factory for `config`
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self {
            options: LaunchOptions::from_config(config)?,
        })
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    type Session = ChromiumSession;

    async fn open(&self) -> HarnessResult<ChromiumSession> {
        ChromiumSession::launch(&self.options).await
    }
}
