//! Chromium driver over CDP (Chrome `DevTools` Protocol).
//!
//! Compiled only with the `browser` feature. Element work runs as injected
//! page scripts: the script descends the nested-frame path through
//! `contentDocument`, collects the selector's matches, and applies the
//! requested operation, so frame scoping and `text="..."` selectors behave
//! identically to the mock document.

#![allow(
    clippy::wildcard_imports,
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, SetDownloadBehaviorBehavior,
    SetDownloadBehaviorParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use tokio::sync::Mutex;

use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::LoadState;

use super::{Driver, MatchIndex};

/// Browser launch options.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Directory downloads land in
    pub downloads_dir: PathBuf,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chromium_path: None,
            sandbox: true,
            downloads_dir: std::env::temp_dir().join("ensayo-downloads"),
        }
    }
}

impl LaunchOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the downloads directory
    #[must_use]
    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = dir.into();
        self
    }
}

/// A launched Chromium instance.
#[derive(Debug)]
pub struct BrowserSession {
    options: LaunchOptions,
    inner: Arc<Mutex<CdpBrowser>>,
    #[allow(dead_code)]
    handle: tokio::task::JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chromium with the given options.
    pub async fn launch(options: LaunchOptions) -> EnsayoResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(options.viewport_width, options.viewport_height);

        if !options.headless {
            builder = builder.with_head();
        }

        if !options.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| EnsayoError::BrowserLaunch { message: e })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| EnsayoError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        std::fs::create_dir_all(&options.downloads_dir)?;

        Ok(Self {
            options,
            inner: Arc::new(Mutex::new(browser)),
            handle,
        })
    }

    /// Open a new page and return a driver bound to it.
    pub async fn new_driver(&self) -> EnsayoResult<CdpDriver> {
        let browser = self.inner.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| EnsayoError::Page {
                message: e.to_string(),
            })?;

        let allow = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(self.options.downloads_dir.display().to_string())
            .build()
            .map_err(|e| EnsayoError::Page { message: e })?;
        page.execute(allow).await.map_err(|e| EnsayoError::Page {
            message: e.to_string(),
        })?;

        Ok(CdpDriver {
            page: Arc::new(Mutex::new(page)),
            browser: Arc::clone(&self.inner),
            downloads_dir: self.options.downloads_dir.clone(),
        })
    }

    /// The launch options this session was started with.
    #[must_use]
    pub const fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Close the browser.
    pub async fn close(self) -> EnsayoResult<()> {
        let mut browser = self.inner.lock().await;
        browser
            .close()
            .await
            .map_err(|e| EnsayoError::BrowserLaunch {
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Driver for one Chromium page.
#[derive(Debug)]
pub struct CdpDriver {
    page: Arc<Mutex<CdpPage>>,
    browser: Arc<Mutex<CdpBrowser>>,
    downloads_dir: PathBuf,
}

/// Outcome envelope the injected scripts serialize back.
#[derive(Debug, serde::Deserialize)]
struct ScriptOutcome {
    #[serde(default)]
    frame_missing: Option<String>,
    #[serde(default)]
    no_match: bool,
    #[serde(default)]
    value: serde_json::Value,
}

impl CdpDriver {
    /// Build the locate-and-act script: descend `frame_path`, collect the
    /// selector's matches into `els`, bind the addressed one to `el`, then
    /// run `body` (which must `return out(...)` or `return fail()`).
    fn script(frame_path: &[String], selector: &str, nth: MatchIndex, body: &str) -> String {
        let frames = serde_json::to_string(frame_path).unwrap_or_else(|_| "[]".to_string());
        let selector = serde_json::to_string(selector).unwrap_or_default();
        let nth = nth.unwrap_or(0);
        format!(
            r#"(() => {{
  const out = (value) => JSON.stringify({{ value }});
  const fail = () => JSON.stringify({{ no_match: true }});
  let doc = document;
  for (const frameSel of {frames}) {{
    const host = doc.querySelector(frameSel);
    if (!host || !host.contentDocument) {{
      return JSON.stringify({{ frame_missing: frameSel }});
    }}
    doc = host.contentDocument;
  }}
  const sel = {selector};
  const textForm = sel.match(/^text="(.*)"$/);
  const els = textForm
    ? Array.from(doc.querySelectorAll('*')).filter(
        (node) => node.children.length === 0 && node.textContent.trim() === textForm[1]
      )
    : Array.from(doc.querySelectorAll(sel));
  const el = els[{nth}];
  {body}
}})()"#
        )
    }

    async fn eval(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        body: &str,
    ) -> EnsayoResult<ScriptOutcome> {
        let script = Self::script(frame_path, selector, nth, body);
        let page = self.page.lock().await;
        let raw: String = page
            .evaluate(script)
            .await
            .map_err(|e| EnsayoError::Action {
                selector: selector.to_string(),
                message: e.to_string(),
            })?
            .into_value()
            .map_err(|e| EnsayoError::Action {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        let outcome: ScriptOutcome =
            serde_json::from_str(&raw).map_err(|e| EnsayoError::Action {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        if let Some(frame) = outcome.frame_missing {
            return Err(EnsayoError::FrameNotFound { selector: frame });
        }
        Ok(outcome)
    }

    /// Like [`CdpDriver::eval`] but treats a missing match as an action
    /// failure on `selector`.
    async fn eval_on_match(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        body: &str,
    ) -> EnsayoResult<serde_json::Value> {
        let outcome = self.eval(frame_path, selector, nth, body).await?;
        if outcome.no_match {
            return Err(EnsayoError::Action {
                selector: selector.to_string(),
                message: "no matches in document".to_string(),
            });
        }
        Ok(outcome.value)
    }

    fn existing_downloads(&self) -> EnsayoResult<HashSet<PathBuf>> {
        let mut seen = HashSet::new();
        for entry in std::fs::read_dir(&self.downloads_dir)? {
            let _ = seen.insert(entry?.path());
        }
        Ok(seen)
    }

    /// Collect files that appeared in the downloads directory since
    /// `before`, waiting until `count` of them have finished.
    async fn collect_downloads(
        &self,
        before: &HashSet<PathBuf>,
        count: usize,
        timeout: Duration,
    ) -> EnsayoResult<Vec<PathBuf>> {
        let start = Instant::now();
        loop {
            let mut finished: Vec<PathBuf> = self
                .existing_downloads()?
                .into_iter()
                .filter(|path| {
                    !before.contains(path)
                        && path.extension().map_or(true, |ext| ext != "crdownload")
                })
                .collect();
            if finished.len() >= count {
                finished.sort();
                finished.truncate(count);
                return Ok(finished);
            }
            if start.elapsed() >= timeout {
                return Err(EnsayoError::Download {
                    message: format!(
                        "expected {count} downloads within {}ms, got {}",
                        timeout.as_millis(),
                        finished.len()
                    ),
                });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn goto(&self, url: &str) -> EnsayoResult<()> {
        let page = self.page.lock().await;
        page.goto(url).await.map_err(|e| EnsayoError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn current_url(&self) -> EnsayoResult<String> {
        let page = self.page.lock().await;
        let url = page.url().await.map_err(|e| EnsayoError::Page {
            message: e.to_string(),
        })?;
        Ok(url.unwrap_or_default())
    }

    async fn count(&self, frame_path: &[String], selector: &str) -> EnsayoResult<usize> {
        let value = self
            .eval(frame_path, selector, None, "return out(els.length);")
            .await?
            .value;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn wait_for_attached(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        timeout: Duration,
    ) -> EnsayoResult<()> {
        let needed = nth.unwrap_or(0) + 1;
        let start = Instant::now();
        loop {
            if self.count(frame_path, selector).await? >= needed {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(EnsayoError::WaitTimeout {
                    condition: format!("element {selector} is not attached"),
                    ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn is_visible(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<bool> {
        let outcome = self
            .eval(
                frame_path,
                selector,
                nth,
                "if (!el) { return out(false); } \
                 const style = el.ownerDocument.defaultView.getComputedStyle(el); \
                 const rendered = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); \
                 return out(rendered && style.visibility !== 'hidden');",
            )
            .await?;
        Ok(outcome.value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<bool> {
        let value = self
            .eval_on_match(
                frame_path,
                selector,
                nth,
                "if (!el) { return fail(); } return out(!el.disabled);",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_disabled(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<bool> {
        let value = self
            .eval_on_match(
                frame_path,
                selector,
                nth,
                "if (!el) { return fail(); } return out(!!el.disabled);",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()> {
        let _ = self
            .eval_on_match(
                frame_path,
                selector,
                nth,
                "if (!el) { return fail(); } el.click(); return out(true);",
            )
            .await?;
        Ok(())
    }

    async fn double_click(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()> {
        let _ = self
            .eval_on_match(
                frame_path,
                selector,
                nth,
                "if (!el) { return fail(); } \
                 el.dispatchEvent(new MouseEvent('dblclick', { bubbles: true })); \
                 return out(true);",
            )
            .await?;
        Ok(())
    }

    async fn fill(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        text: &str,
    ) -> EnsayoResult<()> {
        let text = serde_json::to_string(text).unwrap_or_default();
        let body = format!(
            "if (!el) {{ return fail(); }} \
             el.value = {text}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return out(true);"
        );
        let _ = self.eval_on_match(frame_path, selector, nth, &body).await?;
        Ok(())
    }

    async fn clear(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()> {
        self.fill(frame_path, selector, nth, "").await
    }

    async fn hover(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()> {
        let _ = self
            .eval_on_match(
                frame_path,
                selector,
                None,
                "if (!el) { return fail(); } \
                 el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true })); \
                 el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true })); \
                 return out(true);",
            )
            .await?;
        Ok(())
    }

    async fn focus(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()> {
        let _ = self
            .eval_on_match(
                frame_path,
                selector,
                None,
                "if (!el) { return fail(); } el.focus(); return out(true);",
            )
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()> {
        let _ = self
            .eval_on_match(
                frame_path,
                selector,
                None,
                "if (!el) { return fail(); } \
                 el.scrollIntoView({ block: 'center', inline: 'center' }); \
                 return out(true);",
            )
            .await?;
        Ok(())
    }

    async fn select_option(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        option: &str,
    ) -> EnsayoResult<()> {
        let option = serde_json::to_string(option).unwrap_or_default();
        let body = format!(
            "if (!el) {{ return fail(); }} \
             const wanted = {option}; \
             const found = Array.from(el.options || []).some(
               (opt) => opt.value === wanted || opt.label === wanted
             ); \
             if (!found) {{ return fail(); }} \
             el.value = Array.from(el.options).find(
               (opt) => opt.value === wanted || opt.label === wanted
             ).value; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return out(true);"
        );
        let _ = self.eval_on_match(frame_path, selector, nth, &body).await?;
        Ok(())
    }

    async fn set_input_files(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
        path: &Path,
    ) -> EnsayoResult<()> {
        if !frame_path.is_empty() {
            return Err(EnsayoError::Action {
                selector: selector.to_string(),
                message: "file inputs inside frames are not supported over CDP".to_string(),
            });
        }
        let page = self.page.lock().await;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| EnsayoError::Action {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        let params = chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams::builder()
            .files(vec![path.display().to_string()])
            .node_id(element.node_id)
            .build()
            .map_err(|e| EnsayoError::Action {
                selector: selector.to_string(),
                message: e,
            })?;
        page.execute(params).await.map_err(|e| EnsayoError::Action {
            selector: selector.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn press_key(&self, _frame_path: &[String], key: &str) -> EnsayoResult<()> {
        let page = self.page.lock().await;
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key)
                .build()
                .map_err(|e| EnsayoError::Action {
                    selector: key.to_string(),
                    message: e,
                })?;
            page.execute(params).await.map_err(|e| EnsayoError::Action {
                selector: key.to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    async fn type_text(&self, _frame_path: &[String], text: &str) -> EnsayoResult<()> {
        let page = self.page.lock().await;
        let params = InsertTextParams::builder()
            .text(text)
            .build()
            .map_err(|e| EnsayoError::Action {
                selector: "keyboard".to_string(),
                message: e,
            })?;
        page.execute(params).await.map_err(|e| EnsayoError::Action {
            selector: "keyboard".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn text_content(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<Option<String>> {
        let value = self
            .eval_on_match(
                frame_path,
                selector,
                nth,
                "if (!el) { return fail(); } return out(el.textContent);",
            )
            .await?;
        Ok(value.as_str().map(ToString::to_string))
    }

    async fn all_text_contents(
        &self,
        frame_path: &[String],
        selector: &str,
    ) -> EnsayoResult<Vec<String>> {
        let value = self
            .eval(
                frame_path,
                selector,
                None,
                "return out(els.map((node) => node.textContent ?? ''));",
            )
            .await?
            .value;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn all_inner_texts(
        &self,
        frame_path: &[String],
        selector: &str,
    ) -> EnsayoResult<Vec<String>> {
        let value = self
            .eval(
                frame_path,
                selector,
                None,
                "return out(els.map((node) => node.innerText ?? ''));",
            )
            .await?
            .value;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn attribute(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        name: &str,
    ) -> EnsayoResult<Option<String>> {
        let name = serde_json::to_string(name).unwrap_or_default();
        let body =
            format!("if (!el) {{ return fail(); }} return out(el.getAttribute({name}));");
        let value = self.eval_on_match(frame_path, selector, nth, &body).await?;
        Ok(value.as_str().map(ToString::to_string))
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> EnsayoResult<()> {
        // Network idle has no readyState; "complete" is the closest page
        // signal available through script evaluation.
        let accept: &[&str] = match state {
            LoadState::DomContentLoaded => &["interactive", "complete"],
            LoadState::Load | LoadState::NetworkIdle => &["complete"],
        };
        let start = Instant::now();
        loop {
            let page = self.page.lock().await;
            let ready: String = page
                .evaluate("document.readyState")
                .await
                .map_err(|e| EnsayoError::Page {
                    message: e.to_string(),
                })?
                .into_value()
                .map_err(|e| EnsayoError::Page {
                    message: e.to_string(),
                })?;
            drop(page);
            if accept.contains(&ready.as_str()) {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(EnsayoError::WaitTimeout {
                    condition: format!("load state {state}"),
                    ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn wait_for_response(&self, url_fragment: &str, timeout: Duration) -> EnsayoResult<()> {
        let page = self.page.lock().await;
        let mut responses =
            page.event_listener::<EventResponseReceived>()
                .await
                .map_err(|e| EnsayoError::Page {
                    message: e.to_string(),
                })?;
        drop(page);
        let wait = async {
            while let Some(event) = responses.next().await {
                if event.response.url.contains(url_fragment) {
                    return true;
                }
            }
            false
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(true) => Ok(()),
            _ => Err(EnsayoError::WaitTimeout {
                condition: format!("response matching {url_fragment}"),
                ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn screenshot(&self) -> EnsayoResult<Vec<u8>> {
        let page = self.page.lock().await;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = page
            .execute(params)
            .await
            .map_err(|e| EnsayoError::Screenshot {
                message: e.to_string(),
            })?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| EnsayoError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn expect_download(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        timeout: Duration,
    ) -> EnsayoResult<PathBuf> {
        let before = self.existing_downloads()?;
        self.click(frame_path, selector, nth).await?;
        let mut files = self.collect_downloads(&before, 1, timeout).await?;
        files.pop().ok_or_else(|| EnsayoError::Download {
            message: format!("no download triggered by {selector}"),
        })
    }

    async fn expect_downloads(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        count: usize,
        timeout: Duration,
    ) -> EnsayoResult<Vec<PathBuf>> {
        let before = self.existing_downloads()?;
        self.click(frame_path, selector, nth).await?;
        self.collect_downloads(&before, count, timeout).await
    }

    async fn wait_for_popup(&self, timeout: Duration) -> EnsayoResult<Arc<dyn Driver>> {
        let known: HashSet<_> = {
            let browser = self.browser.lock().await;
            browser
                .pages()
                .await
                .map_err(|e| EnsayoError::Page {
                    message: e.to_string(),
                })?
                .iter()
                .map(|page| page.target_id().clone())
                .collect()
        };
        let start = Instant::now();
        loop {
            let browser = self.browser.lock().await;
            let pages = browser.pages().await.map_err(|e| EnsayoError::Page {
                message: e.to_string(),
            })?;
            drop(browser);
            if let Some(page) = pages
                .into_iter()
                .find(|page| !known.contains(page.target_id()))
            {
                return Ok(Arc::new(Self {
                    page: Arc::new(Mutex::new(page)),
                    browser: Arc::clone(&self.browser),
                    downloads_dir: self.downloads_dir.clone(),
                }));
            }
            if start.elapsed() >= timeout {
                return Err(EnsayoError::Page {
                    message: format!("no popup opened within {}ms", timeout.as_millis()),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
