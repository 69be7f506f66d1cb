//! The browser-automation driver seam.
//!
//! Every helper in this crate talks to the browser through the [`Driver`]
//! trait. The real implementation (feature `browser`) drives Chromium over
//! CDP; the in-crate [`MockDriver`] backs unit and integration tests with a
//! scriptable in-memory document, the same split the CDP layer has always
//! needed for browser-free testing.
//!
//! All scoped operations take the nested-frame path explicitly. Failing to
//! descend into an intermediate frame is a resolution failure
//! ([`crate::EnsayoError::FrameNotFound`]) and is never retried at this
//! layer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::LoadState;

#[cfg(feature = "browser")]
pub mod cdp;

/// Position of an element among its selector's matches. `None` addresses
/// the sole (or absent) match without indexing.
pub type MatchIndex = Option<usize>;

/// Browser-automation driver operations.
///
/// Implementations must be safe to share across helper calls; one scenario
/// issues calls strictly sequentially.
#[async_trait]
pub trait Driver: fmt::Debug + Send + Sync {
    /// Navigate the page to `url`.
    async fn goto(&self, url: &str) -> EnsayoResult<()>;

    /// Current page URL.
    async fn current_url(&self) -> EnsayoResult<String>;

    /// Count matches for `selector` inside the frame scope.
    async fn count(&self, frame_path: &[String], selector: &str) -> EnsayoResult<usize>;

    /// Wait until the addressed match is attached to the document.
    async fn wait_for_attached(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        timeout: Duration,
    ) -> EnsayoResult<()>;

    /// Single-shot visibility probe.
    async fn is_visible(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<bool>;

    /// Single-shot enablement probe.
    async fn is_enabled(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<bool>;

    /// Single-shot disablement probe.
    async fn is_disabled(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<bool>;

    /// Click the addressed match.
    async fn click(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()>;

    /// Double-click the addressed match.
    async fn double_click(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()>;

    /// Replace the addressed input's value with `text`.
    async fn fill(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        text: &str,
    ) -> EnsayoResult<()>;

    /// Clear the addressed input.
    async fn clear(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()>;

    /// Hover over the addressed match.
    async fn hover(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()>;

    /// Focus the addressed match.
    async fn focus(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()>;

    /// Scroll the addressed match into view.
    async fn scroll_into_view(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()>;

    /// Select `option` in the addressed dropdown.
    async fn select_option(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        option: &str,
    ) -> EnsayoResult<()>;

    /// Attach `path` to the addressed file input.
    async fn set_input_files(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        path: &Path,
    ) -> EnsayoResult<()>;

    /// Press a single key (e.g. `"Enter"`) in the frame scope.
    async fn press_key(&self, frame_path: &[String], key: &str) -> EnsayoResult<()>;

    /// Type `text` through the keyboard in the frame scope.
    async fn type_text(&self, frame_path: &[String], text: &str) -> EnsayoResult<()>;

    /// Text content of the addressed match.
    async fn text_content(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<Option<String>>;

    /// Text contents of every match.
    async fn all_text_contents(
        &self,
        frame_path: &[String],
        selector: &str,
    ) -> EnsayoResult<Vec<String>>;

    /// Inner texts of every match.
    async fn all_inner_texts(
        &self,
        frame_path: &[String],
        selector: &str,
    ) -> EnsayoResult<Vec<String>>;

    /// Attribute value of the addressed match.
    async fn attribute(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        name: &str,
    ) -> EnsayoResult<Option<String>>;

    /// Wait for the page to reach `state`.
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> EnsayoResult<()>;

    /// Wait for a response whose URL contains `url_fragment`.
    async fn wait_for_response(&self, url_fragment: &str, timeout: Duration) -> EnsayoResult<()>;

    /// Capture a full-page screenshot as PNG bytes.
    async fn screenshot(&self) -> EnsayoResult<Vec<u8>>;

    /// Click the addressed match and capture the download it triggers,
    /// returning the downloaded file's path.
    async fn expect_download(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        timeout: Duration,
    ) -> EnsayoResult<PathBuf>;

    /// Click the addressed match and capture `count` downloads.
    async fn expect_downloads(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        count: usize,
        timeout: Duration,
    ) -> EnsayoResult<Vec<PathBuf>>;

    /// Wait for a popup page to open, returning a driver scoped to it.
    async fn wait_for_popup(&self, timeout: Duration) -> EnsayoResult<Arc<dyn Driver>>;
}

// ============================================================================
// Mock driver
// ============================================================================

/// A scriptable element set the mock document serves for one selector.
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Number of matches
    pub count: usize,
    /// Base visibility
    pub visible: bool,
    /// Base enablement
    pub enabled: bool,
    /// Per-match text contents
    pub texts: Vec<String>,
    /// Attributes shared by the matches
    pub attributes: HashMap<String, String>,
    visible_from: Option<Instant>,
    hidden_from: Option<Instant>,
}

impl Default for MockElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MockElement {
    /// A single visible, enabled match with no text.
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: 1,
            visible: true,
            enabled: true,
            texts: Vec::new(),
            attributes: HashMap::new(),
            visible_from: None,
            hidden_from: None,
        }
    }

    /// Set the number of matches.
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Mark the matches hidden.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark the matches disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the text of the single match.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.texts = vec![text.into()];
        self
    }

    /// Set per-match texts (also sets the match count).
    #[must_use]
    pub fn with_texts<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texts = texts.into_iter().map(Into::into).collect();
        self.count = self.texts.len();
        self
    }

    /// Set an attribute on the matches.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Become visible only after `delay` from now.
    #[must_use]
    pub fn visible_after(mut self, delay: Duration) -> Self {
        self.visible = true;
        self.visible_from = Some(Instant::now() + delay);
        self
    }

    /// Become hidden after `delay` from now.
    #[must_use]
    pub fn hidden_after(mut self, delay: Duration) -> Self {
        self.hidden_from = Some(Instant::now() + delay);
        self
    }

    fn currently_visible(&self) -> bool {
        if let Some(at) = self.hidden_from {
            if Instant::now() >= at {
                return false;
            }
        }
        if let Some(at) = self.visible_from {
            if Instant::now() < at {
                return false;
            }
        }
        self.visible
    }
}

/// An action the mock driver recorded, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    /// Navigation to a URL
    Navigate {
        /// Target URL
        url: String,
    },
    /// Click on a selector
    Click {
        /// Selector clicked
        selector: String,
        /// Disambiguated match index, if any
        nth: MatchIndex,
    },
    /// Double-click on a selector
    DoubleClick {
        /// Selector clicked
        selector: String,
        /// Disambiguated match index, if any
        nth: MatchIndex,
    },
    /// Input fill
    Fill {
        /// Selector filled
        selector: String,
        /// Text sent
        text: String,
    },
    /// Input clear
    Clear {
        /// Selector cleared
        selector: String,
    },
    /// Hover
    Hover {
        /// Selector hovered
        selector: String,
    },
    /// Focus
    Focus {
        /// Selector focused
        selector: String,
    },
    /// Scroll into view
    ScrollIntoView {
        /// Selector scrolled to
        selector: String,
    },
    /// Dropdown option selection
    SelectOption {
        /// Dropdown selector
        selector: String,
        /// Option chosen
        option: String,
    },
    /// File attachment to an input
    SetInputFiles {
        /// Input selector
        selector: String,
        /// Attached file path
        path: PathBuf,
    },
    /// Keyboard key press
    PressKey {
        /// Key name
        key: String,
    },
    /// Keyboard typing
    TypeText {
        /// Typed text
        text: String,
    },
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    elements: HashMap<String, MockElement>,
    frames: HashSet<String>,
    actions: Vec<MockAction>,
    downloads: VecDeque<PathBuf>,
    popup: Option<Arc<MockDriver>>,
    stalled_load_states: HashSet<LoadState>,
    failing_endpoints: HashSet<String>,
    screenshot_bytes: Vec<u8>,
}

/// In-memory driver backing browser-free tests.
///
/// The document is a registry of selector → [`MockElement`] entries per
/// frame scope, with scripted timed visibility changes, downloads and
/// popups, and a recorded action log for assertions.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

fn scope_key(frame_path: &[String], selector: &str) -> String {
    format!("{}::{selector}", frame_path.join("|"))
}

impl MockDriver {
    /// Create an empty mock document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock document with a starting URL.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        let driver = Self::new();
        driver.state().url = url.into();
        driver
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install an element set at the top-level scope.
    pub fn add_element(&self, selector: impl Into<String>, element: MockElement) {
        self.add_element_in(&[], selector, element);
    }

    /// Install an element set inside a frame scope. The scope's frames must
    /// be registered separately with [`MockDriver::register_frame`].
    pub fn add_element_in(
        &self,
        frame_path: &[&str],
        selector: impl Into<String>,
        element: MockElement,
    ) {
        let path: Vec<String> = frame_path.iter().map(ToString::to_string).collect();
        let _ = self
            .state()
            .elements
            .insert(scope_key(&path, &selector.into()), element);
    }

    /// Register a nested-frame path as existing. Every prefix of the path
    /// becomes descendable.
    pub fn register_frame(&self, frame_path: &[&str]) {
        let mut state = self.state();
        for depth in 1..=frame_path.len() {
            let _ = state.frames.insert(frame_path[..depth].join("|"));
        }
    }

    /// Script a download path served by the next download-triggering click.
    pub fn script_download(&self, path: impl Into<PathBuf>) {
        self.state().downloads.push_back(path.into());
    }

    /// Script the popup page the next popup wait resolves to.
    pub fn script_popup(&self, popup: Arc<MockDriver>) {
        self.state().popup = Some(popup);
    }

    /// Make waits for `state` stall until their deadline.
    pub fn stall_load_state(&self, state: LoadState) {
        let _ = self.state().stalled_load_states.insert(state);
    }

    /// Make response waits for `url_fragment` stall until their deadline.
    pub fn fail_endpoint(&self, url_fragment: impl Into<String>) {
        let _ = self.state().failing_endpoints.insert(url_fragment.into());
    }

    /// Set the bytes screenshots return.
    pub fn set_screenshot_bytes(&self, bytes: Vec<u8>) {
        self.state().screenshot_bytes = bytes;
    }

    /// The recorded action log, in call order.
    #[must_use]
    pub fn actions(&self) -> Vec<MockAction> {
        self.state().actions.clone()
    }

    fn check_frames(state: &MockState, frame_path: &[String]) -> EnsayoResult<()> {
        for depth in 1..=frame_path.len() {
            if !state.frames.contains(&frame_path[..depth].join("|")) {
                return Err(EnsayoError::FrameNotFound {
                    selector: frame_path[depth - 1].clone(),
                });
            }
        }
        Ok(())
    }

    fn with_element<T>(
        &self,
        frame_path: &[String],
        selector: &str,
        act: impl FnOnce(&mut MockState, MockElement) -> T,
    ) -> EnsayoResult<T> {
        let mut state = self.state();
        Self::check_frames(&state, frame_path)?;
        let element = state
            .elements
            .get(&scope_key(frame_path, selector))
            .filter(|element| element.count > 0)
            .cloned()
            .ok_or_else(|| EnsayoError::Action {
                selector: selector.to_string(),
                message: "no matches in document".to_string(),
            })?;
        Ok(act(&mut state, element))
    }

    fn record(&self, action: MockAction) {
        self.state().actions.push(action);
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn goto(&self, url: &str) -> EnsayoResult<()> {
        let mut state = self.state();
        state.url = url.to_string();
        state.actions.push(MockAction::Navigate {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn current_url(&self) -> EnsayoResult<String> {
        Ok(self.state().url.clone())
    }

    async fn count(&self, frame_path: &[String], selector: &str) -> EnsayoResult<usize> {
        let state = self.state();
        Self::check_frames(&state, frame_path)?;
        Ok(state
            .elements
            .get(&scope_key(frame_path, selector))
            .map_or(0, |element| element.count))
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
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn is_visible(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
    ) -> EnsayoResult<bool> {
        let state = self.state();
        Self::check_frames(&state, frame_path)?;
        Ok(state
            .elements
            .get(&scope_key(frame_path, selector))
            .is_some_and(|element| element.count > 0 && element.currently_visible()))
    }

    async fn is_enabled(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
    ) -> EnsayoResult<bool> {
        self.with_element(frame_path, selector, |_, element| element.enabled)
    }

    async fn is_disabled(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
    ) -> EnsayoResult<bool> {
        self.with_element(frame_path, selector, |_, element| !element.enabled)
    }

    async fn click(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::Click {
                selector: selector.to_string(),
                nth,
            });
        })
    }

    async fn double_click(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::DoubleClick {
                selector: selector.to_string(),
                nth,
            });
        })
    }

    async fn fill(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
        text: &str,
    ) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::Fill {
                selector: selector.to_string(),
                text: text.to_string(),
            });
        })
    }

    async fn clear(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
    ) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::Clear {
                selector: selector.to_string(),
            });
        })
    }

    async fn hover(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::Hover {
                selector: selector.to_string(),
            });
        })
    }

    async fn focus(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::Focus {
                selector: selector.to_string(),
            });
        })
    }

    async fn scroll_into_view(&self, frame_path: &[String], selector: &str) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::ScrollIntoView {
                selector: selector.to_string(),
            });
        })
    }

    async fn select_option(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
        option: &str,
    ) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::SelectOption {
                selector: selector.to_string(),
                option: option.to_string(),
            });
        })
    }

    async fn set_input_files(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
        path: &Path,
    ) -> EnsayoResult<()> {
        self.with_element(frame_path, selector, |state, _| {
            state.actions.push(MockAction::SetInputFiles {
                selector: selector.to_string(),
                path: path.to_path_buf(),
            });
        })
    }

    async fn press_key(&self, frame_path: &[String], key: &str) -> EnsayoResult<()> {
        let state = self.state();
        Self::check_frames(&state, frame_path)?;
        drop(state);
        self.record(MockAction::PressKey {
            key: key.to_string(),
        });
        Ok(())
    }

    async fn type_text(&self, frame_path: &[String], text: &str) -> EnsayoResult<()> {
        let state = self.state();
        Self::check_frames(&state, frame_path)?;
        drop(state);
        self.record(MockAction::TypeText {
            text: text.to_string(),
        });
        Ok(())
    }

    async fn text_content(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
    ) -> EnsayoResult<Option<String>> {
        self.with_element(frame_path, selector, |_, element| {
            element.texts.get(nth.unwrap_or(0)).cloned()
        })
    }

    async fn all_text_contents(
        &self,
        frame_path: &[String],
        selector: &str,
    ) -> EnsayoResult<Vec<String>> {
        let state = self.state();
        Self::check_frames(&state, frame_path)?;
        Ok(state
            .elements
            .get(&scope_key(frame_path, selector))
            .map(|element| element.texts.clone())
            .unwrap_or_default())
    }

    async fn all_inner_texts(
        &self,
        frame_path: &[String],
        selector: &str,
    ) -> EnsayoResult<Vec<String>> {
        self.all_text_contents(frame_path, selector).await
    }

    async fn attribute(
        &self,
        frame_path: &[String],
        selector: &str,
        _nth: MatchIndex,
        name: &str,
    ) -> EnsayoResult<Option<String>> {
        self.with_element(frame_path, selector, |_, element| {
            element.attributes.get(name).cloned()
        })
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> EnsayoResult<()> {
        let stalled = self.state().stalled_load_states.contains(&state);
        if stalled {
            tokio::time::sleep(timeout).await;
            return Err(EnsayoError::WaitTimeout {
                condition: format!("load state {state}"),
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn wait_for_response(&self, url_fragment: &str, timeout: Duration) -> EnsayoResult<()> {
        let failing = self
            .state()
            .failing_endpoints
            .iter()
            .any(|endpoint| url_fragment.contains(endpoint.as_str()));
        if failing {
            return Err(EnsayoError::WaitTimeout {
                condition: format!("response matching {url_fragment}"),
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn screenshot(&self) -> EnsayoResult<Vec<u8>> {
        let bytes = self.state().screenshot_bytes.clone();
        if bytes.is_empty() {
            // Minimal PNG signature so saved artifacts look like images.
            return Ok(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        }
        Ok(bytes)
    }

    async fn expect_download(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        _timeout: Duration,
    ) -> EnsayoResult<PathBuf> {
        self.click(frame_path, selector, nth).await?;
        self.state()
            .downloads
            .pop_front()
            .ok_or_else(|| EnsayoError::Download {
                message: format!("no download triggered by {selector}"),
            })
    }

    async fn expect_downloads(
        &self,
        frame_path: &[String],
        selector: &str,
        nth: MatchIndex,
        count: usize,
        _timeout: Duration,
    ) -> EnsayoResult<Vec<PathBuf>> {
        self.click(frame_path, selector, nth).await?;
        let mut state = self.state();
        if state.downloads.len() < count {
            return Err(EnsayoError::Download {
                message: format!(
                    "expected {count} downloads, got {}",
                    state.downloads.len()
                ),
            });
        }
        Ok(state.downloads.drain(..count).collect())
    }

    async fn wait_for_popup(&self, timeout: Duration) -> EnsayoResult<Arc<dyn Driver>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(popup) = self.state().popup.clone() {
                return Ok(popup as Arc<dyn Driver>);
            }
            if Instant::now() >= deadline {
                return Err(EnsayoError::Page {
                    message: format!("no popup opened within {}ms", timeout.as_millis()),
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
