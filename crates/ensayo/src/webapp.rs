//! The high-level helper surface test steps call.
//!
//! A [`WebApp`] wraps an [`ExecutionContext`] with a retry policy and a
//! failure policy. Queries and waits run under the bounded-retry loop from
//! [`crate::retry`]; a small set of historically best-effort actions
//! (clicking, typing, clearing, uploading) consult the failure policy and
//! under [`FailurePolicy::Lenient`] log their failure and report
//! [`ActionOutcome::Skipped`] instead of erroring. Waits and assertions
//! always propagate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::resolver::{self, ElementRef, DEFAULT_ELEMENT_READY_TIMEOUT_MS};
use crate::result::{EnsayoError, EnsayoResult};
use crate::retry::{self, RetryPolicy};
use crate::target::Target;
use crate::wait::LoadState;

/// What a best-effort action does when the underlying driver call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and continue the scenario
    #[default]
    Lenient,
    /// Propagate the failure to the caller
    Strict,
}

/// Result of a best-effort action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action ran
    Completed,
    /// The action failed and the lenient policy skipped it
    Skipped {
        /// The failure that was skipped
        reason: String,
    },
}

impl ActionOutcome {
    /// True when the action was skipped under the lenient policy.
    #[must_use]
    pub const fn was_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Helper surface over one page (or popup).
#[derive(Debug, Clone)]
pub struct WebApp {
    ctx: ExecutionContext,
    policy: FailurePolicy,
    retry: RetryPolicy,
    ready_timeout_ms: u64,
}

impl WebApp {
    /// A helper surface with default retry and lenient failure policy.
    #[must_use]
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            policy: FailurePolicy::default(),
            retry: RetryPolicy::default(),
            ready_timeout_ms: DEFAULT_ELEMENT_READY_TIMEOUT_MS,
        }
    }

    /// Set the failure policy for best-effort actions.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the retry policy for queries and waits.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the attachment wait applied before acting on an element.
    #[must_use]
    pub const fn with_ready_timeout_ms(mut self, ms: u64) -> Self {
        self.ready_timeout_ms = ms;
        self
    }

    /// The execution context this surface operates on.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// A surface scoped into `frame_selector`, keeping policies.
    #[must_use]
    pub fn in_frame(&self, frame_selector: impl Into<String>) -> Self {
        Self {
            ctx: self.ctx.enter_frame(frame_selector),
            ..self.clone()
        }
    }

    fn wait_policy_for(&self, target: &Target) -> RetryPolicy {
        match target.timeout_ms() {
            Some(ms) => self.retry.with_timeout(ms),
            None => self.retry,
        }
    }

    /// Resolve `target` and wait for the addressed match to be attached.
    async fn acquire(&self, target: &Target) -> EnsayoResult<ElementRef> {
        let element = resolver::resolve(&self.ctx, target, self.ready_timeout_ms).await?;
        let timeout = target.timeout_ms().unwrap_or(self.ready_timeout_ms);
        self.ctx
            .driver()
            .wait_for_attached(
                element.frame_path(),
                element.selector(),
                element.index(),
                std::time::Duration::from_millis(timeout),
            )
            .await?;
        Ok(element)
    }

    /// Apply the failure policy to a best-effort action result.
    fn settle(
        &self,
        action: &str,
        target: &Target,
        result: EnsayoResult<()>,
    ) -> EnsayoResult<ActionOutcome> {
        match result {
            Ok(()) => Ok(ActionOutcome::Completed),
            Err(err) => match self.policy {
                FailurePolicy::Strict => Err(err),
                FailurePolicy::Lenient => {
                    tracing::error!(
                        action,
                        selector = target.selector(),
                        error = %err,
                        "action skipped"
                    );
                    Ok(ActionOutcome::Skipped {
                        reason: err.to_string(),
                    })
                }
            },
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate to `url` and wait for the page to load.
    ///
    /// # Errors
    ///
    /// Returns an error when navigation itself fails; load-state waits
    /// after it are logged, not raised.
    pub async fn goto(&self, url: &str) -> EnsayoResult<()> {
        tracing::info!(url, "navigating");
        self.ctx.driver().goto(url).await?;
        self.wait_until_page_is_loaded().await
    }

    /// Current page URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the driver cannot report the URL.
    pub async fn get_current_url(&self) -> EnsayoResult<String> {
        self.ctx.driver().current_url().await
    }

    /// Wait for `load` and then network idle, logging (never raising) when
    /// either wait times out.
    ///
    /// # Errors
    ///
    /// Never fails on load-state timeouts; only unexpected driver faults
    /// under the strict policy propagate.
    pub async fn wait_until_page_is_loaded(&self) -> EnsayoResult<()> {
        for state in [LoadState::Load, LoadState::NetworkIdle] {
            let timeout = std::time::Duration::from_millis(state.default_timeout_ms());
            if let Err(err) = self.ctx.driver().wait_for_load_state(state, timeout).await {
                tracing::warn!(state = %state, error = %err, "page load wait timed out");
            }
        }
        Ok(())
    }

    /// Run `trigger` and wait for a response from each of `endpoints`
    /// (matched by URL fragment). Response subscriptions start on their
    /// own tasks before the trigger is awaited, so responses raced with
    /// the trigger are not missed.
    ///
    /// # Errors
    ///
    /// A failed trigger propagates. Under the strict policy a missing
    /// response propagates; under the lenient policy it is logged and the
    /// remaining endpoints are still awaited.
    pub async fn wait_for_api_calls<T, F>(&self, endpoints: &[&str], trigger: F) -> EnsayoResult<T>
    where
        F: std::future::Future<Output = EnsayoResult<T>>,
    {
        tracing::info!(?endpoints, "waiting for API calls");
        let mut waits = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let driver = Arc::clone(self.ctx.driver());
            let endpoint = (*endpoint).to_string();
            let timeout = self.retry.timeout();
            waits.push((
                endpoint.clone(),
                tokio::spawn(async move { driver.wait_for_response(&endpoint, timeout).await }),
            ));
        }
        let value = match trigger.await {
            Ok(value) => value,
            Err(err) => {
                for (_, wait) in waits {
                    wait.abort();
                }
                return Err(err);
            }
        };
        for (endpoint, wait) in waits {
            let result = match wait.await {
                Ok(result) => result,
                Err(join_err) => Err(EnsayoError::Page {
                    message: join_err.to_string(),
                }),
            };
            if let Err(err) = result {
                match self.policy {
                    FailurePolicy::Strict => return Err(err),
                    FailurePolicy::Lenient => {
                        tracing::error!(endpoint, error = %err, "response wait failed");
                    }
                }
            }
        }
        Ok(value)
    }

    /// Run `trigger`, wait for the popup window it opens, and return a
    /// helper surface bound to it. The popup wait is polled ahead of the
    /// trigger, so a popup opened mid-trigger is still observed.
    ///
    /// Once the popup has loaded its URL must equal `expected_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the trigger fails, no popup opens in time,
    /// or the popup URL differs from the expected one.
    pub async fn wait_for_window<T, F>(&self, trigger: F, expected_url: &str) -> EnsayoResult<Self>
    where
        F: std::future::Future<Output = EnsayoResult<T>>,
    {
        let (popup, triggered) = tokio::join!(
            self.ctx.driver().wait_for_popup(self.retry.timeout()),
            trigger,
        );
        triggered?;
        let window = Self {
            ctx: ExecutionContext::for_driver(popup?),
            ..self.clone()
        };
        window.wait_until_page_is_loaded().await?;
        let url = window.get_current_url().await?;
        if url != expected_url {
            return Err(EnsayoError::Assertion {
                message: format!("popup URL is {url}, expected {expected_url}"),
            });
        }
        Ok(window)
    }

    // ------------------------------------------------------------------
    // Best-effort actions
    // ------------------------------------------------------------------

    /// Click `target`.
    ///
    /// # Errors
    ///
    /// Under the strict policy any failure propagates; under the lenient
    /// policy failures are logged and reported as skipped.
    pub async fn click(&self, target: &Target) -> EnsayoResult<ActionOutcome> {
        let result = async {
            let element = self.acquire(target).await?;
            self.ctx
                .driver()
                .click(element.frame_path(), element.selector(), element.index())
                .await
        }
        .await;
        self.settle("click", target, result)
    }

    /// Double-click `target`.
    ///
    /// # Errors
    ///
    /// Same policy behavior as [`WebApp::click`].
    pub async fn double_click(&self, target: &Target) -> EnsayoResult<ActionOutcome> {
        let result = async {
            let element = self.acquire(target).await?;
            self.ctx
                .driver()
                .double_click(element.frame_path(), element.selector(), element.index())
                .await
        }
        .await;
        self.settle("double_click", target, result)
    }

    /// Click the element whose trimmed text equals `text`.
    ///
    /// # Errors
    ///
    /// Same policy behavior as [`WebApp::click`].
    pub async fn click_using_text(&self, text: &str) -> EnsayoResult<ActionOutcome> {
        self.click(&Target::text(text)).await
    }

    /// Clear the input addressed by `target`.
    ///
    /// # Errors
    ///
    /// Same policy behavior as [`WebApp::click`].
    pub async fn clear(&self, target: &Target) -> EnsayoResult<ActionOutcome> {
        let result = async {
            let element = self.acquire(target).await?;
            self.ctx
                .driver()
                .clear(element.frame_path(), element.selector(), element.index())
                .await
        }
        .await;
        self.settle("clear", target, result)
    }

    /// Replace the value of the input addressed by `target` with `text`.
    ///
    /// # Errors
    ///
    /// Same policy behavior as [`WebApp::click`].
    pub async fn type_text(&self, target: &Target, text: &str) -> EnsayoResult<ActionOutcome> {
        let result = async {
            let element = self.acquire(target).await?;
            self.ctx
                .driver()
                .fill(element.frame_path(), element.selector(), element.index(), text)
                .await
        }
        .await;
        self.settle("type_text", target, result)
    }

    /// Attach the file at `path` to the input addressed by `target`.
    ///
    /// # Errors
    ///
    /// Same policy behavior as [`WebApp::click`].
    pub async fn upload_file(&self, target: &Target, path: &Path) -> EnsayoResult<ActionOutcome> {
        let result = async {
            let element = self.acquire(target).await?;
            self.ctx
                .driver()
                .set_input_files(
                    element.frame_path(),
                    element.selector(),
                    element.index(),
                    path,
                )
                .await
        }
        .await;
        self.settle("upload_file", target, result)
    }

    // ------------------------------------------------------------------
    // Strict actions
    // ------------------------------------------------------------------

    /// Hover over `target`.
    ///
    /// # Errors
    ///
    /// Failures always propagate.
    pub async fn hover(&self, target: &Target) -> EnsayoResult<()> {
        let element = self.acquire(target).await?;
        self.ctx
            .driver()
            .hover(element.frame_path(), element.selector())
            .await
    }

    /// Focus `target`.
    ///
    /// # Errors
    ///
    /// Failures always propagate.
    pub async fn focus(&self, target: &Target) -> EnsayoResult<()> {
        let element = self.acquire(target).await?;
        self.ctx
            .driver()
            .focus(element.frame_path(), element.selector())
            .await
    }

    /// Scroll `target` into view.
    ///
    /// # Errors
    ///
    /// Failures always propagate.
    pub async fn scroll_into_view(&self, target: &Target) -> EnsayoResult<()> {
        let element = self.acquire(target).await?;
        self.ctx
            .driver()
            .scroll_into_view(element.frame_path(), element.selector())
            .await
    }

    /// Select `option` (by value or label) in the dropdown at `target`.
    ///
    /// # Errors
    ///
    /// Failures always propagate.
    pub async fn select_dropdown_option(
        &self,
        target: &Target,
        option: &str,
    ) -> EnsayoResult<()> {
        let element = self.acquire(target).await?;
        self.ctx
            .driver()
            .select_option(
                element.frame_path(),
                element.selector(),
                element.index(),
                option,
            )
            .await
    }

    /// Type `text` through the keyboard into the focused element.
    ///
    /// # Errors
    ///
    /// Failures always propagate.
    pub async fn keyboard_type(&self, text: &str) -> EnsayoResult<()> {
        self.ctx
            .driver()
            .type_text(self.ctx.frame_path(), text)
            .await
    }

    /// Press a single key (e.g. `"Enter"`).
    ///
    /// # Errors
    ///
    /// Failures always propagate.
    pub async fn press_key(&self, key: &str) -> EnsayoResult<()> {
        self.ctx.driver().press_key(self.ctx.frame_path(), key).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Text content of `target`, read once the element is visible and
    /// enabled. Empty text is returned as-is, not treated as a failure.
    ///
    /// # Errors
    ///
    /// Raises [`EnsayoError::WaitTimeout`] naming the selector when the
    /// element never becomes visible within the retry budget.
    pub async fn get_text(&self, target: &Target) -> EnsayoResult<Option<String>> {
        self.wait_for_element_visible(target).await?;
        self.is_element_enabled(target).await?;
        let element = resolver::resolve(&self.ctx, target, self.ready_timeout_ms).await?;
        self.ctx
            .driver()
            .text_content(element.frame_path(), element.selector(), element.index())
            .await
    }

    /// Text contents of every match of `target`, retried until at least
    /// one match exists.
    ///
    /// # Errors
    ///
    /// Raises [`EnsayoError::WaitTimeout`] naming the selector when no
    /// match appears within the retry budget.
    pub async fn get_all_text_contents(&self, target: &Target) -> EnsayoResult<Vec<String>> {
        let ctx = &self.ctx;
        let result = retry::retry_with_timeout(
            || async move {
                let scope = ctx.scope_for(target.frame_path());
                let texts = ctx
                    .driver()
                    .all_text_contents(&scope, target.selector())
                    .await?;
                Ok((!texts.is_empty()).then_some(texts))
            },
            || {
                Err(EnsayoError::WaitTimeout {
                    condition: format!("no matches for {}", target.selector()),
                    ms: self.wait_policy_for(target).timeout_ms,
                })
            },
            self.wait_policy_for(target),
        )
        .await?;
        Ok(result.unwrap_or_default())
    }

    /// Inner texts of every match of `target`, retried until at least one
    /// match exists.
    ///
    /// # Errors
    ///
    /// Raises [`EnsayoError::WaitTimeout`] naming the selector when no
    /// match appears within the retry budget.
    pub async fn get_all_inner_texts(&self, target: &Target) -> EnsayoResult<Vec<String>> {
        let ctx = &self.ctx;
        let result = retry::retry_with_timeout(
            || async move {
                let scope = ctx.scope_for(target.frame_path());
                let texts = ctx
                    .driver()
                    .all_inner_texts(&scope, target.selector())
                    .await?;
                Ok((!texts.is_empty()).then_some(texts))
            },
            || {
                Err(EnsayoError::WaitTimeout {
                    condition: format!("no matches for {}", target.selector()),
                    ms: self.wait_policy_for(target).timeout_ms,
                })
            },
            self.wait_policy_for(target),
        )
        .await?;
        Ok(result.unwrap_or_default())
    }

    /// Value of attribute `name` on `target`, retried until present.
    ///
    /// # Errors
    ///
    /// Raises [`EnsayoError::WaitTimeout`] naming the selector when the
    /// attribute never appears within the retry budget.
    pub async fn get_attribute_value(
        &self,
        target: &Target,
        name: &str,
    ) -> EnsayoResult<Option<String>> {
        let ctx = &self.ctx;
        let ready = self.ready_timeout_ms;
        retry::retry_with_timeout(
            || async move {
                let element = resolver::resolve(ctx, target, ready).await?;
                ctx.driver()
                    .attribute(element.frame_path(), element.selector(), element.index(), name)
                    .await
            },
            || {
                Err(EnsayoError::WaitTimeout {
                    condition: format!("element {} has no attribute {name}", target.selector()),
                    ms: self.wait_policy_for(target).timeout_ms,
                })
            },
            self.wait_policy_for(target),
        )
        .await
    }

    /// Number of matches for `target`, counted once without retry.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame scope cannot be descended.
    pub async fn get_elements_length(&self, target: &Target) -> EnsayoResult<usize> {
        let scope = self.ctx.scope_for(target.frame_path());
        self.ctx.driver().count(&scope, target.selector()).await
    }

    // ------------------------------------------------------------------
    // Existence and state probes
    // ------------------------------------------------------------------

    /// Whether at least one match for `target` exists right now. A single
    /// count without retry; lookup failures read as "does not exist".
    pub async fn check_if_element_exists(&self, target: &Target) -> bool {
        let scope = self.ctx.scope_for(target.frame_path());
        match self.ctx.driver().count(&scope, target.selector()).await {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::debug!(selector = target.selector(), error = %err, "existence check failed");
                false
            }
        }
    }

    /// Whether `target` has no matches right now. A single count without
    /// retry; lookup failures read as "still exists".
    pub async fn check_if_element_not_exists(&self, target: &Target) -> bool {
        let scope = self.ctx.scope_for(target.frame_path());
        match self.ctx.driver().count(&scope, target.selector()).await {
            Ok(count) => count == 0,
            Err(err) => {
                tracing::debug!(selector = target.selector(), error = %err, "absence check failed");
                false
            }
        }
    }

    /// Whether an element with trimmed text `text` exists right now.
    pub async fn element_exists_by_text(&self, text: &str) -> bool {
        self.check_if_element_exists(&Target::text(text)).await
    }

    /// Single-shot visibility probe; failures read as "not visible".
    pub async fn is_element_visible(&self, target: &Target) -> bool {
        resolver::is_visible(&self.ctx, target, self.ready_timeout_ms).await
    }

    /// Single-shot enablement probe.
    ///
    /// # Errors
    ///
    /// Returns an error when the element is missing or resolution fails.
    pub async fn is_element_enabled(&self, target: &Target) -> EnsayoResult<bool> {
        resolver::is_enabled(&self.ctx, target, self.ready_timeout_ms).await
    }

    /// Single-shot disablement probe.
    ///
    /// # Errors
    ///
    /// Returns an error when the element is missing or resolution fails.
    pub async fn is_element_disabled(&self, target: &Target) -> EnsayoResult<bool> {
        resolver::is_disabled(&self.ctx, target, self.ready_timeout_ms).await
    }

    // ------------------------------------------------------------------
    // Visibility waits
    // ------------------------------------------------------------------

    /// Wait until `target` is visible.
    ///
    /// # Errors
    ///
    /// Raises [`EnsayoError::WaitTimeout`] naming the selector.
    pub async fn wait_for_element_visible(&self, target: &Target) -> EnsayoResult<()> {
        let ctx = &self.ctx;
        let ready = self.ready_timeout_ms;
        retry::wait_until(
            || async move { resolver::is_visible(ctx, target, ready).await },
            format!("element {} is not visible", target.selector()),
            self.wait_policy_for(target),
        )
        .await
    }

    /// Wait until `target` is no longer visible.
    ///
    /// # Errors
    ///
    /// Raises [`EnsayoError::WaitTimeout`] naming the selector.
    pub async fn wait_for_element_to_disappear(&self, target: &Target) -> EnsayoResult<()> {
        let ctx = &self.ctx;
        let ready = self.ready_timeout_ms;
        retry::wait_until(
            || async move { !resolver::is_visible(ctx, target, ready).await },
            format!("element {} did not disappear", target.selector()),
            self.wait_policy_for(target),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Artifacts
    // ------------------------------------------------------------------

    /// Capture a screenshot and write it to `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error when capture or the write fails.
    pub async fn save_screenshot(&self, path: &Path) -> EnsayoResult<()> {
        let bytes = self.ctx.driver().screenshot().await?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        tracing::info!(path = %path.display(), "screenshot saved");
        Ok(())
    }

    /// Click `target` and capture the download it triggers.
    ///
    /// # Errors
    ///
    /// Returns an error when the click fails or no download completes in
    /// time.
    pub async fn download_file(&self, target: &Target) -> EnsayoResult<PathBuf> {
        let element = self.acquire(target).await?;
        self.ctx
            .driver()
            .expect_download(
                element.frame_path(),
                element.selector(),
                element.index(),
                self.retry.timeout(),
            )
            .await
    }

    /// Click `target` and capture `count` downloads.
    ///
    /// # Errors
    ///
    /// Returns an error when the click fails or fewer than `count`
    /// downloads complete in time.
    pub async fn download_multiple_files(
        &self,
        target: &Target,
        count: usize,
    ) -> EnsayoResult<Vec<PathBuf>> {
        let element = self.acquire(target).await?;
        self.ctx
            .driver()
            .expect_downloads(
                element.frame_path(),
                element.selector(),
                element.index(),
                count,
                self.retry.timeout(),
            )
            .await
    }
}

/// Convenience constructor from a bare driver.
impl From<Arc<dyn crate::driver::Driver>> for WebApp {
    fn from(driver: Arc<dyn crate::driver::Driver>) -> Self {
        Self::new(ExecutionContext::new(driver))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{Driver, MockAction, MockDriver, MockElement};
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new().with_timeout(100).with_poll_interval(10)
    }

    fn app(mock: &Arc<MockDriver>) -> WebApp {
        WebApp::new(ExecutionContext::new(
            Arc::clone(mock) as Arc<dyn Driver>
        ))
        .with_retry_policy(fast_retry())
        .with_ready_timeout_ms(50)
    }

    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_present_element() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#save", MockElement::new());
            let outcome = app(&mock).click(&Target::new("#save")).await.unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
            assert_eq!(
                mock.actions(),
                vec![MockAction::Click {
                    selector: "#save".to_string(),
                    nth: None
                }]
            );
        }

        #[tokio::test]
        async fn test_click_ambiguous_element_uses_second_match() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("li.row", MockElement::new().with_count(3));
            let outcome = app(&mock).click(&Target::new("li.row")).await.unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
            assert_eq!(
                mock.actions(),
                vec![MockAction::Click {
                    selector: "li.row".to_string(),
                    nth: Some(1)
                }]
            );
        }

        #[tokio::test]
        async fn test_lenient_click_on_missing_element_is_skipped() {
            let mock = Arc::new(MockDriver::new());
            let outcome = app(&mock).click(&Target::new("#ghost")).await.unwrap();
            assert!(outcome.was_skipped());
            assert!(mock.actions().is_empty());
        }

        #[tokio::test]
        async fn test_strict_click_on_missing_element_propagates() {
            let mock = Arc::new(MockDriver::new());
            let err = app(&mock)
                .with_policy(FailurePolicy::Strict)
                .click(&Target::new("#ghost"))
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
        }

        #[tokio::test]
        async fn test_type_text_fills_input() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#user", MockElement::new());
            let outcome = app(&mock)
                .type_text(&Target::new("#user"), "admin")
                .await
                .unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
            assert_eq!(
                mock.actions(),
                vec![MockAction::Fill {
                    selector: "#user".to_string(),
                    text: "admin".to_string()
                }]
            );
        }

        #[tokio::test]
        async fn test_click_using_text_builds_text_target() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("text=\"Submit\"", MockElement::new());
            let outcome = app(&mock).click_using_text("Submit").await.unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
        }

        #[tokio::test]
        async fn test_strict_hover_on_missing_element_fails() {
            let mock = Arc::new(MockDriver::new());
            assert!(app(&mock).hover(&Target::new("#ghost")).await.is_err());
        }

        #[tokio::test]
        async fn test_select_dropdown_option() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#country", MockElement::new());
            app(&mock)
                .select_dropdown_option(&Target::new("#country"), "NL")
                .await
                .unwrap();
            assert_eq!(
                mock.actions(),
                vec![MockAction::SelectOption {
                    selector: "#country".to_string(),
                    option: "NL".to_string()
                }]
            );
        }
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_get_text_returns_text() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#title", MockElement::new().with_text("Dashboard"));
            let text = app(&mock).get_text(&Target::new("#title")).await.unwrap();
            assert_eq!(text, Some("Dashboard".to_string()));
        }

        #[tokio::test]
        async fn test_get_text_returns_empty_text_as_is() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#title", MockElement::new().with_text(""));
            let text = app(&mock).get_text(&Target::new("#title")).await.unwrap();
            assert_eq!(text, Some(String::new()));
        }

        #[tokio::test]
        async fn test_get_text_waits_for_visibility() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element(
                "#late",
                MockElement::new()
                    .with_text("loaded")
                    .visible_after(Duration::from_millis(40)),
            );
            let text = app(&mock).get_text(&Target::new("#late")).await.unwrap();
            assert_eq!(text, Some("loaded".to_string()));
        }

        #[tokio::test]
        async fn test_get_text_on_hidden_element_times_out() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#hidden", MockElement::new().hidden().with_text("secret"));
            let err = app(&mock)
                .get_text(&Target::new("#hidden"))
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
            assert!(err.to_string().contains("#hidden"));
        }

        #[tokio::test]
        async fn test_get_all_text_contents() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("td.name", MockElement::new().with_texts(["a", "b"]));
            let texts = app(&mock)
                .get_all_text_contents(&Target::new("td.name"))
                .await
                .unwrap();
            assert_eq!(texts, ["a", "b"]);
        }

        #[tokio::test]
        async fn test_get_elements_length_is_unretried() {
            let mock = Arc::new(MockDriver::new());
            assert_eq!(
                app(&mock)
                    .get_elements_length(&Target::new("#ghost"))
                    .await
                    .unwrap(),
                0
            );
        }

        #[tokio::test]
        async fn test_get_attribute_value() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element(
                "#save",
                MockElement::new().with_attribute("data-state", "ready"),
            );
            let value = app(&mock)
                .get_attribute_value(&Target::new("#save"), "data-state")
                .await
                .unwrap();
            assert_eq!(value, Some("ready".to_string()));
        }
    }

    mod existence_tests {
        use super::*;

        #[tokio::test]
        async fn test_check_if_element_exists() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#save", MockElement::new());
            let helper = app(&mock);
            assert!(helper.check_if_element_exists(&Target::new("#save")).await);
            assert!(!helper.check_if_element_exists(&Target::new("#ghost")).await);
        }

        #[tokio::test]
        async fn test_check_if_element_not_exists_is_proper_negation() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#save", MockElement::new());
            let helper = app(&mock);
            assert!(
                helper
                    .check_if_element_not_exists(&Target::new("#ghost"))
                    .await
            );
            assert!(
                !helper
                    .check_if_element_not_exists(&Target::new("#save"))
                    .await
            );
        }

        #[tokio::test]
        async fn test_element_exists_by_text() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("text=\"Welcome\"", MockElement::new());
            assert!(app(&mock).element_exists_by_text("Welcome").await);
        }

        #[tokio::test]
        async fn test_existence_checks_answer_without_burning_the_retry_budget() {
            let mock = Arc::new(MockDriver::new());
            // Default 60s retry budget; a single count must answer at once.
            let helper = WebApp::from(Arc::clone(&mock) as Arc<dyn Driver>);
            let started = std::time::Instant::now();
            assert!(!helper.check_if_element_exists(&Target::new("#ghost")).await);
            assert!(
                helper
                    .check_if_element_not_exists(&Target::new("#ghost"))
                    .await
            );
            assert!(started.elapsed() < Duration::from_secs(1));
        }
    }

    mod wait_tests {
        use super::*;

        #[tokio::test]
        async fn test_wait_for_element_visible_sees_late_element() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element(
                "#late",
                MockElement::new().visible_after(Duration::from_millis(40)),
            );
            app(&mock)
                .wait_for_element_visible(&Target::new("#late"))
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_wait_for_element_visible_timeout_names_selector() {
            let mock = Arc::new(MockDriver::new());
            let err = app(&mock)
                .wait_for_element_visible(&Target::new("#never"))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("#never"));
        }

        #[tokio::test]
        async fn test_wait_for_element_to_disappear() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element(
                "#toast",
                MockElement::new().hidden_after(Duration::from_millis(40)),
            );
            app(&mock)
                .wait_for_element_to_disappear(&Target::new("#toast"))
                .await
                .unwrap();
        }
    }

    mod frame_tests {
        use super::*;

        #[tokio::test]
        async fn test_in_frame_scopes_lookups() {
            let mock = Arc::new(MockDriver::new());
            mock.register_frame(&["#layoutFrame"]);
            mock.add_element_in(&["#layoutFrame"], "#btn", MockElement::new());
            let outcome = app(&mock)
                .in_frame("#layoutFrame")
                .click(&Target::new("#btn"))
                .await
                .unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
        }

        #[tokio::test]
        async fn test_target_frame_path_from_composite_selector() {
            let mock = Arc::new(MockDriver::new());
            mock.register_frame(&["#outer", "#inner"]);
            mock.add_element_in(&["#outer", "#inner"], "#btn", MockElement::new());
            let target = Target::new("#btn").in_frame("#outer | #inner");
            let outcome = app(&mock).click(&target).await.unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
        }
    }

    mod window_tests {
        use super::*;

        fn noop_trigger() -> impl std::future::Future<Output = EnsayoResult<()>> {
            async { Ok(()) }
        }

        #[tokio::test]
        async fn test_wait_for_window_matching_url() {
            let mock = Arc::new(MockDriver::new());
            mock.script_popup(Arc::new(MockDriver::with_url(
                "https://app.example/reports",
            )));
            let popup = app(&mock)
                .wait_for_window(noop_trigger(), "https://app.example/reports")
                .await
                .unwrap();
            assert_eq!(
                popup.get_current_url().await.unwrap(),
                "https://app.example/reports"
            );
        }

        #[tokio::test]
        async fn test_wait_for_window_observes_popup_opened_by_trigger() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#open-report", MockElement::new());
            let helper = app(&mock);
            let trigger = {
                let mock = Arc::clone(&mock);
                let helper = helper.clone();
                async move {
                    let outcome = helper.click(&Target::new("#open-report")).await?;
                    mock.script_popup(Arc::new(MockDriver::with_url(
                        "https://app.example/reports",
                    )));
                    Ok(outcome)
                }
            };
            let popup = helper
                .wait_for_window(trigger, "https://app.example/reports")
                .await
                .unwrap();
            assert_eq!(
                popup.get_current_url().await.unwrap(),
                "https://app.example/reports"
            );
        }

        #[tokio::test]
        async fn test_wait_for_window_url_mismatch_is_assertion() {
            let mock = Arc::new(MockDriver::new());
            mock.script_popup(Arc::new(MockDriver::with_url("https://app.example/other")));
            let err = app(&mock)
                .wait_for_window(noop_trigger(), "https://app.example/reports")
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::Assertion { .. }));
        }

        #[tokio::test]
        async fn test_wait_for_window_requires_exact_url() {
            let mock = Arc::new(MockDriver::new());
            mock.script_popup(Arc::new(MockDriver::with_url(
                "https://app.example/reports?tab=1",
            )));
            let err = app(&mock)
                .wait_for_window(noop_trigger(), "https://app.example/reports")
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::Assertion { .. }));
        }

        #[tokio::test]
        async fn test_wait_for_window_propagates_trigger_failure() {
            let mock = Arc::new(MockDriver::new());
            mock.script_popup(Arc::new(MockDriver::with_url(
                "https://app.example/reports",
            )));
            let err = app(&mock)
                .wait_for_window(
                    async {
                        Err::<(), _>(EnsayoError::Action {
                            selector: "#open-report".to_string(),
                            message: "click rejected".to_string(),
                        })
                    },
                    "https://app.example/reports",
                )
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::Action { .. }));
        }
    }

    mod api_call_tests {
        use super::*;

        #[tokio::test]
        async fn test_wait_for_api_calls_returns_trigger_value() {
            let mock = Arc::new(MockDriver::new());
            mock.add_element("#refresh", MockElement::new());
            let helper = app(&mock);
            let trigger = {
                let helper = helper.clone();
                async move { helper.click(&Target::new("#refresh")).await }
            };
            let outcome = helper
                .wait_for_api_calls(&["/api/orders", "/api/totals"], trigger)
                .await
                .unwrap();
            assert_eq!(outcome, ActionOutcome::Completed);
        }

        #[tokio::test]
        async fn test_wait_for_api_calls_strict_propagates_missing_response() {
            let mock = Arc::new(MockDriver::new());
            mock.fail_endpoint("/api/orders");
            let err = app(&mock)
                .with_policy(FailurePolicy::Strict)
                .wait_for_api_calls(&["/api/orders"], async { Ok(()) })
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
        }

        #[tokio::test]
        async fn test_wait_for_api_calls_lenient_continues_past_missing_response() {
            let mock = Arc::new(MockDriver::new());
            mock.fail_endpoint("/api/orders");
            app(&mock)
                .wait_for_api_calls(&["/api/orders", "/api/totals"], async { Ok(()) })
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_wait_for_api_calls_propagates_trigger_failure() {
            let mock = Arc::new(MockDriver::new());
            let err = app(&mock)
                .wait_for_api_calls(&["/api/orders"], async {
                    Err::<(), _>(EnsayoError::Assertion {
                        message: "precondition failed".to_string(),
                    })
                })
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::Assertion { .. }));
        }
    }
}
