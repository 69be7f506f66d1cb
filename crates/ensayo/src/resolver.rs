//! Element resolution: from a [`Target`] to a concrete match handle.
//!
//! Resolution first counts the selector's matches inside the target's frame
//! scope. With at most one match the selector addresses it directly and any
//! configured occurrence is ignored; with several, the occurrence (default
//! 1, the second match) picks one and resolution waits for that match to be
//! attached before handing it out. Counting says nothing about visibility,
//! so the probes here exist for callers that need it.

use std::time::Duration;

use crate::context::ExecutionContext;
use crate::result::EnsayoResult;
use crate::target::Target;

/// Default wait for a disambiguated match to become attached.
pub const DEFAULT_ELEMENT_READY_TIMEOUT_MS: u64 = 30_000;

/// A resolved handle: the full frame scope, the selector, and the match
/// index when disambiguation applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    frame_path: Vec<String>,
    selector: String,
    index: Option<usize>,
}

impl ElementRef {
    /// Full frame scope of the match.
    #[must_use]
    pub fn frame_path(&self) -> &[String] {
        &self.frame_path
    }

    /// The selector addressing the match.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Match index among the selector's matches, `None` when the selector
    /// was unambiguous.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }
}

/// Resolve `target` inside `ctx` to a concrete handle.
///
/// `ready_timeout_ms` bounds the attachment wait when disambiguation
/// applies; the target's own timeout overrides it.
///
/// # Errors
///
/// Returns an error when the target is invalid, a frame on the path does
/// not exist, or a disambiguated match never attaches.
pub async fn resolve(
    ctx: &ExecutionContext,
    target: &Target,
    ready_timeout_ms: u64,
) -> EnsayoResult<ElementRef> {
    target.validate()?;
    let scope = ctx.scope_for(target.frame_path());
    let matches = ctx.driver().count(&scope, target.selector()).await?;

    if matches > 1 {
        let index = target.occurrence().unwrap_or(1);
        let timeout = Duration::from_millis(target.timeout_ms().unwrap_or(ready_timeout_ms));
        ctx.driver()
            .wait_for_attached(&scope, target.selector(), Some(index), timeout)
            .await?;
        return Ok(ElementRef {
            frame_path: scope,
            selector: target.selector().to_string(),
            index: Some(index),
        });
    }

    Ok(ElementRef {
        frame_path: scope,
        selector: target.selector().to_string(),
        index: None,
    })
}

/// Visibility probe for `target`. Any resolution or driver failure reads as
/// "not visible" so polling loops can keep going.
pub async fn is_visible(ctx: &ExecutionContext, target: &Target, ready_timeout_ms: u64) -> bool {
    let Ok(element) = resolve(ctx, target, ready_timeout_ms).await else {
        return false;
    };
    ctx.driver()
        .is_visible(element.frame_path(), element.selector(), element.index())
        .await
        .unwrap_or(false)
}

/// Enablement probe for `target`. Unlike visibility, failures propagate.
///
/// # Errors
///
/// Returns an error when resolution fails or the element is missing.
pub async fn is_enabled(
    ctx: &ExecutionContext,
    target: &Target,
    ready_timeout_ms: u64,
) -> EnsayoResult<bool> {
    let element = resolve(ctx, target, ready_timeout_ms).await?;
    ctx.driver()
        .is_enabled(element.frame_path(), element.selector(), element.index())
        .await
}

/// Disablement probe for `target`.
///
/// # Errors
///
/// Returns an error when resolution fails or the element is missing.
pub async fn is_disabled(
    ctx: &ExecutionContext,
    target: &Target,
    ready_timeout_ms: u64,
) -> EnsayoResult<bool> {
    let element = resolve(ctx, target, ready_timeout_ms).await?;
    ctx.driver()
        .is_disabled(element.frame_path(), element.selector(), element.index())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use crate::result::EnsayoError;
    use std::sync::Arc;

    fn setup() -> (Arc<MockDriver>, ExecutionContext) {
        let mock = Arc::new(MockDriver::new());
        let ctx = ExecutionContext::new(Arc::clone(&mock) as Arc<dyn crate::driver::Driver>);
        (mock, ctx)
    }

    mod resolve_tests {
        use super::*;

        #[tokio::test]
        async fn test_single_match_resolves_without_index() {
            let (mock, ctx) = setup();
            mock.add_element("#save", MockElement::new());
            let element = resolve(&ctx, &Target::new("#save"), 100).await.unwrap();
            assert_eq!(element.selector(), "#save");
            assert_eq!(element.index(), None);
        }

        #[tokio::test]
        async fn test_zero_matches_still_resolves() {
            let (_mock, ctx) = setup();
            let element = resolve(&ctx, &Target::new("#ghost"), 100).await.unwrap();
            assert_eq!(element.index(), None);
        }

        #[tokio::test]
        async fn test_single_match_ignores_occurrence() {
            let (mock, ctx) = setup();
            mock.add_element("#save", MockElement::new());
            let element = resolve(&ctx, &Target::new("#save").nth(4), 100)
                .await
                .unwrap();
            assert_eq!(element.index(), None);
        }

        #[tokio::test]
        async fn test_multiple_matches_default_to_second() {
            let (mock, ctx) = setup();
            mock.add_element("li.row", MockElement::new().with_count(3));
            let element = resolve(&ctx, &Target::new("li.row"), 100).await.unwrap();
            assert_eq!(element.index(), Some(1));
        }

        #[tokio::test]
        async fn test_multiple_matches_honor_explicit_occurrence() {
            let (mock, ctx) = setup();
            mock.add_element("li.row", MockElement::new().with_count(3));
            let element = resolve(&ctx, &Target::new("li.row").nth(2), 100)
                .await
                .unwrap();
            assert_eq!(element.index(), Some(2));
        }

        #[tokio::test]
        async fn test_occurrence_beyond_count_times_out() {
            let (mock, ctx) = setup();
            mock.add_element("li.row", MockElement::new().with_count(2));
            let err = resolve(&ctx, &Target::new("li.row").nth(5), 50)
                .await
                .unwrap_err();
            assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
        }

        #[tokio::test]
        async fn test_target_timeout_overrides_ready_timeout() {
            let (mock, ctx) = setup();
            mock.add_element("li.row", MockElement::new().with_count(2));
            let target = Target::new("li.row").nth(5).with_timeout(30);
            let start = std::time::Instant::now();
            let err = resolve(&ctx, &target, 60_000).await.unwrap_err();
            assert!(start.elapsed() < Duration::from_secs(5));
            assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
        }

        #[tokio::test]
        async fn test_missing_frame_fails_resolution() {
            let (_mock, ctx) = setup();
            let target = Target::new("#btn").in_frame("#layoutFrame");
            let err = resolve(&ctx, &target, 100).await.unwrap_err();
            assert!(matches!(err, EnsayoError::FrameNotFound { .. }));
        }

        #[tokio::test]
        async fn test_ambient_frame_scope_applies() {
            let (mock, ctx) = setup();
            mock.register_frame(&["#layoutFrame"]);
            mock.add_element_in(&["#layoutFrame"], "#btn", MockElement::new());
            let scoped = ctx.enter_frame("#layoutFrame");
            let element = resolve(&scoped, &Target::new("#btn"), 100).await.unwrap();
            assert_eq!(element.frame_path(), ["#layoutFrame"]);
        }

        #[tokio::test]
        async fn test_blank_selector_is_invalid() {
            let (_mock, ctx) = setup();
            let err = resolve(&ctx, &Target::new("   "), 100).await.unwrap_err();
            assert!(matches!(err, EnsayoError::InvalidTarget { .. }));
        }
    }

    mod probe_tests {
        use super::*;

        #[tokio::test]
        async fn test_is_visible_swallows_failures() {
            let (_mock, ctx) = setup();
            let target = Target::new("#btn").in_frame("#noSuchFrame");
            assert!(!is_visible(&ctx, &target, 100).await);
        }

        #[tokio::test]
        async fn test_is_visible_true_for_visible_element() {
            let (mock, ctx) = setup();
            mock.add_element("#save", MockElement::new());
            assert!(is_visible(&ctx, &Target::new("#save"), 100).await);
        }

        #[tokio::test]
        async fn test_is_enabled_propagates_missing_element() {
            let (_mock, ctx) = setup();
            assert!(is_enabled(&ctx, &Target::new("#ghost"), 100).await.is_err());
        }

        #[tokio::test]
        async fn test_is_disabled_reflects_state() {
            let (mock, ctx) = setup();
            mock.add_element("#save", MockElement::new().disabled());
            assert!(is_disabled(&ctx, &Target::new("#save"), 100)
                .await
                .unwrap());
            assert!(!is_enabled(&ctx, &Target::new("#save"), 100).await.unwrap());
        }
    }
}
