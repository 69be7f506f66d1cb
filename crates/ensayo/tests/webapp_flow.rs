//! End-to-end flows through the helper surface against the mock driver.
//!
//! These exercise the retry loop, element resolution, failure policies and
//! scenario artifacts the way feature steps use them.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ensayo::driver::{Driver, MockAction, MockDriver, MockElement};
use ensayo::prelude::*;
use ensayo::retry;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new().with_timeout(500).with_poll_interval(25)
}

fn webapp(mock: &Arc<MockDriver>) -> WebApp {
    WebApp::new(ExecutionContext::new(
        Arc::clone(mock) as Arc<dyn Driver>
    ))
    .with_retry_policy(fast_retry())
    .with_ready_timeout_ms(100)
}

// ============================================================================
// Retry loop behavior
// ============================================================================

#[tokio::test]
async fn test_retry_exhausts_budget_then_calls_on_timeout_once() {
    let attempts = AtomicUsize::new(0);
    let timeouts = AtomicUsize::new(0);
    let policy = RetryPolicy::new().with_timeout(120).with_poll_interval(30);

    let start = Instant::now();
    let outcome: EnsayoResult<Option<()>> = retry::retry_with_timeout(
        || {
            let _ = attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        },
        || {
            let _ = timeouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        policy,
    )
    .await;

    assert_eq!(outcome.unwrap(), None);
    assert!(attempts.load(Ordering::SeqCst) >= 1);
    assert_eq!(timeouts.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_retry_returns_on_nth_attempt_without_timeout() {
    let attempts = AtomicUsize::new(0);
    let timeouts = AtomicUsize::new(0);

    let outcome = retry::retry_with_timeout(
        || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok((n == 3).then_some(n)) }
        },
        || {
            let _ = timeouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        RetryPolicy::new().with_timeout(2000).with_poll_interval(10),
    )
    .await
    .unwrap();

    assert_eq!(outcome, Some(3));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(timeouts.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Visibility waits (timed elements)
// ============================================================================

#[tokio::test]
async fn test_wait_for_element_that_appears_within_budget() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element(
        "#spinner-done",
        MockElement::new().visible_after(Duration::from_millis(120)),
    );
    let web = webapp(&mock).with_retry_policy(
        RetryPolicy::new().with_timeout(1000).with_poll_interval(25),
    );
    web.wait_for_element_visible(&Target::new("#spinner-done"))
        .await
        .expect("element becomes visible inside the budget");
}

#[tokio::test]
async fn test_wait_for_never_visible_element_names_selector_after_budget() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("#stuck", MockElement::new().hidden());
    let web = webapp(&mock).with_retry_policy(
        RetryPolicy::new().with_timeout(200).with_poll_interval(25),
    );

    let start = Instant::now();
    let err = web
        .wait_for_element_visible(&Target::new("#stuck"))
        .await
        .unwrap_err();

    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(err.to_string().contains("#stuck"));
    assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
}

#[tokio::test]
async fn test_wait_for_disappearance_of_fading_element() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element(
        "#toast",
        MockElement::new().hidden_after(Duration::from_millis(100)),
    );
    let web = webapp(&mock);
    web.wait_for_element_to_disappear(&Target::new("#toast"))
        .await
        .expect("toast fades inside the budget");
}

#[tokio::test]
async fn test_wait_for_disappearance_of_sticky_element_times_out() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("#modal", MockElement::new());
    let err = webapp(&mock)
        .wait_for_element_to_disappear(&Target::new("#modal"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("#modal"));
}

// ============================================================================
// Resolution and disambiguation
// ============================================================================

#[tokio::test]
async fn test_ambiguous_selector_defaults_to_occurrence_one() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("button.confirm", MockElement::new().with_count(3));
    let web = webapp(&mock);

    web.click(&Target::new("button.confirm")).await.unwrap();

    assert_eq!(
        mock.actions(),
        vec![MockAction::Click {
            selector: "button.confirm".to_string(),
            nth: Some(1)
        }]
    );
}

#[tokio::test]
async fn test_unambiguous_selector_ignores_occurrence() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("#only", MockElement::new());
    let web = webapp(&mock);

    web.click(&Target::new("#only").nth(7)).await.unwrap();

    assert_eq!(
        mock.actions(),
        vec![MockAction::Click {
            selector: "#only".to_string(),
            nth: None
        }]
    );
}

#[tokio::test]
async fn test_frame_scoped_flow() {
    let mock = Arc::new(MockDriver::new());
    mock.register_frame(&["#layoutFrame"]);
    mock.register_frame(&["#layoutFrame", "#editorFrame"]);
    mock.add_element_in(
        &["#layoutFrame", "#editorFrame"],
        "#body",
        MockElement::new(),
    );
    let web = webapp(&mock);

    let target = Target::new("#body").in_frame("#layoutFrame | #editorFrame");
    web.type_text(&target, "hello").await.unwrap();

    assert_eq!(
        mock.actions(),
        vec![MockAction::Fill {
            selector: "#body".to_string(),
            text: "hello".to_string()
        }]
    );
}

// ============================================================================
// Failure policy
// ============================================================================

#[tokio::test]
async fn test_lenient_click_on_missing_selector_skips_without_raising() {
    let mock = Arc::new(MockDriver::new());
    let outcome = webapp(&mock)
        .click(&Target::new("#does-not-exist"))
        .await
        .expect("lenient policy never raises for best-effort actions");
    assert!(outcome.was_skipped());
    assert!(mock.actions().is_empty());
}

#[tokio::test]
async fn test_strict_click_on_missing_selector_raises() {
    let mock = Arc::new(MockDriver::new());
    let err = webapp(&mock)
        .with_policy(FailurePolicy::Strict)
        .click(&Target::new("#does-not-exist"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("#does-not-exist"));
}

#[tokio::test]
async fn test_lenient_flow_continues_past_skipped_action() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("#after", MockElement::new());
    let web = webapp(&mock);

    let skipped = web.click(&Target::new("#gone")).await.unwrap();
    let landed = web.click(&Target::new("#after")).await.unwrap();

    assert!(skipped.was_skipped());
    assert_eq!(landed, ActionOutcome::Completed);
    assert_eq!(mock.actions().len(), 1);
}

// ============================================================================
// Queries and existence checks
// ============================================================================

#[tokio::test]
async fn test_login_style_flow_reads_back_state() {
    let mock = Arc::new(MockDriver::with_url("https://app.example/login"));
    mock.add_element("input[name='username']", MockElement::new());
    mock.add_element("input[name='password']", MockElement::new());
    mock.add_element("button[type='submit']", MockElement::new());
    mock.add_element("#banner", MockElement::new().with_text("Welcome back"));
    let web = webapp(&mock);

    web.type_text(&Target::new("input[name='username']"), "admin")
        .await
        .unwrap();
    web.type_text(&Target::new("input[name='password']"), "secret")
        .await
        .unwrap();
    web.click(&Target::new("button[type='submit']")).await.unwrap();

    let banner = web.get_text(&Target::new("#banner")).await.unwrap();
    assert_eq!(banner.as_deref(), Some("Welcome back"));
    assert!(web.check_if_element_exists(&Target::new("#banner")).await);
    assert!(
        web.check_if_element_not_exists(&Target::new("#error"))
            .await
    );
}

#[tokio::test]
async fn test_table_contents_and_counts() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element(
        "td.amount",
        MockElement::new().with_texts(["10", "20", "30"]),
    );
    let web = webapp(&mock);

    assert_eq!(
        web.get_all_text_contents(&Target::new("td.amount"))
            .await
            .unwrap(),
        ["10", "20", "30"]
    );
    assert_eq!(
        web.get_elements_length(&Target::new("td.amount"))
            .await
            .unwrap(),
        3
    );
}

// ============================================================================
// Downloads, popups and scenario artifacts
// ============================================================================

#[tokio::test]
async fn test_download_flow() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("#export", MockElement::new());
    mock.script_download("/tmp/report.csv");
    let path = webapp(&mock)
        .download_file(&Target::new("#export"))
        .await
        .unwrap();
    assert!(path.ends_with("report.csv"));
}

#[tokio::test]
async fn test_popup_flow_carries_policies() {
    let mock = Arc::new(MockDriver::new());
    mock.add_element("#open-report", MockElement::new());
    let popup_driver = Arc::new(MockDriver::with_url("https://app.example/reports/42"));
    popup_driver.add_element("#summary", MockElement::new().with_text("Q3"));

    let web = webapp(&mock);
    let trigger = {
        let web = web.clone();
        let mock = Arc::clone(&mock);
        let popup_driver = Arc::clone(&popup_driver);
        async move {
            let outcome = web.click(&Target::new("#open-report")).await?;
            mock.script_popup(popup_driver);
            Ok(outcome)
        }
    };
    let popup = web
        .wait_for_window(trigger, "https://app.example/reports/42")
        .await
        .unwrap();
    let summary = popup.get_text(&Target::new("#summary")).await.unwrap();
    assert_eq!(summary.as_deref(), Some("Q3"));
}

#[tokio::test]
async fn test_failed_scenario_leaves_named_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockDriver::new());
    let mut scenario = Scenario::new("checkout fails", webapp(&mock), dir.path());

    let step_result: EnsayoResult<()> = Err(EnsayoError::Assertion {
        message: "cart total mismatch".to_string(),
    });
    let err = scenario.conclude(step_result).await.unwrap_err();

    assert!(matches!(err, EnsayoError::Assertion { .. }));
    assert_eq!(scenario.status(), ScenarioStatus::Failed);
    assert!(dir
        .path()
        .join("screenshots")
        .join("checkout_fails.png")
        .exists());
}

// ============================================================================
// Page objects over the helper surface
// ============================================================================

#[tokio::test]
async fn test_page_object_driven_flow() {
    let mock = Arc::new(MockDriver::with_url("https://app.example/login"));
    mock.add_element("input[name='username']", MockElement::new());
    mock.add_element("button[type='submit']", MockElement::new());

    let mut pages = PageRegistry::new();
    pages.register(
        "login",
        CatalogPage::new("login", "/login")
            .with_target("username", Target::new("input[name='username']"))
            .with_target("submit", Target::new("button[type='submit']"))
            .with_ready_marker("submit"),
    );

    let web = webapp(&mock);
    let url = web.get_current_url().await.unwrap();
    let page = pages.page_for_url(&url).expect("login page matches URL");

    web.wait_for_element_visible(page.ready_target().unwrap())
        .await
        .unwrap();
    web.type_text(page.target("username").unwrap(), "admin")
        .await
        .unwrap();
    web.click(page.target("submit").unwrap()).await.unwrap();

    assert_eq!(mock.actions().len(), 2);
}

// ============================================================================
// Config-driven surfaces
// ============================================================================

#[tokio::test]
async fn test_config_builds_strict_surface() {
    let mock = Arc::new(MockDriver::new());
    let config = EnsayoConfig {
        failure_policy: FailurePolicy::Strict,
        timeout_ms: 100,
        poll_interval_ms: 20,
        element_ready_timeout_ms: 50,
        ..Default::default()
    };
    let web = config.webapp(ExecutionContext::new(
        Arc::clone(&mock) as Arc<dyn Driver>
    ));
    assert!(web.click(&Target::new("#ghost")).await.is_err());
}
