//! # Ensayo
//!
//! Browser UI test-automation helpers: bounded-retry waits, deterministic
//! element resolution across nested frames, and a high-level action surface
//! for writing end-to-end scenarios.
//!
//! ## Core pieces
//!
//! - [`Target`]: where an element lives (selector, frame path, occurrence)
//! - [`retry`]: the do-while bounded polling loop every wait runs under
//! - [`resolver`]: from a target to a concrete match, with ambiguity
//!   handled by occurrence indexing
//! - [`WebApp`]: the helper surface test steps call
//! - [`Scenario`]: per-test lifecycle with failure screenshots
//!
//! Real browser control over CDP sits behind the `browser` feature; the
//! default build ships [`driver::MockDriver`] so the whole surface is
//! testable without a browser.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ensayo::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> EnsayoResult<()> {
//! let driver = Arc::new(ensayo::driver::MockDriver::new());
//! driver.add_element("#save", ensayo::driver::MockElement::new());
//!
//! let web = WebApp::new(ExecutionContext::new(driver));
//! web.click(&Target::new("#save")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod driver;
pub mod logging;
pub mod page_object;
pub mod resolver;
pub mod result;
pub mod retry;
pub mod scenario;
pub mod target;
pub mod wait;
pub mod webapp;

pub use config::EnsayoConfig;
pub use context::ExecutionContext;
pub use page_object::{CatalogPage, PageObject, PageRegistry, UrlMatcher};
pub use resolver::{ElementRef, DEFAULT_ELEMENT_READY_TIMEOUT_MS};
pub use result::{EnsayoError, EnsayoResult};
pub use retry::{RetryPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_TIMEOUT_MS};
pub use scenario::{Scenario, ScenarioStatus};
pub use target::Target;
pub use wait::LoadState;
pub use webapp::{ActionOutcome, FailurePolicy, WebApp};

/// Common imports for writing scenarios.
pub mod prelude {
    pub use crate::config::EnsayoConfig;
    pub use crate::context::ExecutionContext;
    pub use crate::page_object::{CatalogPage, PageObject, PageRegistry};
    pub use crate::result::{EnsayoError, EnsayoResult};
    pub use crate::retry::RetryPolicy;
    pub use crate::scenario::{Scenario, ScenarioStatus};
    pub use crate::target::Target;
    pub use crate::wait::LoadState;
    pub use crate::webapp::{ActionOutcome, FailurePolicy, WebApp};

    #[cfg(feature = "browser")]
    pub use crate::driver::cdp::{BrowserSession, LaunchOptions};
}
