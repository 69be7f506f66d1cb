//! Run configuration.
//!
//! Loaded from a JSON file or built in code; every field has a default so
//! partial files work. The config feeds the retry and failure policies of
//! the helper surface and, with the `browser` feature, the launch options.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::resolver::DEFAULT_ELEMENT_READY_TIMEOUT_MS;
use crate::result::{EnsayoError, EnsayoResult};
use crate::retry::{RetryPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_TIMEOUT_MS};
use crate::webapp::{FailurePolicy, WebApp};

fn default_timeout_ms() -> u64 {
    DEFAULT_RETRY_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_element_ready_timeout_ms() -> u64 {
    DEFAULT_ELEMENT_READY_TIMEOUT_MS
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Settings for one test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsayoConfig {
    /// Base URL scenarios navigate relative to
    pub base_url: Option<String>,
    /// Retry budget for queries and waits, in milliseconds
    pub timeout_ms: u64,
    /// Polling interval inside retry loops, in milliseconds
    pub poll_interval_ms: u64,
    /// Attachment wait before acting on an element, in milliseconds
    pub element_ready_timeout_ms: u64,
    /// What best-effort actions do on failure
    pub failure_policy: FailurePolicy,
    /// Run the browser headless
    pub headless: bool,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Root directory for logs, screenshots and downloads
    pub output_dir: PathBuf,
}

impl Default for EnsayoConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            element_ready_timeout_ms: default_element_ready_timeout_ms(),
            failure_policy: FailurePolicy::default(),
            headless: default_headless(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            output_dir: default_output_dir(),
        }
    }
}

impl EnsayoConfig {
    /// Load a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> EnsayoResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| EnsayoError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&raw).map_err(|e| EnsayoError::Config {
            message: format!("cannot parse {}: {e}", path.display()),
        })
    }

    /// Retry policy derived from this config.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout_ms: self.timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Where failure screenshots land.
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    /// Where downloads land.
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.output_dir.join("downloads")
    }

    /// A helper surface over `ctx` carrying this config's policies.
    #[must_use]
    pub fn webapp(&self, ctx: ExecutionContext) -> WebApp {
        WebApp::new(ctx)
            .with_policy(self.failure_policy)
            .with_retry_policy(self.retry_policy())
            .with_ready_timeout_ms(self.element_ready_timeout_ms)
    }

    /// Browser launch options derived from this config.
    #[cfg(feature = "browser")]
    #[must_use]
    pub fn launch_options(&self) -> crate::driver::cdp::LaunchOptions {
        crate::driver::cdp::LaunchOptions::default()
            .with_headless(self.headless)
            .with_viewport(self.viewport_width, self.viewport_height)
            .with_downloads_dir(self.downloads_dir())
    }
}
