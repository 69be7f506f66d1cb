//! Scenario lifecycle: naming, outcome tracking, failure artifacts.
//!
//! A [`Scenario`] wraps the helper surface for one test case. Concluding it
//! with a failed result captures a screenshot named after the scenario
//! under `<output>/screenshots/` before the failure propagates.

use std::path::{Path, PathBuf};

use crate::result::EnsayoResult;
use crate::webapp::WebApp;

/// Outcome of a concluded scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScenarioStatus {
    /// Not concluded yet
    #[default]
    Running,
    /// Concluded without error
    Passed,
    /// Concluded with an error
    Failed,
}

/// One named test case bound to a helper surface.
#[derive(Debug)]
pub struct Scenario {
    name: String,
    web: WebApp,
    output_dir: PathBuf,
    status: ScenarioStatus,
}

/// File-name-safe form of a scenario name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl Scenario {
    /// A scenario writing its artifacts under `output_dir`.
    #[must_use]
    pub fn new(name: impl Into<String>, web: WebApp, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            web,
            output_dir: output_dir.into(),
            status: ScenarioStatus::default(),
        }
    }

    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The helper surface steps run against.
    #[must_use]
    pub const fn web(&self) -> &WebApp {
        &self.web
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ScenarioStatus {
        self.status
    }

    /// Where a failure screenshot for this scenario lands.
    #[must_use]
    pub fn screenshot_path(&self) -> PathBuf {
        self.output_dir
            .join("screenshots")
            .join(format!("{}.png", sanitize(&self.name)))
    }

    /// Record the scenario's result. A failure captures a screenshot before
    /// the error is handed back; a failing capture is logged, never masks
    /// the scenario error.
    ///
    /// # Errors
    ///
    /// Returns the error carried by `result`.
    pub async fn conclude(&mut self, result: EnsayoResult<()>) -> EnsayoResult<()> {
        match result {
            Ok(()) => {
                self.status = ScenarioStatus::Passed;
                tracing::info!(scenario = %self.name, "scenario passed");
                Ok(())
            }
            Err(err) => {
                self.status = ScenarioStatus::Failed;
                tracing::error!(scenario = %self.name, error = %err, "scenario failed");
                let shot = self.screenshot_path();
                if let Err(capture_err) = self.web.save_screenshot(&shot).await {
                    tracing::warn!(
                        scenario = %self.name,
                        error = %capture_err,
                        "failure screenshot could not be captured"
                    );
                }
                Err(err)
            }
        }
    }

    /// Artifact root for this scenario.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
