//! Execution context passed explicitly through every helper.
//!
//! The context bundles the active driver with the frame scope lookups run
//! in. It is passed by value instead of living in a process-wide slot, so
//! independent scenarios can hold independent contexts side by side.

use std::sync::Arc;

use crate::driver::Driver;

/// The page (or popup) a set of helpers operates on, plus the frame scope
/// applied to every lookup made through it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    driver: Arc<dyn Driver>,
    frame_path: Vec<String>,
}

impl ExecutionContext {
    /// Context rooted at the top-level document of `driver`.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            frame_path: Vec::new(),
        }
    }

    /// The driver behind this context.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The ambient frame scope.
    #[must_use]
    pub fn frame_path(&self) -> &[String] {
        &self.frame_path
    }

    /// A context whose scope descends into `frame_selector` below the
    /// current scope.
    #[must_use]
    pub fn enter_frame(&self, frame_selector: impl Into<String>) -> Self {
        let mut frame_path = self.frame_path.clone();
        frame_path.push(frame_selector.into());
        Self {
            driver: Arc::clone(&self.driver),
            frame_path,
        }
    }

    /// A context for the same driver back at the top-level document.
    #[must_use]
    pub fn at_top(&self) -> Self {
        Self::new(Arc::clone(&self.driver))
    }

    /// A context rooted at a different driver (e.g. a popup page).
    #[must_use]
    pub fn for_driver(driver: Arc<dyn Driver>) -> Self {
        Self::new(driver)
    }

    /// The full scope for a target carrying its own frame hops: the
    /// ambient scope first, then the target's own path.
    #[must_use]
    pub fn scope_for(&self, target_frames: &[String]) -> Vec<String> {
        let mut scope = self.frame_path.clone();
        scope.extend_from_slice(target_frames);
        scope
    }
}
