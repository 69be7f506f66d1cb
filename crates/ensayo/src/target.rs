//! Declarative locator descriptions.
//!
//! A [`Target`] says how to find something: an engine selector, an optional
//! nested-frame path to descend through first, an optional disambiguation
//! index for multi-match selectors, and an optional wait budget. It is pure
//! data: resolving it never mutates it, and nothing caches resolved
//! handles; every action re-resolves against the live document.

use serde::{Deserialize, Serialize};

use crate::result::{EnsayoError, EnsayoResult};

/// Separator used in composite frame selectors, e.g. `"#layout|#inner"`
/// descends through `#layout` and then `#inner`.
pub const FRAME_SEPARATOR: char = '|';

/// Immutable description of how to locate an element (or frame scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    selector: String,
    frame_path: Vec<String>,
    occurrence: Option<usize>,
    timeout_ms: Option<u64>,
}

impl Target {
    /// Create a target from an engine selector (CSS/XPath/text query).
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            frame_path: Vec::new(),
            occurrence: None,
            timeout_ms: None,
        }
    }

    /// Create a target matching visible text, e.g. `Target::text("Save")`
    /// builds the `text="Save"` engine query.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::new(format!("text=\"{text}\""))
    }

    /// Scope this target inside a frame. Composite paths use `|` as a
    /// separator: `in_frame("#layout|#inner")` descends through `#layout`
    /// first, then `#inner`.
    #[must_use]
    pub fn in_frame(mut self, frame: impl Into<String>) -> Self {
        let frame = frame.into();
        self.frame_path.extend(
            frame
                .split(FRAME_SEPARATOR)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from),
        );
        self
    }

    /// Select the nth match when the selector is ambiguous. Without this,
    /// multi-match selectors resolve to index 1 (the second match) by
    /// convention; see the resolver module.
    #[must_use]
    pub const fn nth(mut self, occurrence: usize) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    /// Override the wait budget for any readiness wait bound to this
    /// resolution, in milliseconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// The engine selector.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The ordered nested-frame selectors (possibly empty).
    #[must_use]
    pub fn frame_path(&self) -> &[String] {
        &self.frame_path
    }

    /// The explicit disambiguation index, if any.
    #[must_use]
    pub const fn occurrence(&self) -> Option<usize> {
        self.occurrence
    }

    /// The per-resolution wait override in milliseconds, if any.
    #[must_use]
    pub const fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// Validate the description before resolution.
    ///
    /// # Errors
    ///
    /// Returns [`EnsayoError::InvalidTarget`] for an empty or
    /// whitespace-only selector.
    pub fn validate(&self) -> EnsayoResult<()> {
        if self.selector.trim().is_empty() {
            return Err(EnsayoError::InvalidTarget {
                message: "selector is empty".to_string(),
            });
        }
        Ok(())
    }
}
