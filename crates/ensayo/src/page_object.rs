//! Page objects: named selector catalogs per application page.
//!
//! A page object couples a URL pattern with the [`Target`]s test steps use
//! on that page, so steps refer to elements by role ("the save button")
//! instead of raw selectors. The registry maps the current URL back to the
//! page the scenario is on.

use std::collections::HashMap;

use crate::target::Target;

/// A page or component of the application under test.
pub trait PageObject {
    /// URL pattern identifying this page. Supports literal segments
    /// (`/login`), wildcards (`/users/*`) and named parameters
    /// (`/users/:id`).
    fn url_pattern(&self) -> &str;

    /// Look up a cataloged target by its role name.
    fn target(&self, name: &str) -> Option<&Target>;

    /// The target whose visibility marks the page as ready, if any.
    fn ready_target(&self) -> Option<&Target> {
        None
    }

    /// Page name for logging.
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A page object assembled from a catalog instead of a dedicated type.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    url_pattern: String,
    name: String,
    targets: HashMap<String, Target>,
    ready: Option<String>,
}

impl CatalogPage {
    /// A page with the given name and URL pattern.
    #[must_use]
    pub fn new(name: impl Into<String>, url_pattern: impl Into<String>) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            name: name.into(),
            targets: HashMap::new(),
            ready: None,
        }
    }

    /// Catalog a target under a role name.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>, target: Target) -> Self {
        let _ = self.targets.insert(name.into(), target);
        self
    }

    /// Mark the cataloged target `name` as the page-ready marker.
    #[must_use]
    pub fn with_ready_marker(mut self, name: impl Into<String>) -> Self {
        self.ready = Some(name.into());
        self
    }

    /// Names of all cataloged targets.
    #[must_use]
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }
}

impl PageObject for CatalogPage {
    fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    fn ready_target(&self) -> Option<&Target> {
        self.ready.as_deref().and_then(|name| self.targets.get(name))
    }

    fn page_name(&self) -> &str {
        &self.name
    }
}

/// Registry of page objects, addressable by name or by current URL.
#[derive(Default)]
pub struct PageRegistry {
    pages: Vec<(String, Box<dyn PageObject + Send + Sync>)>,
}

impl std::fmt::Debug for PageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRegistry")
            .field("pages", &self.names())
            .finish()
    }
}

impl PageRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page object under `name`.
    pub fn register<P>(&mut self, name: impl Into<String>, page: P)
    where
        P: PageObject + Send + Sync + 'static,
    {
        self.pages.push((name.into(), Box::new(page)));
    }

    /// Page registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&(dyn PageObject + Send + Sync)> {
        self.pages
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, page)| page.as_ref())
    }

    /// The first registered page whose URL pattern matches `url`'s path.
    #[must_use]
    pub fn page_for_url(&self, url: &str) -> Option<&(dyn PageObject + Send + Sync)> {
        self.pages
            .iter()
            .find(|(_, page)| UrlMatcher::new(page.url_pattern()).matches(url))
            .map(|(_, page)| page.as_ref())
    }

    /// Names of all registered pages, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.pages.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of registered pages.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pages.len()
    }
}

/// Matches URLs against page patterns segment by segment.
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
}

impl UrlMatcher {
    /// A matcher for `pattern`.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// The pattern this matcher was built from.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn segments(text: &str) -> Vec<&str> {
        // Full URLs match on their path component.
        let path = text
            .find("://")
            .and_then(|scheme| text[scheme + 3..].find('/').map(|slash| &text[scheme + 3 + slash..]))
            .unwrap_or(text);
        path.split('/').filter(|segment| !segment.is_empty()).collect()
    }

    /// Whether `url` matches the pattern. Wildcard (`*`) and parameter
    /// (`:name`) segments each consume exactly one URL segment.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let pattern = Self::segments(&self.pattern);
        let subject = Self::segments(url);
        pattern.len() == subject.len()
            && pattern
                .iter()
                .zip(&subject)
                .all(|(expected, actual)| {
                    *expected == "*" || expected.starts_with(':') || expected == actual
                })
    }

    /// Values bound to the pattern's `:name` parameters by `url`.
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        Self::segments(&self.pattern)
            .iter()
            .zip(Self::segments(url))
            .filter_map(|(expected, actual)| {
                expected
                    .strip_prefix(':')
                    .map(|name| (name.to_string(), actual.to_string()))
            })
            .collect()
    }
}
