//! Page-level load states for navigation waits.

/// Page load states the driver can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// The `load` event has fired
    #[default]
    Load,
    /// The `DOMContentLoaded` event has fired
    DomContentLoaded,
    /// No network requests for a quiet window
    NetworkIdle,
}

impl LoadState {
    /// The event name as the engine spells it.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
            Self::NetworkIdle => "networkidle",
        }
    }

    /// Default wait budget for this state in milliseconds. Network idle can
    /// take longer than the document events.
    #[must_use]
    pub const fn default_timeout_ms(&self) -> u64 {
        match self {
            Self::Load | Self::DomContentLoaded => 30_000,
            Self::NetworkIdle => 60_000,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}
