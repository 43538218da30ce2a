//! Client runtime configuration

use std::time::Duration;

use asm_core::marker::DEFAULT_TAG;

/// Client runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long `idle` islands wait for an idle signal before activating anyway
    pub idle_fallback: Duration,
    /// Marker element name to scan for; must match the server
    pub marker_tag: String,
}

impl ClientConfig {
    /// Config from the server's `hydration.idle_fallback_ms`
    pub fn from_idle_fallback_ms(ms: u64) -> Self {
        Self {
            idle_fallback: Duration::from_millis(ms),
            ..Self::default()
        }
    }

    /// Use a custom marker element name
    pub fn with_marker_tag(mut self, tag: impl Into<String>) -> Self {
        self.marker_tag = tag.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            idle_fallback: Duration::from_millis(2000),
            marker_tag: DEFAULT_TAG.to_string(),
        }
    }
}
