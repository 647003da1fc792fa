//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for enabling/disabling functionality
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Enable WebSocket streaming for conversations
    #[serde(default)]
    pub enable_streaming: bool,

    /// Enable AI fallback provider on primary failure
    #[serde(default)]
    pub enable_ai_fallback: bool,

    /// Show detailed error messages (disable in production!)
    #[serde(default)]
    pub verbose_errors: bool,

    /// Enable request tracing (defaults to true)
    #[serde(default = "default_enable_tracing")]
    pub enable_tracing: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_streaming: false,
            enable_ai_fallback: false,
            verbose_errors: false,
            enable_tracing: true,
        }
    }
}

fn default_enable_tracing() -> bool {
    true
}
