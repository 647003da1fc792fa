//! Application configuration module (§10.1).
//!
//! Provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with an
//! `ORCHESTRATOR_` prefix and nested values use `__` as a separator.
//!
//! # Example
//!
//! ```no_run
//! use orchestrator::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod error;
mod features;
mod reasoner;
mod server;
mod tool_servers;

pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use reasoner::{AiProvider, ReasonerConfig};
pub use server::{Environment, ServerConfig};
pub use tool_servers::{ToolServerConfig, ToolServersConfig, TransportKind};

use serde::Deserialize;

/// Root application configuration (§10.1).
///
/// Composed of server settings, reasoner settings, the configured tool
/// servers, and feature flags. Load using [`AppConfig::load()`], which
/// reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Reasoner (LLM) provider configuration
    #[serde(default)]
    pub reasoner: ReasonerConfig,

    /// Configured tool servers (§6.2)
    #[serde(default)]
    pub tool_servers: ToolServersConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `ORCHESTRATOR` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ORCHESTRATOR__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ORCHESTRATOR__REASONER__ANTHROPIC_API_KEY=...` -> `reasoner.anthropic_api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required environment variables are missing
    /// or values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ORCHESTRATOR")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Performs semantic validation: port range, request timeout bounds,
    /// at least one reasoner provider configured, and no duplicate tool
    /// server ids. This is the only place "missing required configuration"
    /// is diagnosed (§10.1).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.reasoner.validate()?;
        self.tool_servers.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("ORCHESTRATOR__REASONER__ANTHROPIC_API_KEY", "sk-ant-xxx");
    }

    fn clear_env() {
        env::remove_var("ORCHESTRATOR__REASONER__ANTHROPIC_API_KEY");
        env::remove_var("ORCHESTRATOR__SERVER__PORT");
        env::remove_var("ORCHESTRATOR__SERVER__ENVIRONMENT");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.reasoner.anthropic_api_key.as_deref(), Some("sk-ant-xxx"));
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok());
        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ORCHESTRATOR__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ORCHESTRATOR__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_missing_reasoner_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        let config = result.unwrap();
        assert!(config.validate().is_err());
    }
}
