// Configuration management for the APN sender

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::{ENV_PREFIX, EnvLoader, apply_overrides};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

pub use apn_push::GatewayConfig;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

/// Name of the application used when none is configured.
pub const DEFAULT_APP: &str = "default";

/// How notifications leave the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherKind {
    /// Deliver on the calling task.
    #[default]
    Inline,
    /// Hand off to a job queue.
    Queued,
    /// Drop everything. Useful in tests and dry runs.
    Null,
}

/// Top-level sender configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Application used when a notification names none
    pub default_app: String,
    /// Dispatch strategy
    pub dispatcher: DispatcherKind,
    /// Gateway settings per application
    pub apps: BTreeMap<String, GatewayConfig>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            default_app: DEFAULT_APP.to_string(),
            dispatcher: DispatcherKind::Inline,
            apps: BTreeMap::new(),
        }
    }
}

impl SenderConfig {
    /// Configuration with a single default application
    pub fn single(config: GatewayConfig) -> Self {
        let mut apps = BTreeMap::new();
        apps.insert(DEFAULT_APP.to_string(), config);
        Self {
            apps,
            ..Default::default()
        }
    }

    /// Add an application
    pub fn with_app(mut self, name: impl Into<String>, config: GatewayConfig) -> Self {
        self.apps.insert(name.into(), config);
        self
    }

    /// Select the dispatch strategy
    pub fn with_dispatcher(mut self, dispatcher: DispatcherKind) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Load from a file, apply `APN_*` environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_env(path, &EnvLoader::default())
    }

    /// Like [`load`](Self::load) with a custom environment loader
    pub fn load_with_env(path: impl AsRef<Path>, env: &EnvLoader) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;

        let mut config = match loader.format() {
            // A .env file is a set of overrides on the defaults.
            FileFormat::Env => {
                let mut config = Self::default();
                config.apply_env(&env.load_dotenv(path)?)?;
                config
            }
            _ => loader.load(path)?,
        };

        config.apply_env(&env.load()?)?;
        config.validate()?;

        info!(
            path = %path.display(),
            apps = config.apps.len(),
            dispatcher = ?config.dispatcher,
            "Loaded sender configuration"
        );
        Ok(config)
    }

    /// Defaults plus `APN_*` environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(&EnvLoader::default().load()?)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides to the default application, creating it if needed
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<usize> {
        if let Some(app) = vars.get("default_app") {
            self.default_app = app.clone();
        }
        if let Some(kind) = vars.get("dispatcher") {
            self.dispatcher = match kind.trim().to_lowercase().as_str() {
                "inline" => DispatcherKind::Inline,
                "queued" | "queue" => DispatcherKind::Queued,
                "null" | "none" => DispatcherKind::Null,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: format!("{}_DISPATCHER", ENV_PREFIX),
                        value: kind.clone(),
                    });
                }
            };
        }

        let mut gateway = self
            .apps
            .get(&self.default_app)
            .cloned()
            .unwrap_or_default();
        let applied = apply_overrides(&mut gateway, vars)?;
        if applied > 0 || self.apps.is_empty() {
            self.apps.insert(self.default_app.clone(), gateway);
        }
        Ok(applied)
    }

    /// Gateway settings of the default application
    pub fn default_gateway(&self) -> Option<&GatewayConfig> {
        self.apps.get(&self.default_app)
    }

    /// Gateway settings of a named application
    pub fn app(&self, name: &str) -> Option<&GatewayConfig> {
        self.apps.get(name)
    }
}

impl Validate for SenderConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.default_app, "default_app")?;
        if !self.apps.contains_key(&self.default_app) {
            return Err(ConfigError::ValidationError(format!(
                "default app '{}' is not configured",
                self.default_app
            )));
        }

        for (name, app) in &self.apps {
            ConfigValidator::not_empty(name, "app name")?;
            app.validate().map_err(|e| {
                ConfigError::ValidationError(format!("app '{}': {}", name, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = SenderConfig::default();
        assert_eq!(config.default_app, "default");
        assert_eq!(config.dispatcher, DispatcherKind::Inline);
        assert!(config.apps.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_app_is_valid() {
        let config = SenderConfig::single(GatewayConfig::default());
        assert!(config.validate().is_ok());
        assert!(config.default_gateway().is_some());
    }

    #[test]
    fn test_deserialize_multiple_apps() {
        let config: SenderConfig = serde_json::from_value(json!({
            "default_app": "main",
            "dispatcher": "queued",
            "apps": {
                "main": {"pool_size": 2},
                "beta": {"environment": "sandbox"}
            }
        }))
        .unwrap();

        assert_eq!(config.dispatcher, DispatcherKind::Queued);
        assert_eq!(config.app("main").unwrap().pool_size, 2);
        assert_eq!(
            config.app("beta").unwrap().gateway_host(),
            "gateway.sandbox.push.apple.com"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_default_app() {
        let config = SenderConfig {
            default_app: "main".into(),
            ..SenderConfig::single(GatewayConfig::default())
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_default_app() {
        let mut config = SenderConfig::single(GatewayConfig::default());
        let vars: HashMap<String, String> = [
            ("gateway_host", "127.0.0.1"),
            ("dispatcher", "null"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(config.apply_env(&vars).unwrap(), 1);
        assert_eq!(config.dispatcher, DispatcherKind::Null);
        assert_eq!(config.default_gateway().unwrap().gateway_host(), "127.0.0.1");
    }

    #[test]
    fn test_bad_dispatcher_override() {
        let mut config = SenderConfig::default();
        let vars = HashMap::from([("dispatcher".to_string(), "carrier-pigeon".to_string())]);
        assert!(matches!(
            config.apply_env(&vars),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
