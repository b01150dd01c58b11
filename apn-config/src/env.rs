// Environment variable loading

use crate::{ConfigError, Result};
use apn_push::{CertificateSource, Environment, GatewayConfig};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Prefix of every variable the sender reads.
pub const ENV_PREFIX: &str = "APN";

/// Environment variable loader
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all environment variables
    ///
    /// With a prefix, only matching variables are returned, keyed by the
    /// lowercased remainder (`APN_POOL_SIZE` becomes `pool_size`).
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.filter(env::vars()))
    }

    /// Load the variables of a `.env` file without touching the process environment
    pub fn load_dotenv(&self, path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
        let vars = dotenvy::from_path_iter(path.as_ref())
            .map_err(|e| ConfigError::LoadError(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(self.filter(vars))
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = if let Some(ref prefix) = self.prefix {
            format!("{}_{}", prefix, key.to_uppercase())
        } else {
            key.to_uppercase()
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn filter(&self, vars: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        let mut config = HashMap::new();

        for (key, value) in vars {
            if let Some(ref prefix) = self.prefix {
                if let Some(rest) = key.strip_prefix(prefix.as_str())
                    && let Some(rest) = rest.strip_prefix('_')
                {
                    config.insert(rest.to_lowercase(), value);
                }
            } else {
                config.insert(key.to_lowercase(), value);
            }
        }

        config
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some(ENV_PREFIX.to_string()))
    }
}

/// Apply `APN_*` overrides, keyed as returned by [`EnvLoader::load`], to one gateway.
///
/// Returns the number of settings changed.
pub fn apply_overrides(config: &mut GatewayConfig, vars: &HashMap<String, String>) -> Result<usize> {
    let mut applied = 0;

    for (key, value) in vars {
        let value = value.as_str();
        match key.as_str() {
            "gateway_host" => config.gateway_host = Some(value.to_string()),
            "gateway_port" => config.gateway_port = parse(key, value)?,
            "feedback_host" => config.feedback_host = Some(value.to_string()),
            "feedback_port" => config.feedback_port = parse(key, value)?,
            "certificate_path" => config.certificate = CertificateSource::File(value.into()),
            "passphrase" => config.passphrase = Some(value.to_string()),
            "pool_size" => config.pool_size = parse(key, value)?,
            "pool_timeout_ms" => config.pool_timeout = Duration::from_millis(parse(key, value)?),
            "environment" => config.environment = parse_environment(key, value)?,
            "truncate_alert" => config.truncate_alert = parse_bool(key, value)?,
            _ => continue,
        }
        debug!(setting = %key, "Applied environment override");
        applied += 1;
    }

    Ok(applied)
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_environment(key: &str, value: &str) -> Result<Environment> {
    match value.trim().to_lowercase().as_str() {
        "production" => Ok(Environment::Production),
        "sandbox" | "development" => Ok(Environment::Sandbox),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{}_{}", ENV_PREFIX, key.to_uppercase()),
        value: value.to_string(),
    }
}
