// Configuration validation

use crate::{ConfigError, Result};
use apn_push::{CertificateSource, GatewayConfig};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of the allowed values",
                field
            )));
        }
        Ok(())
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(self.gateway_host(), "gateway_host")?;
        ConfigValidator::is_port(self.gateway_port, "gateway_port")?;
        ConfigValidator::not_empty(self.feedback_host(), "feedback_host")?;
        ConfigValidator::is_port(self.feedback_port, "feedback_port")?;
        ConfigValidator::in_range(self.pool_size, 1, 1024, "pool_size")?;
        if self.pool_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "pool_timeout must be positive".into(),
            ));
        }
        ConfigValidator::in_range(
            self.max_payload_bytes(),
            1,
            self.protocol.max_payload_bytes(),
            "max_payload_bytes",
        )?;

        match &self.certificate {
            CertificateSource::File(path) => {
                ConfigValidator::not_empty(&path.to_string_lossy(), "certificate")?
            }
            CertificateSource::Pem(pem) => ConfigValidator::not_empty(pem, "certificate")?,
            CertificateSource::Root { name, .. } => {
                if let Some(name) = name {
                    ConfigValidator::not_empty(name, "certificate name")?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apn_push::ProtocolVersion;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());
        assert!(ConfigValidator::in_range(11, 1, 10, "field").is_err());
    }

    #[test]
    fn test_one_of_validation() {
        let allowed = vec!["a", "b", "c"];
        assert!(ConfigValidator::one_of(&"a", &allowed, "field").is_ok());
        assert!(ConfigValidator::one_of(&"d", &allowed, "field").is_err());
    }

    #[test]
    fn test_port_validation() {
        assert!(ConfigValidator::is_port(2195, "field").is_ok());
        assert!(ConfigValidator::is_port(0, "field").is_err());
    }

    #[test]
    fn test_default_gateway_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_gateway_rules() {
        assert!(GatewayConfig::default().pool_size(0).validate().is_err());
        let mut no_wait = GatewayConfig::default();
        no_wait.pool_timeout = std::time::Duration::ZERO;
        assert!(no_wait.validate().is_err());
        assert!(GatewayConfig::default().gateway("", 2195).validate().is_err());
        assert!(GatewayConfig::default().feedback("feedback", 0).validate().is_err());

        let mut legacy = GatewayConfig::default().protocol(ProtocolVersion::Legacy);
        legacy.max_payload_bytes = Some(2047);
        let err = legacy.validate().unwrap_err();
        assert!(err.to_string().contains("max_payload_bytes"));
    }
}
