//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::frame::ProtocolVersion;
use crate::payload::PayloadEncoder;
use crate::{PushError, Result};

/// Gateway environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production gateway.
    #[default]
    Production,
    /// Sandbox gateway for development builds.
    #[serde(alias = "development")]
    Sandbox,
}

impl Environment {
    /// Default notification gateway host.
    pub fn gateway_host(&self) -> &'static str {
        match self {
            Self::Production => "gateway.push.apple.com",
            Self::Sandbox => "gateway.sandbox.push.apple.com",
        }
    }

    /// Default feedback service host.
    pub fn feedback_host(&self) -> &'static str {
        match self {
            Self::Production => "feedback.push.apple.com",
            Self::Sandbox => "feedback.sandbox.push.apple.com",
        }
    }

    /// Certificate file name used when only a root directory is configured.
    pub fn certificate_name(&self) -> &'static str {
        match self {
            Self::Production => "apn_production.pem",
            Self::Sandbox => "apn_development.pem",
        }
    }
}

/// Where the client certificate (and its private key) comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    /// Full path to a PEM file holding certificate and key.
    File(PathBuf),
    /// PEM contents held in memory.
    Pem(String),
    /// A directory plus an optional file name. The name defaults per environment.
    Root {
        /// Directory containing the certificate.
        root: PathBuf,
        /// File name inside `root`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Default for CertificateSource {
    fn default() -> Self {
        Self::Root {
            root: PathBuf::from("."),
            name: None,
        }
    }
}

impl CertificateSource {
    /// Resolved filesystem path, if the certificate lives on disk.
    pub fn path(&self, environment: Environment) -> Option<PathBuf> {
        match self {
            Self::File(path) => Some(path.clone()),
            Self::Pem(_) => None,
            Self::Root { root, name } => Some(
                root.join(name.as_deref().unwrap_or(environment.certificate_name())),
            ),
        }
    }

    /// Read the PEM bytes.
    pub fn load(&self, environment: Environment) -> Result<Vec<u8>> {
        match self {
            Self::Pem(pem) => Ok(pem.as_bytes().to_vec()),
            _ => {
                let path = self.path(environment).unwrap_or_default();
                read_pem(&path)
            }
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        PushError::Certificate(format!(
            "no push certificate found at {}: {e}",
            path.display()
        ))
    })
}

/// Configuration for one gateway application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Production or sandbox.
    pub environment: Environment,
    /// Gateway host. Derived from the environment when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_host: Option<String>,
    /// Gateway port.
    pub gateway_port: u16,
    /// Feedback host. Derived from the environment when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_host: Option<String>,
    /// Feedback port.
    pub feedback_port: u16,
    /// Client certificate.
    pub certificate: CertificateSource,
    /// Passphrase of an encrypted private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Extra trust anchor for the gateway's server certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<PathBuf>,
    /// Number of pooled gateway connections.
    pub pool_size: usize,
    /// How long to wait for a free pool slot.
    #[serde(with = "duration_ms", rename = "pool_timeout_ms")]
    pub pool_timeout: Duration,
    /// TCP connect plus TLS handshake timeout.
    #[serde(with = "duration_ms", rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,
    /// How long to wait for an error response after each write.
    #[serde(with = "duration_ms", rename = "error_read_timeout_ms")]
    pub error_read_timeout: Duration,
    /// Idle time after which the feedback stream is considered drained.
    #[serde(with = "duration_ms", rename = "feedback_read_timeout_ms")]
    pub feedback_read_timeout: Duration,
    /// Retries after the initial attempt on transport faults.
    pub max_retries: u32,
    /// Frame layout.
    pub protocol: ProtocolVersion,
    /// Payload limit. Defaults to the protocol cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<usize>,
    /// Truncate oversized alerts instead of failing.
    pub truncate_alert: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            gateway_host: None,
            gateway_port: 2195,
            feedback_host: None,
            feedback_port: 2196,
            certificate: CertificateSource::default(),
            passphrase: None,
            ca_certificate: None,
            pool_size: 1,
            pool_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            error_read_timeout: Duration::from_secs(1),
            feedback_read_timeout: Duration::from_secs(5),
            max_retries: 2,
            protocol: ProtocolVersion::Extended,
            max_payload_bytes: None,
            truncate_alert: false,
        }
    }
}

impl GatewayConfig {
    /// Production configuration reading the certificate from `path`.
    pub fn new(certificate_path: impl Into<PathBuf>) -> Self {
        Self {
            certificate: CertificateSource::File(certificate_path.into()),
            ..Default::default()
        }
    }

    /// Configuration with an in-memory PEM certificate.
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self {
            certificate: CertificateSource::Pem(pem.into()),
            ..Default::default()
        }
    }

    /// Use the sandbox environment.
    pub fn sandbox(mut self) -> Self {
        self.environment = Environment::Sandbox;
        self
    }

    /// Override the gateway endpoint.
    pub fn gateway(mut self, host: impl Into<String>, port: u16) -> Self {
        self.gateway_host = Some(host.into());
        self.gateway_port = port;
        self
    }

    /// Override the feedback endpoint.
    pub fn feedback(mut self, host: impl Into<String>, port: u16) -> Self {
        self.feedback_host = Some(host.into());
        self.feedback_port = port;
        self
    }

    /// Set the private key passphrase.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the pool acquisition timeout.
    pub fn pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = timeout;
        self
    }

    /// Select the protocol generation.
    pub fn protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    /// Enable or disable alert truncation.
    pub fn truncate_alert(mut self, enabled: bool) -> Self {
        self.truncate_alert = enabled;
        self
    }

    /// Effective gateway host.
    pub fn gateway_host(&self) -> &str {
        self.gateway_host
            .as_deref()
            .unwrap_or(self.environment.gateway_host())
    }

    /// Effective feedback host.
    pub fn feedback_host(&self) -> &str {
        self.feedback_host
            .as_deref()
            .unwrap_or(self.environment.feedback_host())
    }

    /// Effective payload limit.
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
            .unwrap_or(self.protocol.max_payload_bytes())
    }

    /// Encoder matching this configuration.
    pub fn encoder(&self) -> Result<PayloadEncoder> {
        Ok(PayloadEncoder::new(self.protocol)
            .with_max_payload_bytes(self.max_payload_bytes())?
            .with_truncation(self.truncate_alert))
    }

    /// Resolved certificate path, if on disk.
    pub fn certificate_path(&self) -> Option<PathBuf> {
        self.certificate.path(self.environment)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.gateway_host(), "gateway.push.apple.com");
        assert_eq!(config.gateway_port, 2195);
        assert_eq!(config.feedback_host(), "feedback.push.apple.com");
        assert_eq!(config.feedback_port, 2196);
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_payload_bytes(), 2047);
        assert_eq!(
            config.certificate_path(),
            Some(PathBuf::from("./apn_production.pem"))
        );
    }

    #[test]
    fn test_sandbox_hosts_and_certificate() {
        let config = GatewayConfig::default().sandbox();
        assert_eq!(config.gateway_host(), "gateway.sandbox.push.apple.com");
        assert_eq!(config.feedback_host(), "feedback.sandbox.push.apple.com");
        assert_eq!(
            config.certificate_path(),
            Some(PathBuf::from("./apn_development.pem"))
        );
    }

    #[test]
    fn test_full_path_wins() {
        let config = GatewayConfig::new("/etc/apn/cert.pem");
        assert_eq!(config.certificate_path(), Some(PathBuf::from("/etc/apn/cert.pem")));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GatewayConfig = serde_json::from_value(json!({
            "environment": "development",
            "certificate": {"root": {"root": "/srv/certs", "name": "push.pem"}},
            "pool_size": 3,
            "pool_timeout_ms": 250,
            "protocol": "legacy"
        }))
        .unwrap();

        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.pool_timeout, Duration::from_millis(250));
        assert_eq!(config.max_payload_bytes(), 255);
        assert_eq!(
            config.certificate_path(),
            Some(PathBuf::from("/srv/certs/push.pem"))
        );
    }

    #[test]
    fn test_missing_certificate_file() {
        let config = GatewayConfig::new("/nonexistent/apn.pem");
        let err = config.certificate.load(config.environment).unwrap_err();
        assert!(matches!(err, PushError::Certificate(_)));
    }

    #[test]
    fn test_encoder_rejects_oversized_limit() {
        let mut config = GatewayConfig::default().protocol(ProtocolVersion::Legacy);
        config.max_payload_bytes = Some(256);
        assert!(config.encoder().is_err());
    }
}
