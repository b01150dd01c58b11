//! Push service tying encoder, pool, delivery and feedback together.

use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{Delivery, DeliveryClient};
use crate::connection::Connector;
use crate::feedback::{FeedbackItem, FeedbackReader};
use crate::frame::EncodedFrame;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::tls::TlsConnector;
use crate::{GatewayConfig, NotificationOptions, PayloadEncoder, PushError, Result};

/// Encodes and delivers notifications for one gateway application.
#[derive(Debug)]
pub struct PushService {
    encoder: PayloadEncoder,
    client: DeliveryClient,
    feedback: Option<FeedbackReader>,
}

impl PushService {
    /// Build a service talking TLS to the configured gateway and feedback hosts.
    ///
    /// The certificate is loaded eagerly so a bad path fails here rather than
    /// on the first delivery.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let (gateway, feedback) = TlsConnector::pair_from_config(config)?;
        Self::with_connectors(config, Arc::new(gateway), Some(Arc::new(feedback)))
    }

    /// Build a service on caller-supplied connectors.
    pub fn with_connectors(
        config: &GatewayConfig,
        gateway: Arc<dyn Connector>,
        feedback: Option<Arc<dyn Connector>>,
    ) -> Result<Self> {
        let encoder = config.encoder()?;
        let pool = ConnectionPool::new(
            gateway,
            PoolConfig {
                size: config.pool_size,
                timeout: config.pool_timeout,
            },
        )?;
        let client = DeliveryClient::new(pool)
            .with_max_retries(config.max_retries)
            .with_error_read_timeout(config.error_read_timeout);
        let feedback = feedback.map(|connector| {
            FeedbackReader::new(connector).with_read_timeout(config.feedback_read_timeout)
        });

        info!(
            gateway = %config.gateway_host(),
            environment = ?config.environment,
            protocol = ?encoder.protocol(),
            pool_size = config.pool_size,
            "Push service ready"
        );

        Ok(Self {
            encoder,
            client,
            feedback,
        })
    }

    /// The payload encoder.
    pub fn encoder(&self) -> &PayloadEncoder {
        &self.encoder
    }

    /// The delivery client.
    pub fn client(&self) -> &DeliveryClient {
        &self.client
    }

    /// Encode a notification for `token`.
    pub fn encode(&self, token: &str, options: NotificationOptions) -> Result<EncodedFrame> {
        self.encoder.encode_token(token, options)
    }

    /// Deliver an already encoded frame.
    pub async fn deliver(&self, frame: &EncodedFrame) -> Result<Delivery> {
        self.client.deliver(frame).await
    }

    /// Encode and deliver.
    pub async fn notify(&self, token: &str, options: NotificationOptions) -> Result<Delivery> {
        let frame = self.encode(token, options)?;
        debug!(token = %frame.token(), bytes = frame.payload().len(), "Encoded notification");
        self.deliver(&frame).await
    }

    /// Devices reported by the feedback service.
    pub async fn fetch_feedback(&self, force: bool) -> Result<Vec<FeedbackItem>> {
        self.feedback_reader()?.fetch(force).await
    }

    /// Tokens reported by the feedback service.
    pub async fn feedback_tokens(&self, force: bool) -> Result<Vec<String>> {
        self.feedback_reader()?.tokens(force).await
    }

    /// Close pooled connections. Further deliveries fail with [`PushError::PoolClosed`].
    pub async fn shutdown(&self) {
        self.client.pool().shutdown().await;
    }

    fn feedback_reader(&self) -> Result<&FeedbackReader> {
        self.feedback
            .as_ref()
            .ok_or_else(|| PushError::Config("no feedback endpoint configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolVersion;

    #[test]
    fn test_missing_certificate_fails_construction() {
        let config = GatewayConfig::new("/nonexistent/apn.pem");
        assert!(matches!(
            PushService::from_config(&config),
            Err(PushError::Certificate(_))
        ));
    }

    #[test]
    fn test_invalid_pem_fails_construction() {
        let config = GatewayConfig::from_pem("not a certificate");
        assert!(PushService::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_feedback_requires_endpoint() {
        struct Unreachable;

        #[async_trait::async_trait]
        impl Connector for Unreachable {
            async fn connect(&self) -> Result<Box<dyn crate::connection::GatewayStream>> {
                Err(PushError::Connection("unreachable".into()))
            }

            fn endpoint(&self) -> String {
                "nowhere:0".into()
            }
        }

        let config = GatewayConfig::default().protocol(ProtocolVersion::Legacy);
        let service = PushService::with_connectors(&config, Arc::new(Unreachable), None).unwrap();
        assert_eq!(service.encoder().max_payload_bytes(), 255);
        assert!(matches!(
            service.fetch_feedback(false).await,
            Err(PushError::Config(_))
        ));
    }
}
