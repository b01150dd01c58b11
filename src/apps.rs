//! Registry of gateway applications.
//!
//! Each application has its own certificate and therefore its own
//! connection pool. Callers pick one by name; `None` means the default.

use apn_config::SenderConfig;
use apn_push::{Delivery, GatewayConfig, NotificationOptions, PushService};
use std::collections::HashMap;
use tracing::info;

use crate::{Error, Result};

/// One registered application.
#[derive(Debug)]
pub struct Application {
    name: String,
    config: GatewayConfig,
    service: PushService,
}

impl Application {
    /// Pair a configuration with a ready service.
    pub fn new(name: impl Into<String>, config: GatewayConfig, service: PushService) -> Self {
        Self {
            name: name.into(),
            config,
            service,
        }
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gateway settings.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Push service for this application.
    pub fn service(&self) -> &PushService {
        &self.service
    }

    /// Encode and deliver one notification.
    pub async fn notify(&self, token: &str, options: NotificationOptions) -> Result<Delivery> {
        Ok(self.service.notify(token, options).await?)
    }
}

/// Applications by name.
#[derive(Debug)]
pub struct Applications {
    default_app: String,
    apps: HashMap<String, Application>,
}

impl Applications {
    /// Empty registry whose default is `default_app`.
    pub fn new(default_app: impl Into<String>) -> Self {
        Self {
            default_app: default_app.into(),
            apps: HashMap::new(),
        }
    }

    /// Register every application in `config`.
    ///
    /// Fails on the first certificate that cannot be loaded.
    pub fn from_config(config: &SenderConfig) -> Result<Self> {
        let mut apps = Self::new(config.default_app.clone());
        for (name, gateway) in &config.apps {
            apps.register(name.clone(), gateway.clone())?;
        }
        Ok(apps)
    }

    /// Build a TLS-backed service for `config` and register it.
    pub fn register(&mut self, name: impl Into<String>, config: GatewayConfig) -> Result<()> {
        let service = PushService::from_config(&config)?;
        self.insert(Application::new(name, config, service));
        Ok(())
    }

    /// Register a prebuilt application, replacing any with the same name.
    pub fn insert(&mut self, app: Application) {
        info!(
            app = %app.name,
            gateway = %app.config.gateway_host(),
            "Registered application"
        );
        self.apps.insert(app.name.clone(), app);
    }

    /// Look up an application. `None` selects the default.
    pub fn get(&self, name: Option<&str>) -> Result<&Application> {
        let name = name.unwrap_or(&self.default_app);
        self.apps
            .get(name)
            .ok_or_else(|| Error::UnknownApplication(name.to_string()))
    }

    /// Name of the default application.
    pub fn default_app(&self) -> &str {
        &self.default_app
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.apps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered applications.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Close the connections of every application.
    pub async fn shutdown(&self) {
        for app in self.apps.values() {
            app.service.shutdown().await;
        }
        info!(apps = self.apps.len(), "All applications shut down");
    }
}
