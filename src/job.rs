//! Serializable notification jobs.

use apn_push::{Delivery, DeviceToken, NotificationOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{Applications, Result};

/// Job unique identifier.
pub type JobId = Uuid;

/// Options key naming the target application.
pub const APP_KEY: &str = "app";

/// A notification waiting in a queue.
///
/// Options are kept loosely typed so that producers in other languages can
/// enqueue jobs; they are parsed when the job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    /// Unique job ID
    pub id: JobId,
    /// Target application, the default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Normalized device token
    pub token: String,
    /// Notification options
    pub options: Value,
}

impl NotificationJob {
    /// Create a job from typed options.
    pub fn new(app: Option<String>, token: &DeviceToken, options: &NotificationOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            app,
            token: token.to_hex(),
            options: options.to_value(),
        }
    }

    /// Create a job from loosely-typed options.
    ///
    /// An `app` key inside the options selects the application and is removed.
    pub fn from_value(token: impl Into<String>, mut options: Value) -> Self {
        let app = options
            .as_object_mut()
            .and_then(|map| map.remove(APP_KEY))
            .and_then(|app| app.as_str().map(str::to_string));

        Self {
            id: Uuid::new_v4(),
            app,
            token: token.into(),
            options,
        }
    }

    /// Typed options.
    pub fn notification_options(&self) -> Result<NotificationOptions> {
        Ok(NotificationOptions::from_value(self.options.clone())?)
    }

    /// Encode to JSON for a queue backend.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Deliver the notification. This is what a queue worker runs.
    pub async fn perform(&self, apps: &Applications) -> Result<Delivery> {
        let app = apps.get(self.app.as_deref())?;
        debug!(job_id = %self.id, app = %app.name(), "Performing notification job");
        app.notify(&self.token, self.notification_options()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "2589b1aa363d23d8d7f166951a9e3ff41fb0130a637d6997a2080d881b2a19b5";

    #[test]
    fn test_app_key_is_consumed() {
        let job = NotificationJob::from_value(TOKEN, json!({"alert": "hi", "app": "beta"}));
        assert_eq!(job.app.as_deref(), Some("beta"));
        assert!(job.options.get(APP_KEY).is_none());

        let options = job.notification_options().unwrap();
        assert!(options.custom.is_empty());
    }

    #[test]
    fn test_string_options() {
        let job = NotificationJob::from_value(TOKEN, json!("Hello"));
        assert!(job.app.is_none());
        assert!(job.notification_options().unwrap().is_valid());
    }

    #[test]
    fn test_json_round_trip() {
        let token = DeviceToken::parse(TOKEN).unwrap();
        let options = NotificationOptions::alert_only("Hello").badge(3).default_sound();
        let job = NotificationJob::new(Some("main".into()), &token, &options);

        let decoded = NotificationJob::from_json(&job.to_json().unwrap()).unwrap();
        assert_eq!(decoded, job);
        assert_eq!(decoded.notification_options().unwrap(), options);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = NotificationJob::from_value(TOKEN, json!("a"));
        let b = NotificationJob::from_value(TOKEN, json!("a"));
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_perform_unknown_app() {
        let apps = Applications::new("default");
        let job = NotificationJob::from_value(TOKEN, json!("hi"));
        assert!(matches!(
            job.perform(&apps).await,
            Err(crate::Error::UnknownApplication(_))
        ));
    }
}
