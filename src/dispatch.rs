//! Notification dispatch strategies.
//!
//! The strategy is fixed at startup from [`DispatcherKind`]: deliver on the
//! calling task, hand a [`NotificationJob`] to a queue, or drop.

use apn_config::DispatcherKind;
use apn_push::{Delivery, DeviceToken, Notification, NotificationOptions};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::job::{JobId, NotificationJob};
use crate::{Applications, Error, Result};

/// A job queue that accepts notification jobs.
///
/// Implemented by the caller on top of whatever queue backend it runs. The
/// worker side deserializes the job and calls [`NotificationJob::perform`].
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Add a job to the queue.
    async fn enqueue(&self, job: NotificationJob) -> Result<()>;
}

/// What happened to a dispatched notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Sent to the gateway.
    Delivered(Delivery),
    /// Handed to the queue.
    Enqueued(JobId),
    /// Discarded by the null dispatcher.
    Dropped,
}

/// Routes notifications according to the configured strategy.
#[derive(Clone)]
pub enum Dispatcher {
    /// Encode and deliver on the caller's task.
    Inline(Arc<Applications>),
    /// Enqueue for a worker.
    Queued(Arc<dyn NotificationQueue>),
    /// Log and discard.
    Null,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(apps) => f.debug_tuple("Inline").field(&apps.names()).finish(),
            Self::Queued(_) => f.write_str("Queued"),
            Self::Null => f.write_str("Null"),
        }
    }
}

impl Dispatcher {
    /// Build the dispatcher selected by configuration.
    ///
    /// A queued dispatcher needs a queue; the others ignore it.
    pub fn from_kind(
        kind: DispatcherKind,
        apps: Arc<Applications>,
        queue: Option<Arc<dyn NotificationQueue>>,
    ) -> Result<Self> {
        match kind {
            DispatcherKind::Inline => Ok(Self::Inline(apps)),
            DispatcherKind::Queued => queue
                .map(Self::Queued)
                .ok_or_else(|| Error::Queue("queued dispatch selected but no queue given".into())),
            DispatcherKind::Null => Ok(Self::Null),
        }
    }

    /// The configured strategy.
    pub fn kind(&self) -> DispatcherKind {
        match self {
            Self::Inline(_) => DispatcherKind::Inline,
            Self::Queued(_) => DispatcherKind::Queued,
            Self::Null => DispatcherKind::Null,
        }
    }

    /// Send to the default application.
    pub async fn notify(&self, token: &str, options: NotificationOptions) -> Result<Dispatched> {
        self.notify_app(None, token, options).await
    }

    /// Send to a named application.
    pub async fn notify_app(
        &self,
        app: Option<&str>,
        token: &str,
        options: NotificationOptions,
    ) -> Result<Dispatched> {
        match self {
            Self::Inline(apps) => {
                let delivery = apps.get(app)?.notify(token, options).await?;
                Ok(Dispatched::Delivered(delivery))
            }
            Self::Queued(queue) => {
                // Reject bad input before it reaches a worker.
                let token = DeviceToken::parse(token)?;
                let notification = Notification::for_device(token, options)?;
                let job = NotificationJob::new(
                    app.map(str::to_string),
                    notification.token(),
                    notification.options(),
                );
                let id = job.id;
                queue.enqueue(job).await?;
                debug!(job_id = %id, "Notification enqueued");
                Ok(Dispatched::Enqueued(id))
            }
            Self::Null => {
                info!(
                    app = app.unwrap_or("default"),
                    token = %apn_push::normalize_token(token),
                    "Null dispatcher dropped notification"
                );
                Ok(Dispatched::Dropped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    const TOKEN: &str = "2589b1aa363d23d8d7f166951a9e3ff41fb0130a637d6997a2080d881b2a19b5";

    #[derive(Default)]
    struct MemoryQueue {
        jobs: Mutex<Vec<NotificationJob>>,
    }

    #[async_trait]
    impl NotificationQueue for MemoryQueue {
        async fn enqueue(&self, job: NotificationJob) -> Result<()> {
            self.jobs.lock().await.push(job);
            Ok(())
        }
    }

    fn apps() -> Arc<Applications> {
        Arc::new(Applications::new("default"))
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            Dispatcher::from_kind(DispatcherKind::Null, apps(), None).unwrap().kind(),
            DispatcherKind::Null
        );
        assert_eq!(
            Dispatcher::from_kind(DispatcherKind::Inline, apps(), None).unwrap().kind(),
            DispatcherKind::Inline
        );
        assert!(matches!(
            Dispatcher::from_kind(DispatcherKind::Queued, apps(), None),
            Err(Error::Queue(_))
        ));
    }

    #[tokio::test]
    async fn test_null_drops() {
        let result = Dispatcher::Null
            .notify(TOKEN, NotificationOptions::alert_only("hi"))
            .await
            .unwrap();
        assert_eq!(result, Dispatched::Dropped);
    }

    #[tokio::test]
    async fn test_queued_normalizes_token() {
        let queue = Arc::new(MemoryQueue::default());
        let dispatcher = Dispatcher::Queued(queue.clone());

        let spaced = format!("<{}>", TOKEN.to_uppercase());
        let result = dispatcher
            .notify_app(Some("beta"), &spaced, NotificationOptions::new().badge(2))
            .await
            .unwrap();

        let jobs = queue.jobs.lock().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(result, Dispatched::Enqueued(jobs[0].id));
        assert_eq!(jobs[0].token, TOKEN);
        assert_eq!(jobs[0].app.as_deref(), Some("beta"));
    }

    #[tokio::test]
    async fn test_queued_rejects_invalid_input() {
        let queue = Arc::new(MemoryQueue::default());
        let dispatcher = Dispatcher::Queued(queue.clone());

        assert!(dispatcher
            .notify("abc", NotificationOptions::alert_only("hi"))
            .await
            .is_err());
        assert!(dispatcher
            .notify(TOKEN, NotificationOptions::new().category("X"))
            .await
            .is_err());
        assert!(queue.jobs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_inline_unknown_app() {
        let dispatcher = Dispatcher::Inline(apps());
        let err = dispatcher
            .notify_app(Some("missing"), TOKEN, NotificationOptions::alert_only("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownApplication(name) if name == "missing"));
    }
}
