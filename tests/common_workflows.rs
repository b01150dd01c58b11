//! Integration tests for common sender workflows.
//!
//! A producer dispatches, a queue carries the job as JSON, and a worker
//! performs it against in-memory gateway connections.

use apn_sender::prelude::*;
use apn_sender::push::{Connector, GatewayStream};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, DuplexStream};

const TOKEN: &str = "2589b1aa363d23d8d7f166951a9e3ff41fb0130a637d6997a2080d881b2a19b5";

/// Every connect yields a fresh in-memory stream; server halves are kept.
#[derive(Default)]
struct MemoryGateway {
    servers: Mutex<Vec<DuplexStream>>,
}

#[async_trait]
impl Connector for MemoryGateway {
    async fn connect(&self) -> apn_sender::push::Result<Box<dyn GatewayStream>> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.servers.lock().unwrap().push(server);
        Ok(Box::new(client))
    }

    fn endpoint(&self) -> String {
        "memory:2195".into()
    }
}

/// Stores jobs as serialized JSON, the way a real backend would.
#[derive(Default)]
struct JsonQueue {
    jobs: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationQueue for JsonQueue {
    async fn enqueue(&self, job: NotificationJob) -> apn_sender::Result<()> {
        let json = job.to_json()?;
        self.jobs.lock().unwrap().push(json);
        Ok(())
    }
}

fn gateway_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.error_read_timeout = Duration::from_millis(20);
    config
}

fn application(name: &str, gateway: Arc<MemoryGateway>) -> Application {
    let config = gateway_config();
    let service = PushService::with_connectors(&config, gateway, None).unwrap();
    Application::new(name, config, service)
}

async fn received_payload(gateway: &MemoryGateway) -> serde_json::Value {
    let mut server = gateway.servers.lock().unwrap().remove(0);
    let mut header = [0u8; 38];
    server.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[..3], &[0, 0, 32]);
    assert_eq!(hex::encode(&header[3..35]), TOKEN);

    let len = u16::from_be_bytes([header[36], header[37]]) as usize;
    let mut payload = vec![0u8; len];
    server.read_exact(&mut payload).await.unwrap();
    serde_json::from_slice(&payload).unwrap()
}

// =============================================================================
// Inline Dispatch
// =============================================================================

#[tokio::test]
async fn test_inline_dispatch_reaches_named_app() {
    let main = Arc::new(MemoryGateway::default());
    let beta = Arc::new(MemoryGateway::default());

    let mut apps = Applications::new("main");
    apps.insert(application("main", main.clone()));
    apps.insert(application("beta", beta.clone()));
    let apps = Arc::new(apps);

    let dispatcher = Dispatcher::from_kind(DispatcherKind::Inline, apps.clone(), None).unwrap();

    let result = dispatcher
        .notify_app(
            Some("beta"),
            TOKEN,
            NotificationOptions::alert_only("Hello beta").badge(1),
        )
        .await
        .unwrap();
    assert!(matches!(result, Dispatched::Delivered(Delivery { attempts: 1, .. })));

    let payload = received_payload(&beta).await;
    assert_eq!(payload["aps"]["alert"], "Hello beta");
    assert!(main.servers.lock().unwrap().is_empty());

    apps.shutdown().await;
    let err = dispatcher
        .notify(TOKEN, NotificationOptions::alert_only("after shutdown"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Push(PushError::PoolClosed)));
}

// =============================================================================
// Queued Dispatch
// =============================================================================

#[tokio::test]
async fn test_queued_job_is_performed_by_worker() {
    let gateway = Arc::new(MemoryGateway::default());
    let mut apps = Applications::new("default");
    apps.insert(application("default", gateway.clone()));
    let apps = Arc::new(apps);

    let queue = Arc::new(JsonQueue::default());
    let producer = Dispatcher::from_kind(
        DispatcherKind::Queued,
        apps.clone(),
        Some(queue.clone() as Arc<dyn NotificationQueue>),
    )
    .unwrap();

    let options = NotificationOptions::alert_only("From the queue")
        .default_sound()
        .custom("conversation", json!({"id": 42}));
    let spaced = "2589b1aa 363d23d8 d7f16695 1a9e3ff4 1fb0130a 637d6997 a2080d88 1b2a19b5";
    let Dispatched::Enqueued(id) = producer.notify(spaced, options).await.unwrap() else {
        panic!("expected the notification to be enqueued");
    };

    // Worker side.
    let json = queue.jobs.lock().unwrap().remove(0);
    let job = NotificationJob::from_json(&json).unwrap();
    assert_eq!(job.id, id);
    job.perform(&apps).await.unwrap();

    let payload = received_payload(&gateway).await;
    assert_eq!(payload["aps"]["alert"], "From the queue");
    assert_eq!(payload["aps"]["sound"], "default");
    assert_eq!(payload["conversation"]["id"], 42);
}

#[tokio::test]
async fn test_foreign_producer_job() {
    let gateway = Arc::new(MemoryGateway::default());
    let mut apps = Applications::new("default");
    apps.insert(application("default", gateway.clone()));
    apps.insert(application("beta", Arc::new(MemoryGateway::default())));

    // Loosely typed options as another language would enqueue them.
    let job = NotificationJob::from_value(
        format!("<{TOKEN}>"),
        json!({"alert": "Loose", "badge": "7", "sound": true, "content_available": 1, "app": "default"}),
    );
    job.perform(&apps).await.unwrap();

    let payload = received_payload(&gateway).await;
    assert_eq!(payload["aps"]["badge"], 7);
    assert_eq!(payload["aps"]["content-available"], 1);
    assert!(payload.get("app").is_none());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_selects_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apn.json");
    let json = serde_json::json!({
        "dispatcher": "null",
        "apps": {
            "default": {
                "environment": "sandbox",
                "certificate": {"root": {"root": dir.path()}}
            }
        }
    });
    std::fs::write(&path, json.to_string()).unwrap();

    let config = apn_sender::config::SenderConfig::load_with_env(
        &path,
        &apn_sender::config::EnvLoader::new(Some("APNWORKFLOWTEST".into())),
    )
    .unwrap();
    assert_eq!(config.dispatcher, DispatcherKind::Null);

    // No certificate exists in the temp dir, so registering fails loudly.
    assert!(Applications::from_config(&config).is_err());

    let dispatcher =
        Dispatcher::from_kind(config.dispatcher, Arc::new(Applications::new("default")), None)
            .unwrap();
    assert_eq!(dispatcher.kind(), DispatcherKind::Null);
}

#[test]
fn test_remove_device_classification() {
    let err = Error::from(PushError::InvalidToken("abc".into()));
    assert!(err.should_remove_device());
    assert!(!Error::UnknownApplication("x".into()).should_remove_device());
}
