//! Test doubles for engines, object storage and caller webhooks
#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use image_relay::config::{BatchSettings, CallbackSettings};
use image_relay::services::callback::CallbackDispatcher;
use image_relay::services::engine::{
    EngineError, EngineFacade, ImageEngine, OutputFormat, ProcessingResult,
};
use image_relay::services::storage::{ListPage, ObjectStore, StorageError};

pub const INPUT_BUCKET: &str = "input-images";
pub const OUTPUT_BUCKET: &str = "wxo-images";
pub const OUTPUT_PREFIX: &str = "results/batch";

type Behavior = Box<dyn Fn(&[u8]) -> Result<ProcessingResult, EngineError> + Send + Sync>;

/// Engine whose response is decided per call by a closure.
pub struct FakeEngine {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(
        behavior: impl Fn(&[u8]) -> Result<ProcessingResult, EngineError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            behavior: Box::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    /// Echoes the input back with a marker prefix.
    pub fn echo(marker: &'static str, format: OutputFormat) -> Arc<Self> {
        Self::new(move |image| {
            let mut bytes = marker.as_bytes().to_vec();
            bytes.extend_from_slice(image);
            Ok(ProcessingResult::new(bytes, format))
        })
    }

    pub fn quota() -> Arc<Self> {
        Self::new(|_| {
            Err(EngineError::Quota(
                "400 Bad Request: billing_hard_limit_reached".to_string(),
            ))
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Self::new(|_| Err(EngineError::Unavailable("503 Service Unavailable".to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEngine for FakeEngine {
    async fn edit(&self, image: &[u8], _prompt: &str) -> Result<ProcessingResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.behavior)(image)
    }
}

pub fn facade(primary: Arc<FakeEngine>, fallback: Arc<FakeEngine>) -> Arc<EngineFacade> {
    Arc::new(EngineFacade::new(Ok(primary), fallback))
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory object store with paging and failure injection.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    page_size: usize,
    fail_puts_containing: Mutex<HashSet<String>>,
    fail_gets: Mutex<HashSet<String>>,
    fail_presign: bool,
    list_pages_served: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            page_size: 1000,
            ..Self::default()
        })
    }

    pub fn with_page_size(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            page_size,
            ..Self::default()
        })
    }

    pub fn failing_presign() -> Arc<Self> {
        Arc::new(Self {
            page_size: 1000,
            fail_presign: true,
            ..Self::default()
        })
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn fail_puts_containing(&self, fragment: &str) {
        self.fail_puts_containing
            .lock()
            .unwrap()
            .insert(fragment.to_string());
    }

    pub fn fail_get(&self, key: &str) {
        self.fail_gets.lock().unwrap().insert(key.to_string());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn list_pages_served(&self) -> usize {
        self.list_pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        if self.fail_gets.lock().unwrap().contains(key) {
            return Err(StorageError::read(key, "HTTP 500"));
        }
        self.object(bucket, key)
            .map(|o| o.bytes)
            .ok_or_else(|| StorageError::read(key, "HTTP 404"))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let rejected = self
            .fail_puts_containing
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if rejected {
            return Err(StorageError::write(key, "HTTP 403"));
        }

        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage, StorageError> {
        self.list_pages_served.fetch_add(1, Ordering::SeqCst);
        let offset: usize = token.as_deref().map_or(0, |t| t.parse().unwrap());

        let matching: Vec<String> = self
            .keys_in(bucket)
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        let end = (offset + self.page_size).min(matching.len());

        Ok(ListPage {
            keys: matching[offset..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn presign(&self, bucket: &str, key: &str, ttl_secs: u32) -> Result<String, StorageError> {
        if self.fail_presign {
            return Err(StorageError::Presign {
                key: key.to_string(),
                reason: "signature generation failed".to_string(),
            });
        }
        Ok(format!(
            "https://storage.test/{bucket}/{key}?X-Amz-Expires={ttl_secs}"
        ))
    }
}

pub fn batch_settings() -> BatchSettings {
    BatchSettings {
        input_bucket: Some(INPUT_BUCKET.to_string()),
        input_prefix: String::new(),
        output_bucket: OUTPUT_BUCKET.to_string(),
        output_prefix: OUTPUT_PREFIX.to_string(),
        concurrency: 1,
    }
}

pub fn dispatcher() -> Arc<CallbackDispatcher> {
    Arc::new(
        CallbackDispatcher::new(&CallbackSettings {
            internal_host: "wxo-server".to_string(),
            internal_port: 4321,
            tunnel_netloc: None,
            connect_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(2),
        })
        .unwrap(),
    )
}

#[derive(Clone)]
struct ReceiverState {
    payloads: Arc<Mutex<Vec<Value>>>,
    status: StatusCode,
    delay: Duration,
    notify: Arc<Notify>,
}

/// A caller webhook listening on an ephemeral local port.
pub struct WebhookReceiver {
    pub addr: std::net::SocketAddr,
    state: ReceiverState,
}

impl WebhookReceiver {
    pub async fn start() -> Self {
        Self::start_with(StatusCode::OK, Duration::ZERO).await
    }

    pub async fn start_with(status: StatusCode, delay: Duration) -> Self {
        let state = ReceiverState {
            payloads: Arc::new(Mutex::new(Vec::new())),
            status,
            delay,
            notify: Arc::new(Notify::new()),
        };

        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.state.payloads.lock().unwrap().clone()
    }

    /// Wait until at least `count` callbacks arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let notified = self.state.notify.notified();
                if self.payloads().len() >= count {
                    return self.payloads();
                }
                notified.await;
            }
        })
        .await
        .expect("callback not received in time")
    }
}

async fn receive(State(state): State<ReceiverState>, Json(payload): Json<Value>) -> StatusCode {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.payloads.lock().unwrap().push(payload);
    state.notify.notify_waiters();
    state.status
}

/// A URL nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/hook")
}
