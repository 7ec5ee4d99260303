//! In-memory collaborators for unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    bus::{BroadcastBus, ChangeEvent, EventKind},
    compose::Outlets,
    device::{Coordinates, Geolocator, PositionOptions},
    enrich::{ContentSource, Item},
    error::{BlobError, DeviceError, SourceError, StoreError},
    session::{Identity, SessionContext},
    store::{BlobStore, LocationRecord, LocationSink, MESSAGES, Message, MessageStore, NewMessage},
};

pub fn signed_in_as(name: &str) -> SessionContext {
    SessionContext::fixed(Some(Identity {
        id: Uuid::now_v7(),
        email: format!("{name}@example.com"),
    }))
}

pub fn signed_out() -> SessionContext {
    SessionContext::fixed(None)
}

pub fn message(content: &str) -> Message {
    Message {
        id: Uuid::now_v7(),
        user_id: Uuid::now_v7(),
        content: content.to_owned(),
        inserted_at: OffsetDateTime::now_utc(),
        author: None,
    }
}

#[derive(Clone)]
pub struct Fakes {
    pub bus: BroadcastBus,
    pub store: Arc<FakeStore>,
    pub blobs: Arc<FakeBlobs>,
    pub locations: Arc<FakeLocations>,
    pub source: Arc<FakeSource>,
}

impl Default for Fakes {
    fn default() -> Self {
        let bus = BroadcastBus::new(64);
        Self {
            store: Arc::new(FakeStore::new(bus.clone())),
            bus,
            blobs: Arc::default(),
            locations: Arc::default(),
            source: Arc::new(FakeSource::new(&["Castle in the Sky"])),
        }
    }
}

impl Fakes {
    pub fn outlets(&self) -> Outlets {
        Outlets {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            locations: self.locations.clone(),
            source: self.source.clone(),
        }
    }
}

/// Keeps messages in a vector and publishes inserts on its bus.
pub struct FakeStore {
    bus: BroadcastBus,
    messages: Mutex<Vec<Message>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FakeStore {
    fn new(bus: BroadcastBus) -> Self {
        Self {
            bus,
            messages: Mutex::default(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn contents(&self) -> Vec<String> {
        self.messages.lock().unwrap().iter().map(|m| m.content.clone()).collect()
    }

    pub fn seed(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for FakeStore {
    async fn query_ordered(&self) -> Result<Vec<Message>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidRecord("store offline".to_owned()));
        }
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn insert(&self, record: NewMessage) -> Result<Message, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidRecord("write rejected".to_owned()));
        }
        let message = Message {
            id: Uuid::now_v7(),
            user_id: record.user_id,
            content: record.content,
            inserted_at: OffsetDateTime::now_utc(),
            author: None,
        };
        self.messages.lock().unwrap().push(message.clone());
        self.bus.publish(ChangeEvent {
            collection: MESSAGES.to_owned(),
            kind: EventKind::Insert,
            record: message.clone(),
        });
        Ok(message)
    }
}

#[derive(Default)]
pub struct FakeBlobs {
    uploads: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
    fail_urls: AtomicBool,
}

impl FakeBlobs {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_urls(&self, fail: bool) {
        self.fail_urls.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FakeBlobs {
    async fn upload(&self, path: &str, _bytes: &[u8], _content_type: &str) -> Result<(), BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::InvalidPath(path.to_owned()));
        }
        self.uploads.lock().unwrap().push(path.to_owned());
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<String, BlobError> {
        if self.fail_urls.load(Ordering::SeqCst) {
            return Err(BlobError::Missing(path.to_owned()));
        }
        Ok(format!("https://blobs.test/{path}"))
    }
}

#[derive(Default)]
pub struct FakeLocations {
    recorded: AtomicUsize,
    fail: AtomicBool,
}

impl FakeLocations {
    pub fn recorded(&self) -> usize {
        self.recorded.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationSink for FakeLocations {
    async fn record(&self, _location: LocationRecord) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidRecord("mirror offline".to_owned()));
        }
        self.recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSource {
    titles: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeSource {
    fn new(titles: &[&str]) -> Self {
        let source = Self { titles: Mutex::default(), fail: AtomicBool::new(false) };
        source.set_titles(titles);
        source
    }

    pub fn set_titles(&self, titles: &[&str]) {
        *self.titles.lock().unwrap() = titles.iter().map(|t| t.to_string()).collect();
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_collection(&self) -> Result<Vec<Item>, SourceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::Payload("connection reset".to_owned()));
        }
        let items = self
            .titles
            .lock()
            .unwrap()
            .iter()
            .map(|title| {
                json!({
                    "title": title,
                    "director": "Hayao Miyazaki",
                    "release_date": "1986",
                    "description": "x".repeat(300),
                })
                .as_object()
                .cloned()
                .unwrap_or_default()
            })
            .collect();
        Ok(items)
    }
}

/// A geolocator that never answers.
pub struct NeverLocates;

#[async_trait]
impl Geolocator for NeverLocates {
    async fn current_position(&self, _options: PositionOptions) -> Result<Coordinates, DeviceError> {
        std::future::pending().await
    }
}
