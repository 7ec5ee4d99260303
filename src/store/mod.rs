//! Persistence collaborators: the message log, photo blobs and the
//! location mirror.

mod blob;
mod sqlite;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::{BlobError, StoreError},
    format::MessageContent,
};

pub use blob::LocalBlobStore;
pub use sqlite::{SqliteLocationSink, SqliteMessageStore};

/// Name of the message collection on the store and the bus.
pub const MESSAGES: &str = "messages";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorProfile {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A persisted chat message. `id` and `inserted_at` come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub inserted_at: OffsetDateTime,
    pub author: Option<AuthorProfile>,
}

impl Message {
    pub fn decoded(&self) -> MessageContent {
        MessageContent::decode(&self.content)
    }
}

/// What a client submits; everything else is assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub user_id: Uuid,
    pub content: String,
}

impl NewMessage {
    pub fn new(user_id: Uuid, content: &MessageContent) -> Self {
        Self { user_id, content: content.encode() }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All messages, oldest first.
    async fn query_ordered(&self) -> Result<Vec<Message>, StoreError>;

    async fn insert(&self, record: NewMessage) -> Result<Message, StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError>;

    async fn resolve_url(&self, path: &str) -> Result<String, BlobError>;
}

/// Raw coordinates mirrored next to a location message.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: OffsetDateTime,
}

#[async_trait]
pub trait LocationSink: Send + Sync {
    async fn record(&self, location: LocationRecord) -> Result<(), StoreError>;
}
