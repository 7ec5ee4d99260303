//! Building and submitting outgoing messages.
//!
//! The composer only writes to the store. What was sent shows up in the room
//! the same way as everybody else's messages, through the bus.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    device::{Camera, Geolocator, PositionOptions},
    enrich::{ContentSource, excerpt_from_item},
    error::{ChatError, ChatResult, DeviceError},
    format::MessageContent,
    session::{Identity, SessionContext},
    store::{BlobStore, LocationRecord, LocationSink, Message, MessageStore, NewMessage},
};

const PHOTO_DIR: &str = "chat_photos";

/// The collaborators a composer writes through.
#[derive(Clone)]
pub struct Outlets {
    pub store: Arc<dyn MessageStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub locations: Arc<dyn LocationSink>,
    pub source: Arc<dyn ContentSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoDraft {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(Uuid),
    /// Blank input, nothing went out.
    Nothing,
}

pub struct Composer {
    outlets: Outlets,
    input: String,
    draft: Option<GeoDraft>,
    position_options: PositionOptions,
}

impl Composer {
    pub fn new(outlets: Outlets) -> Self {
        Self {
            outlets,
            input: String::new(),
            draft: None,
            position_options: PositionOptions::default(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: &str) {
        self.input.clear();
        self.input.push_str(text);
    }

    pub fn draft(&self) -> Option<GeoDraft> {
        self.draft
    }

    pub fn discard_location(&mut self) {
        self.draft = None;
    }

    /// Sends `raw` trimmed. The input buffer is cleared only once the store
    /// accepted the message.
    pub async fn send_text(&mut self, session: &SessionContext, raw: &str) -> ChatResult<SendOutcome> {
        let identity = signed_in(session)?;

        let text = raw.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Nothing);
        }

        let message = self.persist(&identity, MessageContent::Text(text.to_owned())).await?;
        self.input.clear();
        Ok(SendOutcome::Sent(message.id))
    }

    /// Takes a position fix and keeps it as the draft. A failed fix leaves the
    /// previous draft alone.
    pub async fn capture_location(
        &mut self,
        session: &SessionContext,
        locator: Option<&dyn Geolocator>,
    ) -> ChatResult<GeoDraft> {
        signed_in(session)?;
        let locator = locator.ok_or(DeviceError::Unsupported)?;

        let options = self.position_options;
        let coords = tokio::time::timeout(options.timeout, locator.current_position(options))
            .await
            .map_err(|_| DeviceError::Timeout)??;

        let valid = (-90.0..=90.0).contains(&coords.latitude)
            && (-180.0..=180.0).contains(&coords.longitude);
        if !valid {
            return Err(ChatError::LocationUnavailable(format!(
                "position out of range: {},{}",
                coords.latitude, coords.longitude
            )));
        }

        let draft = GeoDraft { latitude: coords.latitude, longitude: coords.longitude };
        self.draft = Some(draft);
        Ok(draft)
    }

    pub async fn send_location(&mut self, session: &SessionContext) -> ChatResult<SendOutcome> {
        let identity = signed_in(session)?;
        let GeoDraft { latitude, longitude } = self.draft.ok_or(ChatError::NoDraft)?;

        let mirrored = self
            .outlets
            .locations
            .record(LocationRecord {
                user_id: identity.id,
                latitude,
                longitude,
                recorded_at: OffsetDateTime::now_utc(),
            })
            .await;
        if let Err(err) = mirrored {
            warn!(user_id = %identity.id, %err, "could not mirror location");
        }

        let message = self
            .persist(&identity, MessageContent::Location { latitude, longitude })
            .await?;
        self.draft = None;
        Ok(SendOutcome::Sent(message.id))
    }

    /// Takes one photo, uploads it and posts its URL. Nothing is posted unless
    /// the upload and the URL lookup both succeed.
    pub async fn capture_photo(
        &self,
        session: &SessionContext,
        camera: Option<&dyn Camera>,
    ) -> ChatResult<SendOutcome> {
        let identity = signed_in(session)?;
        let camera = camera.ok_or(ChatError::CaptureCancelled)?;

        let photo = match camera.capture().await {
            Ok(Some(photo)) if !photo.data.is_empty() => photo,
            Ok(_) => return Err(ChatError::CaptureCancelled),
            Err(err) => {
                warn!(%err, "camera failed");
                return Err(ChatError::CaptureCancelled);
            }
        };

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let path = format!("{PHOTO_DIR}/{}_{millis}.jpeg", identity.id);
        self.outlets
            .blobs
            .upload(&path, &photo.data, &photo.content_type)
            .await?;
        let url = self.outlets.blobs.resolve_url(&path).await?;

        let message = self.persist(&identity, MessageContent::Photo { url }).await?;
        Ok(SendOutcome::Sent(message.id))
    }

    /// Posts an excerpt of one random entry from the content source.
    pub async fn send_enriched(&self, session: &SessionContext) -> ChatResult<SendOutcome> {
        let identity = signed_in(session)?;

        let items = self.outlets.source.fetch_collection().await?;
        let item = items
            .choose(&mut rand::rng())
            .ok_or_else(|| ChatError::SourceUnavailable("empty collection".to_owned()))?;
        let excerpt = excerpt_from_item(item)?;

        let message = self.persist(&identity, MessageContent::Enriched(excerpt)).await?;
        Ok(SendOutcome::Sent(message.id))
    }

    async fn persist(&self, identity: &Identity, content: MessageContent) -> ChatResult<Message> {
        let kind = content.kind();
        let message = self
            .outlets
            .store
            .insert(NewMessage::new(identity.id, &content))
            .await?;
        info!(id = %message.id, user_id = %identity.id, ?kind, "message sent");
        Ok(message)
    }
}

fn signed_in(session: &SessionContext) -> ChatResult<Identity> {
    session.identity().ok_or(ChatError::Unauthenticated)
}
