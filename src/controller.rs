//! One room visit as seen by a view: lifecycle in, render events out.

use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{
    compose::{Composer, GeoDraft, SendOutcome},
    device::{Coordinates, Geolocator, ReportedPhoto, ReportedPosition},
    format::{Kind, MessageContent, map_link, to_display_markup},
    session::SessionContext,
    store::Message,
    sync::{SyncEngine, ViewUpdate},
};

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    SendText(String),
    /// `None` when the device has no geolocation.
    CaptureLocation(Option<Coordinates>),
    DiscardLocation,
    SendLocation,
    /// `None` when the user cancelled the camera.
    CapturePhoto(Option<Vec<u8>>),
    SendEnriched,
}

/// A message ready for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub id: Uuid,
    pub kind: Kind,
    pub author: String,
    pub avatar_url: Option<String>,
    /// Escaped HTML of the content.
    pub markup: String,
    /// Photo URL or map link, for the kinds that have one.
    pub link: Option<String>,
    pub sent_at: OffsetDateTime,
    pub own: bool,
}

impl DisplayMessage {
    pub fn new(message: &Message, viewer: Option<Uuid>) -> Self {
        let content = message.decoded();
        let link = match &content {
            MessageContent::Photo { url } => Some(url.clone()),
            MessageContent::Location { latitude, longitude } => Some(map_link(*latitude, *longitude)),
            MessageContent::Text(_) | MessageContent::Enriched(_) => None,
        };

        Self {
            id: message.id,
            kind: content.kind(),
            author: message
                .author
                .as_ref()
                .map(|author| author.name.clone())
                .unwrap_or_else(|| "Anonymous".to_owned()),
            avatar_url: message.author.as_ref().and_then(|author| author.avatar_url.clone()),
            markup: to_display_markup(&message.content),
            link,
            sent_at: message.inserted_at,
            own: viewer == Some(message.user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Replace the whole list.
    Reset(Vec<DisplayMessage>),
    Appended(DisplayMessage),
    ScrollToLatest,
    /// Transient notification, e.g. a failed send.
    Notice(String),
    DraftChanged(Option<GeoDraft>),
    InputCleared,
}

pub struct ChatSession {
    session: SessionContext,
    engine: SyncEngine,
    composer: Composer,
}

impl ChatSession {
    pub fn new(session: SessionContext, engine: SyncEngine, composer: Composer) -> Self {
        Self { session, engine, composer }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub async fn enter(&mut self) -> Vec<UiEvent> {
        match self.engine.enter_room().await {
            Ok(()) => {
                let viewer = self.session.user_id();
                let messages = self
                    .engine
                    .view()
                    .messages()
                    .iter()
                    .map(|message| DisplayMessage::new(message, viewer))
                    .collect();
                vec![UiEvent::Reset(messages), UiEvent::ScrollToLatest]
            }
            Err(err) => vec![UiEvent::Reset(Vec::new()), UiEvent::Notice(err.to_string())],
        }
    }

    pub fn leave(&mut self) {
        self.engine.leave_room();
    }

    pub async fn next_delivery(&mut self) -> Option<Message> {
        self.engine.next_delivery().await
    }

    pub fn deliver(&mut self, message: Message) -> Vec<UiEvent> {
        match self.engine.apply(message) {
            Some(ViewUpdate::Appended { message, .. }) => vec![
                UiEvent::Appended(DisplayMessage::new(&message, self.session.user_id())),
                UiEvent::ScrollToLatest,
            ],
            None => Vec::new(),
        }
    }

    /// Runs a user action. Failures come back as a notice, never as an error.
    pub async fn handle(&mut self, action: UserAction) -> Vec<UiEvent> {
        let session = &self.session;
        let composer = &mut self.composer;

        let result = match action {
            UserAction::SendText(text) => {
                composer.set_input(&text);
                let raw = composer.input().to_owned();
                composer.send_text(session, &raw).await.map(|outcome| match outcome {
                    SendOutcome::Sent(_) => vec![UiEvent::InputCleared],
                    SendOutcome::Nothing => Vec::new(),
                })
            }
            UserAction::CaptureLocation(reading) => {
                let locator = reading.map(|coords| ReportedPosition(Some(coords)));
                composer
                    .capture_location(session, locator.as_ref().map(|l| l as &dyn Geolocator))
                    .await
                    .map(|draft| vec![UiEvent::DraftChanged(Some(draft))])
            }
            UserAction::DiscardLocation => {
                composer.discard_location();
                Ok(vec![UiEvent::DraftChanged(None)])
            }
            UserAction::SendLocation => composer
                .send_location(session)
                .await
                .map(|_| vec![UiEvent::DraftChanged(None)]),
            UserAction::CapturePhoto(data) => composer
                .capture_photo(session, Some(&ReportedPhoto(data)))
                .await
                .map(|_| Vec::new()),
            UserAction::SendEnriched => composer.send_enriched(session).await.map(|_| Vec::new()),
        };

        result.unwrap_or_else(|err| {
            warn!(%err, "action failed");
            vec![UiEvent::Notice(err.to_string())]
        })
    }
}
