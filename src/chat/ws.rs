use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::{
    AppResult, AppState,
    auth::{Accounts, AuthProvider, PasswordAuth},
    bus::BroadcastBus,
    compose::{Composer, GeoDraft, Outlets},
    controller::{ChatSession, UiEvent, UserAction},
    device::Coordinates,
    error::ChatError,
    format::map_link,
    session::{IDENTITY, Identity},
    sync::SyncEngine,
};

use super::msg::{msg_to_html, msgs_to_html};

/// What the page sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction {
    SendText { text: String },
    CaptureLocation { position: Option<Coordinates> },
    DiscardLocation,
    SendLocation,
    CapturePhoto { image_base64: Option<String> },
    SendEnriched,
}

impl From<ClientAction> for UserAction {
    fn from(action: ClientAction) -> Self {
        match action {
            ClientAction::SendText { text } => UserAction::SendText(text),
            ClientAction::CaptureLocation { position } => UserAction::CaptureLocation(position),
            ClientAction::DiscardLocation => UserAction::DiscardLocation,
            ClientAction::SendLocation => UserAction::SendLocation,
            ClientAction::CapturePhoto { image_base64 } => {
                UserAction::CapturePhoto(image_base64.and_then(|data| decode_image(&data)))
            }
            ClientAction::SendEnriched => UserAction::SendEnriched,
        }
    }
}

/// What the page receives.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Frame {
    Reset { html: String },
    Append { html: String },
    Scroll,
    Notice { text: String },
    Draft { text: Option<String> },
    InputCleared,
}

impl From<UiEvent> for Frame {
    fn from(event: UiEvent) -> Self {
        match event {
            UiEvent::Reset(messages) => Frame::Reset { html: msgs_to_html(&messages) },
            UiEvent::Appended(message) => Frame::Append { html: msg_to_html(&message) },
            UiEvent::ScrollToLatest => Frame::Scroll,
            UiEvent::Notice(text) => Frame::Notice { text },
            UiEvent::DraftChanged(draft) => Frame::Draft {
                text: draft.map(|GeoDraft { latitude, longitude }| map_link(latitude, longitude)),
            },
            UiEvent::InputCleared => Frame::InputCleared,
        }
    }
}

/// Accepts both bare base64 and a `data:` URL.
fn decode_image(data: &str) -> Option<Vec<u8>> {
    let encoded = match data.split_once(";base64,") {
        Some((_, encoded)) => encoded,
        None => data,
    };
    match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!(%err, "unreadable photo payload");
            None
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    State(accounts): State<Accounts>,
    State(outlets): State<Outlets>,
    State(bus): State<BroadcastBus>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(identity) = session.get::<Identity>(IDENTITY).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let auth = match session.id() {
        Some(key) => accounts.restore_session(key, identity),
        None => PasswordAuth::restore(accounts, Some(identity)),
    };
    let chat = ChatSession::new(
        auth.on_identity_change(),
        SyncEngine::new(outlets.store.clone(), Arc::new(bus)),
        Composer::new(outlets),
    );

    Ok(ws.on_upgrade(move |socket| run(socket, auth, chat)))
}

async fn run(socket: WebSocket, auth: PasswordAuth, mut chat: ChatSession) {
    let user_id = auth.current_identity().map(|identity| identity.id);
    info!(?user_id, "chat socket opened");
    let (mut sender, mut receiver) = socket.split();
    let mut signed_in = auth.on_identity_change();

    let events = chat.enter().await;
    if send_events(&mut sender, events).await.is_ok() {
        loop {
            let events = tokio::select! {
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientAction>(text.as_str()) {
                        Ok(action) => chat.handle(action.into()).await,
                        Err(err) => {
                            warn!(%err, "unreadable action");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(%err, "socket error");
                        break;
                    }
                },
                delivered = chat.next_delivery() => match delivered {
                    Some(message) => chat.deliver(message),
                    None => break,
                },
                changed = signed_in.changed() => match changed {
                    Some(Some(_)) => continue,
                    Some(None) | None => {
                        let notice = UiEvent::Notice(ChatError::Unauthenticated.to_string());
                        let _ = send_events(&mut sender, vec![notice]).await;
                        break;
                    }
                },
            };

            if send_events(&mut sender, events).await.is_err() {
                break;
            }
        }
    }

    chat.leave();
    info!(?user_id, "chat socket closed");
}

async fn send_events(
    sender: &mut SplitSink<WebSocket, Message>,
    events: Vec<UiEvent>,
) -> Result<(), axum::Error> {
    for event in events {
        let frame = serde_json::to_string(&Frame::from(event)).map_err(axum::Error::new)?;
        sender.send(Message::Text(frame.into())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_client_actions() {
        let action: ClientAction = serde_json::from_value(json!({"action": "send_text", "text": "hi"})).unwrap();
        assert_eq!(UserAction::from(action), UserAction::SendText("hi".to_owned()));

        let action: ClientAction = serde_json::from_value(json!({
            "action": "capture_location",
            "position": {"latitude": 10.0, "longitude": 20.0}
        }))
        .unwrap();
        assert_eq!(
            UserAction::from(action),
            UserAction::CaptureLocation(Some(Coordinates { latitude: 10.0, longitude: 20.0 }))
        );

        let action: ClientAction = serde_json::from_value(json!({"action": "capture_location"})).unwrap();
        assert_eq!(UserAction::from(action), UserAction::CaptureLocation(None));
    }

    #[test]
    fn photo_payload_decodes() {
        let action: ClientAction = serde_json::from_value(json!({
            "action": "capture_photo",
            "image_base64": "data:image/jpeg;base64,/9j/AA=="
        }))
        .unwrap();
        assert_eq!(UserAction::from(action), UserAction::CapturePhoto(Some(vec![0xff, 0xd8, 0xff, 0x00])));

        assert_eq!(decode_image("not base64!"), None);
    }

    #[test]
    fn frames_serialize_with_type_tag() {
        let frame = Frame::from(UiEvent::DraftChanged(Some(GeoDraft { latitude: 10.0, longitude: 20.0 })));
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "draft", "text": "https://www.google.com/maps?q=10,20"})
        );
        assert_eq!(serde_json::to_value(Frame::Scroll).unwrap(), json!({"type": "scroll"}));
        assert_eq!(
            serde_json::to_value(Frame::from(UiEvent::Notice("nope".to_owned()))).unwrap(),
            json!({"type": "notice", "text": "nope"})
        );
    }
}
