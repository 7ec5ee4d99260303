mod msg;
mod page;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::chat))
        .route("/ws", get(ws::chat_ws))
}
