use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{
    AppResult,
    session::{IDENTITY, Identity},
};

#[debug_handler]
pub async fn index(session: Session) -> AppResult<Redirect> {
    if session.get::<Identity>(IDENTITY).await?.is_some() {
        Ok(Redirect::to("/chat"))
    } else {
        Ok(Redirect::to("/login"))
    }
}
