use axum::{
    debug_handler,
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppResult, AppState,
    session::{IDENTITY, Identity},
};

use super::{Accounts, AuthProvider, login::safe_return_url};

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    State(accounts): State<Accounts>,
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(identity) = session.get::<Identity>(IDENTITY).await? {
        info!(user_id = %identity.id, "logging out");
    }
    // open chat sockets of this session stop sending
    if let Some(auth) = session.id().and_then(|key| accounts.end_session(key)) {
        auth.sign_out().await;
    }
    session.flush().await?;
    Ok(Redirect::to(&safe_return_url(return_url, "/login")))
}
