use axum::{debug_handler, response::{Html, IntoResponse, Redirect, Response}};
use tower_sessions::Session;

use crate::{
    AppResult,
    format::escape_html,
    include_res,
    session::{IDENTITY, Identity},
};

#[debug_handler]
pub(crate) async fn chat(session: Session) -> AppResult<Response> {
    let Some(identity) = session.get::<Identity>(IDENTITY).await? else {
        return Ok(Redirect::to("/login?return_url=/chat").into_response());
    };

    // the list itself arrives over the socket
    let body = include_res!(str, "/pages/chat.html")
        .replace("{email}", &escape_html(&identity.email));

    Ok(Html(body).into_response())
}
