use axum::{
    Form, debug_handler,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::warn;

use crate::{
    AppResult, AppState,
    format::escape_html,
    include_res,
    session::{IDENTITY, RETURN_URL},
};

use super::{Accounts, AuthProvider, NewProfile, PasswordAuth};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub(crate) struct SignupForm {
    email: String,
    password: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    avatar_url: String,
}

fn page(error: &str, notice: &str) -> Html<String> {
    Html(
        include_res!(str, "/pages/login.html")
            .replace("{error}", &escape_html(error))
            .replace("{notice}", &escape_html(notice)),
    )
}

#[debug_handler]
pub(crate) async fn login_page(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    session: Session,
) -> AppResult<Response> {
    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, safe_return_url(Some(return_url), "/chat")).await?;
    }
    Ok(page("", "").into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(accounts): State<Accounts>,
    session: Session,
    Form(LoginForm { email, password }): Form<LoginForm>,
) -> AppResult<Response> {
    let auth = PasswordAuth::new(accounts);
    let identity = match auth.sign_in(&email, &password).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(%err, "sign-in rejected");
            return Ok(page(&err.to_string(), "").into_response());
        }
    };

    session.cycle_id().await?;
    session.insert(IDENTITY, identity).await?;

    let return_url = safe_return_url(session.remove::<String>(RETURN_URL).await?, "/chat");
    Ok(Redirect::to(&return_url).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(accounts): State<Accounts>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let auth = PasswordAuth::new(accounts);
    let profile = NewProfile {
        name: form.name,
        avatar_url: Some(form.avatar_url),
    };

    match auth.sign_up(&form.email, &form.password, profile).await {
        Ok(_) => Ok(page("", "Account created. You can sign in now.").into_response()),
        Err(err) => {
            warn!(%err, "sign-up rejected");
            Ok(page(&err.to_string(), "").into_response())
        }
    }
}

/// Keeps redirects on this site: only a local absolute path is followed,
/// anything else falls back.
pub(super) fn safe_return_url(return_url: Option<String>, fallback: &str) -> String {
    match return_url {
        Some(url) if is_local_path(&url) => url,
        Some(url) => {
            warn!(%url, "ignoring off-site return url");
            fallback.to_owned()
        }
        None => fallback.to_owned(),
    }
}

// browsers read `/\host` as `//host` and drop tabs and newlines
fn is_local_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.starts_with("/\\")
        && !url.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_are_followed() {
        assert_eq!(safe_return_url(Some("/chat?x=1".to_owned()), "/"), "/chat?x=1");
        assert_eq!(safe_return_url(Some("/".to_owned()), "/chat"), "/");
        assert_eq!(safe_return_url(None, "/chat"), "/chat");
    }

    #[test]
    fn off_site_targets_fall_back() {
        for url in [
            "https://evil.test/",
            "//evil.test/",
            "/\\evil.test",
            "/\t/evil.test",
            "javascript:alert(1)",
            "chat",
            "",
        ] {
            assert_eq!(safe_return_url(Some(url.to_owned()), "/login"), "/login", "{url:?}");
        }
    }
}
