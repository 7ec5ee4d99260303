use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use axum::{Router, routing::{get, post}};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::watch;
use tower_sessions::session::Id;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    AppState,
    error::AuthError,
    session::{Identity, SessionContext},
};

mod login;
mod logout;

use login::{login, login_page, signup};
use logout::logout;

const MIN_PASSWORD_LEN: usize = 6;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/signup", post(signup))
        .route("/logout", get(logout))
}

/// Shown next to the user's messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProfile {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Who is signed in on one client, and the only place that may change it.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, profile: NewProfile) -> Result<Identity, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn sign_out(&self);
    fn current_identity(&self) -> Option<Identity>;
    /// A read-only view that follows every sign-in and sign-out.
    fn on_identity_change(&self) -> SessionContext;
}

/// Email/password accounts in the `users` table, plus the identity each
/// live http session is signed in as.
#[derive(Clone)]
pub struct Accounts {
    db_pool: SqlitePool,
    // one sender per http session, shared by all of its sockets
    live: Arc<Mutex<HashMap<Id, watch::Sender<Option<Identity>>>>>,
}

impl Accounts {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool, live: Arc::default() }
    }

    /// Provider for a socket of the http session `key`. Every socket of one
    /// session shares the same identity, so [`Accounts::end_session`] reaches
    /// all of them.
    pub fn restore_session(&self, key: Id, identity: Identity) -> PasswordAuth {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        // sessions whose sockets are all closed: only our own sender is left
        live.retain(|_, tx| tx.sender_count() > 1);

        let tx = live
            .entry(key)
            .or_insert_with(|| watch::channel(Some(identity)).0)
            .clone();
        PasswordAuth { accounts: self.clone(), tx }
    }

    /// Detaches the provider shared by the sockets of `key`, if any are open.
    /// Signing it out tells every one of them.
    pub fn end_session(&self, key: Id) -> Option<PasswordAuth> {
        let tx = self.live.lock().unwrap_or_else(PoisonError::into_inner).remove(&key)?;
        Some(PasswordAuth { accounts: self.clone(), tx })
    }

    pub async fn register(&self, email: &str, password: &str, profile: NewProfile) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let id = Uuid::now_v7();
        let name = match profile.name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_owned(),
            name => name.to_owned(),
        };
        let avatar_url = profile.avatar_url.map(|url| url.trim().to_owned()).filter(|url| !url.is_empty());
        if avatar_url.as_deref().is_some_and(|url| !url.starts_with("https://") && !url.starts_with("http://")) {
            return Err(AuthError::InvalidInput("Avatar URL should start with http:// or https://".to_owned()));
        }

        let mut tx = self.db_pool.begin().await?;
        let inserted = sqlx::query("INSERT INTO users (id,email,password_hash,created_at) VALUES (?,?,?,?)")
            .bind(id.to_string())
            .bind(&email)
            .bind(hash_password(password)?)
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&mut *tx)
            .await;
        match inserted {
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(AuthError::AlreadyRegistered);
            }
            other => other?,
        };

        sqlx::query("INSERT INTO profiles (user_id,name,avatar_url) VALUES (?,?,?)")
            .bind(id.to_string())
            .bind(&name)
            .bind(avatar_url)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id = %id, %email, "registered");
        Ok(Identity { id, email })
    }

    pub async fn verify(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        let row: Option<(String, String)> = sqlx::query_as("SELECT id,password_hash FROM users WHERE email=?")
            .bind(&email)
            .fetch_optional(&self.db_pool)
            .await?;

        let Some((id, password_hash)) = row else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&password_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }

        let id = Uuid::parse_str(&id).map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        Ok(Identity { id, email })
    }
}

/// [`AuthProvider`] for one client, backed by [`Accounts`].
pub struct PasswordAuth {
    accounts: Accounts,
    tx: watch::Sender<Option<Identity>>,
}

impl PasswordAuth {
    pub fn new(accounts: Accounts) -> Self {
        Self::restore(accounts, None)
    }

    /// Picks up an identity signed in earlier, e.g. kept in the http session.
    pub fn restore(accounts: Accounts, identity: Option<Identity>) -> Self {
        Self { accounts, tx: watch::channel(identity).0 }
    }
}

#[async_trait]
impl AuthProvider for PasswordAuth {
    async fn sign_up(&self, email: &str, password: &str, profile: NewProfile) -> Result<Identity, AuthError> {
        // registering does not sign in
        self.accounts.register(email, password, profile).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.accounts.verify(email, password).await?;
        info!(user_id = %identity.id, "signed in");
        self.tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        if let Some(identity) = self.tx.send_replace(None) {
            info!(user_id = %identity.id, "signed out");
        }
    }

    fn current_identity(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn on_identity_change(&self) -> SessionContext {
        SessionContext::new(self.tx.subscribe())
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidInput("Unable to validate email address: invalid format".to_owned())),
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password_hash: &str, password: &str) -> bool {
    let hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            error!(%err, "failed to parse password hash");
            return false;
        }
    };

    Argon2::default().verify_password(password.as_bytes(), &hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn accounts() -> (Accounts, SqlitePool) {
        let db_pool = db::memory().await.unwrap();
        (Accounts::new(db_pool.clone()), db_pool)
    }

    fn profile(name: &str) -> NewProfile {
        NewProfile { name: name.to_owned(), avatar_url: None }
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let (accounts, db_pool) = accounts().await;
        let auth = PasswordAuth::new(accounts);

        let registered = auth.sign_up("Haku@Example.com ", "kohaku-river", profile("Haku")).await.unwrap();
        assert_eq!(registered.email, "haku@example.com");
        assert_eq!(auth.current_identity(), None);

        let (name,): (String,) = sqlx::query_as("SELECT name FROM profiles WHERE user_id=?")
            .bind(registered.id.to_string())
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(name, "Haku");

        let signed_in = auth.sign_in("haku@example.com", "kohaku-river").await.unwrap();
        assert_eq!(signed_in, registered);
        assert_eq!(auth.current_identity(), Some(registered));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (accounts, _) = accounts().await;
        let auth = PasswordAuth::new(accounts);
        auth.sign_up("lin@example.com", "bathhouse", profile("Lin")).await.unwrap();

        let err = auth.sign_in("lin@example.com", "bath-house").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        let err = auth.sign_in("nobody@example.com", "bathhouse").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(auth.current_identity(), None);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (accounts, _) = accounts().await;
        accounts.register("kiki@example.com", "broomstick", profile("Kiki")).await.unwrap();
        let err = accounts.register("KIKI@example.com", "broomstick", profile("Kiki")).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let (accounts, _) = accounts().await;
        let err = accounts.register("not-an-email", "longenough", profile("x")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
        let err = accounts.register("a@b.co", "short", profile("x")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
        let avatar = NewProfile { name: "x".to_owned(), avatar_url: Some("javascript:alert(1)".to_owned()) };
        let err = accounts.register("a@b.co", "longenough", avatar).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn blank_name_falls_back_to_email() {
        let (accounts, db_pool) = accounts().await;
        let identity = accounts
            .register("totoro@example.com", "camphor-tree", NewProfile { name: " ".to_owned(), avatar_url: Some(String::new()) })
            .await
            .unwrap();

        let (name, avatar_url): (String, Option<String>) =
            sqlx::query_as("SELECT name,avatar_url FROM profiles WHERE user_id=?")
                .bind(identity.id.to_string())
                .fetch_one(&db_pool)
                .await
                .unwrap();
        assert_eq!(name, "totoro");
        assert_eq!(avatar_url, None);
    }

    #[tokio::test]
    async fn ending_a_session_signs_out_all_its_sockets() {
        let (accounts, _) = accounts().await;
        let identity = accounts.register("haku@example.com", "kohaku-river", profile("Haku")).await.unwrap();
        let key = Id::default();
        let other = Id::default();

        let first = accounts.restore_session(key, identity.clone());
        let second = accounts.restore_session(key, identity.clone());
        let elsewhere = accounts.restore_session(other, identity.clone());
        let mut first_view = first.on_identity_change();
        let mut second_view = second.on_identity_change();
        let elsewhere_view = elsewhere.on_identity_change();

        accounts.end_session(key).unwrap().sign_out().await;
        assert_eq!(first_view.changed().await, Some(None));
        assert_eq!(second_view.changed().await, Some(None));
        assert_eq!(first.current_identity(), None);
        assert_eq!(elsewhere_view.identity(), Some(identity));

        assert!(accounts.end_session(key).is_none());
    }

    #[tokio::test]
    async fn closed_sessions_are_forgotten() {
        let (accounts, _) = accounts().await;
        let identity = accounts.register("lin@example.com", "bathhouse", profile("Lin")).await.unwrap();
        let key = Id::default();

        let auth = accounts.restore_session(key, identity.clone());
        drop(auth);
        // a later socket of another session prunes the unwatched entry
        let _other = accounts.restore_session(Id::default(), identity);
        assert!(accounts.end_session(key).is_none());
    }

    #[tokio::test]
    async fn identity_changes_reach_the_session() {
        let (accounts, _) = accounts().await;
        let auth = PasswordAuth::new(accounts);
        let mut session = auth.on_identity_change();
        auth.sign_up("sophie@example.com", "moving-castle", profile("Sophie")).await.unwrap();

        let identity = auth.sign_in("sophie@example.com", "moving-castle").await.unwrap();
        assert_eq!(session.changed().await, Some(Some(identity)));

        auth.sign_out().await;
        assert_eq!(session.changed().await, Some(None));
        assert_eq!(session.identity(), None);
    }
}
