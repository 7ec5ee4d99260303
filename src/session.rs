use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// tower-sessions key holding the signed-in [`Identity`].
pub const IDENTITY: &str = "identity";
pub const RETURN_URL: &str = "return_url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Read side of the current identity.
///
/// Only the auth provider holds the sending half, so components that take a
/// `&SessionContext` can observe sign-in and sign-out but never change them.
#[derive(Debug, Clone)]
pub struct SessionContext {
    rx: watch::Receiver<Option<Identity>>,
}

impl SessionContext {
    pub fn new(rx: watch::Receiver<Option<Identity>>) -> Self {
        Self { rx }
    }

    /// A context pinned to one identity (or none) that never changes.
    pub fn fixed(identity: Option<Identity>) -> Self {
        let (_tx, rx) = watch::channel(identity);
        Self { rx }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.rx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.rx.borrow().as_ref().map(|identity| identity.id)
    }

    /// Waits for the auth provider to publish a new identity.
    ///
    /// Returns `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
