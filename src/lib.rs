pub mod auth;
pub mod bus;
pub mod chat;
pub mod compose;
pub mod config;
pub mod controller;
pub mod db;
pub mod device;
pub mod enrich;
pub mod error;
pub mod format;
pub mod index;
pub mod res;
pub mod session;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};

use crate::{auth::Accounts, bus::BroadcastBus, compose::Outlets};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub accounts: Accounts,
    pub outlets: Outlets,
    pub bus: BroadcastBus,
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(err = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(error::AuthError);
apperr_impl!(error::StoreError);
