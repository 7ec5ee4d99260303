use thiserror::Error;

/// Failures surfaced to the user by the composer and the sync engine.
///
/// An empty text send is not one of these, see [`crate::compose::SendOutcome::Nothing`].
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("you need to sign in first")]
    Unauthenticated,

    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("capture a location before sending it")]
    NoDraft,

    #[error("photo capture cancelled")]
    CaptureCancelled,

    #[error("photo upload failed: {0}")]
    MediaUploadFailed(String),

    #[error("content source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("message could not be saved: {0}")]
    StoreWriteFailed(String),

    #[error("could not load messages: {0}")]
    SyncStalled(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("message content must not be empty")]
    EmptyContent,
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("no blob stored at {0}")]
    Missing(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("capability not supported")]
    Unsupported,

    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Failed(String),
}

/// Credential failures. The display text is shown to the user as-is.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        ChatError::StoreWriteFailed(err.to_string())
    }
}

impl From<BlobError> for ChatError {
    fn from(err: BlobError) -> Self {
        ChatError::MediaUploadFailed(err.to_string())
    }
}

impl From<SourceError> for ChatError {
    fn from(err: SourceError) -> Self {
        ChatError::SourceUnavailable(err.to_string())
    }
}

impl From<DeviceError> for ChatError {
    fn from(err: DeviceError) -> Self {
        ChatError::LocationUnavailable(err.to_string())
    }
}
