//! Device capabilities the composer asks for readings.
//!
//! In the web build the browser takes the reading itself and ships it with the
//! action, so the implementations here just hand that reading back.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix accepted; zero forces a fresh reading.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_millis(5000),
            maximum_age: Duration::ZERO,
        }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinates, DeviceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// `Ok(None)` when the user backed out or no image came back.
    async fn capture(&self) -> Result<Option<CapturedPhoto>, DeviceError>;
}

/// A fix already taken by the client.
pub struct ReportedPosition(pub Option<Coordinates>);

#[async_trait]
impl Geolocator for ReportedPosition {
    async fn current_position(&self, _options: PositionOptions) -> Result<Coordinates, DeviceError> {
        self.0
            .ok_or_else(|| DeviceError::Failed("the browser did not report a position".to_owned()))
    }
}

/// A photo already taken by the client.
pub struct ReportedPhoto(pub Option<Vec<u8>>);

#[async_trait]
impl Camera for ReportedPhoto {
    async fn capture(&self) -> Result<Option<CapturedPhoto>, DeviceError> {
        Ok(self
            .0
            .as_ref()
            .filter(|data| !data.is_empty())
            .map(|data| CapturedPhoto {
                data: data.clone(),
                content_type: "image/jpeg".to_owned(),
            }))
    }
}
