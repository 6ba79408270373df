//! Device position lookup.
//!
//! The error taxonomy follows the platform geolocation API (permission
//! denied, position unavailable, timeout), and every variant carries a
//! message fit to show the user as is.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Coordinates;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Permission to read your location was not granted.")]
    PermissionDenied,

    #[error("Your location could not be determined.")]
    PositionUnavailable,

    #[error("The location request timed out.")]
    Timeout,

    #[error("Location is not available on this device.")]
    Unsupported,

    #[error("Something went wrong while reading your location.")]
    Other,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// A position fixed by configuration. Without one, location is unsupported.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    position: Option<Coordinates>,
}

impl FixedLocation {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.position.ok_or(GeolocationError::Unsupported)
    }
}
