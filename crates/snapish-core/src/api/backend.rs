//! The backend as seen by the coordinator.
//!
//! Read-style calls (tide, weather, location, lists) never fail loudly: they
//! resolve to a [`FetchFailure`] carrying a message, so callers handle every
//! outcome the same way. Mutation-style calls return the error so the caller
//! can stop what it was doing.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::upload::ImageUpload;
use crate::models::{
    CatchRecord, CatchUpdate, ConsentRecord, Coordinates, HotIssue, LoginResponse, NewCatch, Post,
    ProfileUpdate, ServiceEntry, SignupRequest, UserProfile,
};

/// Failure of a read-style fetch. Serializes as `{"error": "..."}`.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{error}")]
pub struct FetchFailure {
    pub error: String,
}

impl FetchFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl From<anyhow::Error> for FetchFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

pub type Fetched<T> = std::result::Result<T, FetchFailure>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Install or drop the bearer token attached to every request
    fn set_token(&self, token: Option<String>);

    // ===== Read-style =====

    /// Nearest sea observation point for a position
    async fn closest_location(&self, at: Coordinates) -> Fetched<Value>;

    /// Tide table for a `YYYY-MM-DD` date
    async fn tide(&self, date_key: &str) -> Fetched<Value>;

    async fn weather(&self, at: Coordinates) -> Fetched<Value>;

    async fn hot_issues(&self) -> Fetched<Vec<HotIssue>>;

    async fn services(&self) -> Fetched<Vec<ServiceEntry>>;

    // ===== Mutation-style =====

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;

    async fn signup(&self, request: &SignupRequest) -> Result<()>;

    async fn profile(&self) -> Result<UserProfile>;

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile>;

    async fn catches(&self) -> Result<Vec<CatchRecord>>;

    /// Community board; needs a signed-in user like the catch log
    async fn posts(&self) -> Result<Vec<Post>>;

    async fn create_catch(&self, new_catch: &NewCatch) -> Result<CatchRecord>;

    async fn update_catch(&self, id: &str, update: &CatchUpdate) -> Result<CatchRecord>;

    async fn delete_catch(&self, id: &str) -> Result<()>;

    async fn check_consent(&self) -> Result<ConsentRecord>;

    async fn update_consent(&self, consent: bool) -> Result<Value>;

    /// Upload a catch photo for species recognition
    async fn predict_catch(&self, photo: ImageUpload) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_serializes_as_error_object() {
        let failure = FetchFailure::new("connection refused");
        assert_eq!(
            serde_json::to_value(&failure).expect("serialize"),
            serde_json::json!({"error": "connection refused"})
        );
        assert_eq!(failure.to_string(), "connection refused");
    }

    #[test]
    fn test_fetch_failure_keeps_context_chain() {
        let err = anyhow::anyhow!("timed out").context("Failed to fetch tide table");
        let failure = FetchFailure::from(err);
        assert_eq!(failure.error, "Failed to fetch tide table: timed out");
    }
}
