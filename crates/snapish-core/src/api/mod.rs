//! REST API client module for the snapish backend.
//!
//! This module provides the `ApiClient` for tide, weather, sea-location,
//! catch-log, consent and community endpoints, and the `Backend` trait the
//! coordinator talks to.
//!
//! Protected endpoints use bearer token authentication; the token comes from
//! `/login` and is installed on the client by the coordinator.

pub mod backend;
pub mod client;
pub mod error;
pub mod upload;

pub use backend::{Backend, FetchFailure, Fetched};
pub use client::ApiClient;
pub use error::ApiError;
pub use upload::{shrink_for_upload, ImageUpload, MAX_UPLOAD_WIDTH};
