//! Data models for snapish entities.
//!
//! This module contains the data structures exchanged with the backend and
//! mirrored into local storage:
//!
//! - `UserProfile`, `LoginResponse`, `ProfileUpdate`: account data
//! - `TideSnapshot`: the daily tide table with its freshness rule
//! - `CatchRecord`, `NewCatch`, `CatchUpdate`: the personal catch log
//! - `Post`, `HotIssue`, `ServiceEntry`: community and home-screen content
//! - `ConsentRecord`: AI-analysis consent state
//! - `Coordinates`: a latitude/longitude pair

pub mod catches;
pub mod community;
pub mod consent;
pub mod location;
pub mod tide;
pub mod user;

pub use catches::{CatchRecord, CatchUpdate, NewCatch, ValidationError};
pub use community::{HotIssue, Post, PostsResponse, ServiceEntry};
pub use consent::{ConsentRecord, ConsentUpdate};
pub use location::Coordinates;
pub use tide::{date_key, TideSnapshot, TIDE_MAX_AGE_MS};
pub use user::{LoginRequest, LoginResponse, ProfileUpdate, SignupRequest, UserProfile};

use serde::{Deserialize, Deserializer};

/// The backend emits integer primary keys; the client keys records by string.
pub(crate) fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Int(i64),
        Str(String),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(n) => n.to_string(),
        IdRepr::Str(s) => s,
    })
}
