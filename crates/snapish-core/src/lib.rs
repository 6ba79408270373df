//! Snapish core - the client side of a fishing companion service.
//!
//! This crate holds everything below the user interface: the backend API
//! client, the data models, the local storage mirror, and the coordinator
//! that owns session and cached state.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod guard;
pub mod location;
pub mod models;
pub mod socket;
pub mod store;
pub mod utils;

pub use api::{ApiClient, ApiError, Backend, FetchFailure, Fetched};
pub use cache::{CacheManager, LocalStorage};
pub use config::Config;
pub use guard::{Navigation, NavigationGuard, Route};
pub use location::{FixedLocation, GeolocationError, LocationProvider};
pub use socket::SocketLogger;
pub use store::{Clock, Coordinator, StoreError, TideStatus};
