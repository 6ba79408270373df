//! Local persistence for offline data access.
//!
//! `LocalStorage` is a plain durable key/value store. `CacheManager` mirrors
//! coordinator state into it under fixed keys:
//!
//! - `token`, `user`: the last session
//! - `mulddae`, `mulddaeDate`, `mulddaeTimestamp`: today's tide table
//! - `catches`: the catch log
//! - `hotIssues`: home-screen headlines
//!
//! Expiry is decided by the caller, never by the storage layer.

pub mod manager;
pub mod storage;

pub use manager::{keys, CacheManager};
pub use storage::LocalStorage;
