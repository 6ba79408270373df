//! Authentication state.
//!
//! `Session` holds the bearer token and profile of the signed-in user. The
//! coordinator owns the only live instance and mirrors it to local storage.

pub mod session;

pub use session::Session;
