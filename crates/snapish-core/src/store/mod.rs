//! Process-wide application state.
//!
//! The [`Coordinator`] owns the session, the tide table, the catch log and
//! the community lists, and mirrors the durable parts into local storage.
//! State sits behind a lock that is never held across an await, so each
//! operation is atomic between suspension points.
//!
//! Tide fetches are coalesced per calendar day. Other fetchers are not: two
//! overlapping refreshes of the same list commit in the order their responses
//! arrive, and the last one wins.

mod coordinator;
pub mod single_flight;
pub mod state;

use thiserror::Error;

use crate::models::ValidationError;

pub use coordinator::{Clock, Coordinator};
pub use single_flight::{FlightError, SingleFlight};
pub use state::{StoreState, TideStatus};

/// Failures raised by the coordinator itself, before any request is made
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
