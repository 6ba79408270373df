use serde::Serialize;

use crate::models::UserProfile;

/// In-memory session.
///
/// A token read back from storage does not make a session authenticated on
/// its own; only a successful login or profile fetch does.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub is_authenticated: bool,
    pub token: Option<String>,
    pub user: UserProfile,
}

impl Session {
    pub fn authenticated(token: String, user: UserProfile) -> Self {
        Self {
            is_authenticated: true,
            token: Some(token),
            user,
        }
    }

    /// Get the bearer token if one is held
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Authenticated and holding a token
    pub fn is_valid(&self) -> bool {
        self.is_authenticated && self.token.is_some()
    }

    /// Back to the signed-out state with an empty profile
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
