//! Route table and the sign-in check run before every navigation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::store::Coordinator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Community,
    CommunityPost(String),
    NewPost,
    EditPost(String),
    MapLocationService,
    Profile,
    EditProfile,
    Catches,
    FishResultNormal,
    FishResultWarning,
    FishResultError,
    Login,
    Signup,
}

impl Route {
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Route::Community
                | Route::CommunityPost(_)
                | Route::NewPost
                | Route::EditPost(_)
                | Route::Profile
                | Route::EditProfile
                | Route::Catches
        )
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Community => "/community".to_string(),
            Route::CommunityPost(id) => format!("/community/{}", id),
            Route::NewPost => "/community/new".to_string(),
            Route::EditPost(id) => format!("/community/edit/{}", id),
            Route::MapLocationService => "/map-location-service".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::EditProfile => "/edit-profile".to_string(),
            Route::Catches => "/catches".to_string(),
            Route::FishResultNormal => "/fish-result-normal".to_string(),
            Route::FishResultWarning => "/fish-result-warning".to_string(),
            Route::FishResultError => "/fish-result-error".to_string(),
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No route matches '{0}'")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let route = match segments.as_slice() {
            [] => Route::Home,
            ["community"] => Route::Community,
            ["community", "new"] => Route::NewPost,
            ["community", "edit", id] => Route::EditPost(id.to_string()),
            ["community", id] => Route::CommunityPost(id.to_string()),
            ["map-location-service"] => Route::MapLocationService,
            ["profile"] => Route::Profile,
            ["edit-profile"] => Route::EditProfile,
            ["catches"] => Route::Catches,
            ["fish-result-normal"] => Route::FishResultNormal,
            ["fish-result-warning"] => Route::FishResultWarning,
            ["fish-result-error"] => Route::FishResultError,
            ["login"] => Route::Login,
            ["signup"] => Route::Signup,
            _ => return Err(UnknownRoute(path.to_string())),
        };
        Ok(route)
    }
}

/// Outcome of a navigation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allow(Route),
    Redirect(Route),
}

pub struct NavigationGuard {
    coordinator: Coordinator,
}

impl NavigationGuard {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// Decide whether `to` may be entered.
    ///
    /// A protected route with a stored but unconfirmed token waits for the
    /// session to be restored; without a token it redirects straight to the
    /// login page.
    pub async fn before_each(&self, to: Route) -> Navigation {
        if !to.requires_auth() || self.coordinator.is_authenticated() {
            return Navigation::Allow(to);
        }

        if !self.coordinator.has_stored_token() {
            debug!(route = %to, "Not signed in, redirecting to login");
            return Navigation::Redirect(Route::Login);
        }

        match self.coordinator.hydrate_session().await {
            Ok(true) => Navigation::Allow(to),
            Ok(false) => Navigation::Redirect(Route::Login),
            Err(e) => {
                warn!(route = %to, error = %e, "Session could not be restored");
                Navigation::Redirect(Route::Login)
            }
        }
    }
}
