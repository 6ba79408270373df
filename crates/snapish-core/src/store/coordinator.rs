use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::single_flight::{FlightError, SingleFlight};
use super::state::{StoreState, TideStatus};
use super::StoreError;
use crate::api::{ApiError, Backend, Fetched, ImageUpload};
use crate::auth::Session;
use crate::cache::{keys, CacheManager};
use crate::location::LocationProvider;
use crate::models::{
    date_key, CatchRecord, CatchUpdate, ConsentRecord, Coordinates, HotIssue, NewCatch, Post,
    ProfileUpdate, ServiceEntry, SignupRequest, TideSnapshot, UserProfile,
};

/// In-flight registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Resource {
    Tide { date: String },
}

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

struct Inner {
    backend: Arc<dyn Backend>,
    cache: CacheManager,
    location: Arc<dyn LocationProvider>,
    state: RwLock<StoreState>,
    flights: SingleFlight<Resource, Value>,
    clock: Clock,
}

/// Keeps the loading indicator up until dropped
struct Loading<'a>(&'a Coordinator);

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.update(|s| s.in_flight = s.in_flight.saturating_sub(1));
    }
}

/// Shared handle to application state. Clones refer to the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Build the coordinator and hydrate it from the persistent mirror.
    ///
    /// A stored token is not trusted here: the session stays signed out until
    /// [`Coordinator::hydrate_session`] confirms it with the backend.
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: CacheManager,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self::with_clock(backend, cache, location, Arc::new(Local::now))
    }

    /// Like [`Coordinator::new`], reading the time from `clock`
    pub fn with_clock(
        backend: Arc<dyn Backend>,
        cache: CacheManager,
        location: Arc<dyn LocationProvider>,
        clock: Clock,
    ) -> Self {
        let mut state = StoreState::default();
        let now = clock();
        let today = date_key(now.date_naive());

        match CacheManager::advisory(keys::TIDE, || cache.load_tide()) {
            Some(snapshot) if snapshot.is_fresh_at(&today, now.timestamp_millis()) => {
                debug!(date = %snapshot.date_key, "Hydrated tide table from storage");
                state.tide = Some(snapshot);
            }
            Some(snapshot) => {
                debug!(date = %snapshot.date_key, "Dropping stale stored tide table");
                if let Err(e) = cache.clear_tide() {
                    warn!(error = %e, "Failed to remove stale tide table");
                }
            }
            None => {}
        }

        state.catches = CacheManager::advisory(keys::CATCHES, || cache.load_catches())
            .unwrap_or_default();
        state.hot_issues = CacheManager::advisory(keys::HOT_ISSUES, || cache.load_hot_issues())
            .unwrap_or_default();
        state.session.user =
            CacheManager::advisory(keys::USER, || cache.load_user()).unwrap_or_default();

        Self {
            inner: Arc::new(Inner {
                backend,
                cache,
                location,
                state: RwLock::new(state),
                flights: SingleFlight::new(),
                clock,
            }),
        }
    }

    // ========================================================================
    // State access
    // ========================================================================

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn snapshot(&self) -> StoreState {
        self.read(StoreState::clone)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|s| s.session.is_valid())
    }

    pub fn session(&self) -> Session {
        self.read(|s| s.session.clone())
    }

    pub fn user(&self) -> UserProfile {
        self.read(|s| s.session.user.clone())
    }

    pub fn has_stored_token(&self) -> bool {
        self.inner.cache.has_token()
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    /// True while any operation is waiting on the backend or location source
    pub fn is_loading(&self) -> bool {
        self.read(|s| s.in_flight > 0)
    }

    pub fn is_global_loading(&self) -> bool {
        self.read(|s| s.global_loading)
    }

    pub fn current_location(&self) -> Option<Coordinates> {
        self.read(|s| s.current_location)
    }

    pub fn tide(&self) -> Option<TideSnapshot> {
        self.read(|s| s.tide.clone())
    }

    pub fn catches(&self) -> Vec<CatchRecord> {
        self.read(|s| s.catches.clone())
    }

    pub fn hot_issues(&self) -> Vec<HotIssue> {
        self.read(|s| s.hot_issues.clone())
    }

    pub fn consent(&self) -> ConsentRecord {
        self.read(|s| s.consent.clone())
    }

    pub fn services(&self) -> Vec<ServiceEntry> {
        self.read(|s| s.services.clone())
    }

    pub fn posts(&self) -> Vec<Post> {
        self.read(|s| s.posts.clone())
    }

    pub fn set_global_loading(&self, loading: bool) {
        self.update(|s| s.global_loading = loading);
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    fn record_error(&self, context: &str, err: impl std::fmt::Display) {
        let message = format!("{:#}", err);
        error!(context, error = %message, "Operation failed");
        self.update(|s| s.error = Some(message));
    }

    /// Storage is a mirror: a failed write is logged, never fatal
    fn mirror(&self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!(what, error = %e, "Failed to persist state");
        }
    }

    fn start_loading(&self) -> Loading<'_> {
        self.update(|s| s.in_flight += 1);
        Loading(self)
    }

    fn now(&self) -> DateTime<Local> {
        (self.inner.clock)()
    }

    /// Forget a token the backend no longer accepts
    fn drop_session(&self) {
        self.inner.backend.set_token(None);
        if let Err(e) = self.inner.cache.clear_session() {
            error!(error = %e, "Failed to remove stored token");
        }
        self.update(|s| s.session.clear());
    }

    /// Record a failed protected read, ending the session if the token was refused
    fn protected_read_failed(&self, context: &str, err: &anyhow::Error) {
        self.record_error(context, err);
        if ApiError::is_auth_error(err) {
            warn!(context, "Token refused, signing out");
            self.drop_session();
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let result = {
            let _loading = self.start_loading();
            self.inner.backend.login(username, password).await
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.record_error("login", &e);
                return Err(e);
            }
        };

        self.mirror("token", self.inner.cache.save_token(&response.token));
        self.mirror("user", self.inner.cache.save_user(&response.user));
        self.inner.backend.set_token(Some(response.token.clone()));

        info!(user = response.user.display_name(), "Signed in");
        self.update(|s| {
            s.session = Session::authenticated(response.token, response.user);
            s.error = None;
        });
        Ok(())
    }

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let request = SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let result = {
            let _loading = self.start_loading();
            self.inner.backend.signup(&request).await
        };

        match result {
            Ok(()) => {
                info!(username, "Account created");
                Ok(())
            }
            Err(e) => {
                self.record_error("signup", &e);
                Err(e)
            }
        }
    }

    /// Forget the session and everything cached on behalf of the user
    pub fn logout(&self) {
        self.mirror("logout", self.inner.cache.clear_all());
        self.inner.backend.set_token(None);
        self.update(StoreState::sign_out);
        info!("Signed out");
    }

    /// Confirm a stored token with the backend.
    ///
    /// Returns `Ok(false)` when there is no token to confirm. A rejected or
    /// unreachable profile fetch removes the stored token and fails.
    pub async fn hydrate_session(&self) -> Result<bool> {
        if self.is_authenticated() {
            return Ok(true);
        }

        let Some(token) = CacheManager::advisory(keys::TOKEN, || self.inner.cache.load_token())
        else {
            debug!("No stored token to hydrate");
            return Ok(false);
        };

        self.inner.backend.set_token(Some(token.clone()));

        match self.inner.backend.profile().await {
            Ok(user) => {
                self.mirror("user", self.inner.cache.save_user(&user));
                info!(user = user.display_name(), "Session restored");
                self.update(|s| s.session = Session::authenticated(token, user));
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Stored token rejected, clearing session");
                self.drop_session();
                self.record_error("hydrate_session", &e);
                Err(e.context("Failed to restore session"))
            }
        }
    }

    pub async fn fetch_user_profile(&self) -> Result<UserProfile> {
        if !self.is_authenticated() {
            return Err(StoreError::NotAuthenticated.into());
        }

        match self.inner.backend.profile().await {
            Ok(user) => {
                self.mirror("user", self.inner.cache.save_user(&user));
                self.update(|s| s.session.user = user.clone());
                Ok(user)
            }
            Err(e) => {
                self.record_error("fetch_user_profile", &e);
                Err(e)
            }
        }
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        let result = {
            let _loading = self.start_loading();
            self.inner.backend.update_profile(update).await
        };

        match result {
            Ok(user) => {
                self.update_user(user.clone());
                Ok(user)
            }
            Err(e) => {
                self.record_error("update_profile", &e);
                Err(e)
            }
        }
    }

    pub fn update_avatar(&self, url: &str) {
        let mut user = self.user();
        user.avatar = Some(url.to_string());
        self.update_user(user);
    }

    pub fn update_user(&self, user: UserProfile) {
        self.mirror("user", self.inner.cache.save_user(&user));
        self.update(|s| s.session.user = user);
    }

    // ========================================================================
    // Tide
    // ========================================================================

    pub fn tide_status(&self) -> TideStatus {
        let now = self.now();
        let today = date_key(now.date_naive());

        if self.inner.flights.is_in_flight(&Resource::Tide { date: today.clone() }) {
            return TideStatus::Fetching;
        }

        self.read(|s| match &s.tide {
            None => TideStatus::Empty,
            Some(t) if t.is_fresh_at(&today, now.timestamp_millis()) => TideStatus::Fresh,
            Some(_) => TideStatus::Stale,
        })
    }

    /// Today's tide table, from memory, storage or the network in that order.
    ///
    /// Concurrent callers share a single request.
    pub async fn fetch_tide(&self) -> Result<Value> {
        let now = self.now();
        let today = date_key(now.date_naive());
        let now_ms = now.timestamp_millis();

        let cached = self.read(|s| {
            s.tide
                .as_ref()
                .filter(|t| t.is_fresh_at(&today, now_ms))
                .map(|t| t.payload.clone())
        });
        if let Some(payload) = cached {
            debug!(date = %today, "Tide table served from memory");
            return Ok(payload);
        }

        // Another process may have refreshed storage since we last looked
        let stored = CacheManager::advisory(keys::TIDE, || self.inner.cache.load_tide())
            .filter(|t| t.is_fresh_at(&today, now_ms));
        if let Some(snapshot) = stored {
            debug!(date = %today, "Tide table served from storage");
            let payload = snapshot.payload.clone();
            self.update(|s| s.tide = Some(snapshot));
            return Ok(payload);
        }

        let this = self.clone();
        let date = today.clone();
        self.inner
            .flights
            .run(Resource::Tide { date: today }, move || this.fetch_tide_now(date))
            .await
            .context("Failed to fetch tide table")
    }

    async fn fetch_tide_now(self, date: String) -> Result<Value, FlightError> {
        let result = {
            let _loading = self.start_loading();
            self.inner.backend.tide(&date).await
        };

        match result {
            Ok(payload) => {
                let snapshot = TideSnapshot {
                    payload: payload.clone(),
                    date_key: date,
                    fetched_at_ms: self.now().timestamp_millis(),
                };
                self.mirror("tide", self.inner.cache.save_tide(&snapshot));
                info!(date = %snapshot.date_key, "Tide table refreshed");
                self.update(|s| s.tide = Some(snapshot));
                Ok(payload)
            }
            Err(failure) => {
                // A failed refresh leaves no table behind, stale or not
                self.update(|s| s.tide = None);
                self.mirror("tide", self.inner.cache.clear_tide());
                self.record_error("fetch_tide", &failure);
                Err(FlightError::Failed(failure.error))
            }
        }
    }

    // ========================================================================
    // Location & weather
    // ========================================================================

    pub async fn fetch_location(&self) -> Result<Coordinates> {
        self.clear_error();
        let result = {
            let _loading = self.start_loading();
            self.inner.location.current_position().await
        };

        match result {
            Ok(position) => {
                debug!(%position, "Location updated");
                self.update(|s| s.current_location = Some(position));
                Ok(position)
            }
            Err(e) => {
                self.record_error("fetch_location", e);
                Err(e.into())
            }
        }
    }

    pub async fn fetch_weather(&self, at: Coordinates) -> Fetched<Value> {
        let result = self.inner.backend.weather(at).await;
        if let Err(failure) = &result {
            self.record_error("fetch_weather", failure);
        }
        result
    }

    pub async fn fetch_closest_location(&self, at: Coordinates) -> Fetched<Value> {
        let result = self.inner.backend.closest_location(at).await;
        if let Err(failure) = &result {
            self.record_error("fetch_closest_location", failure);
        }
        result
    }

    // ========================================================================
    // Catch log
    // ========================================================================

    fn set_catches(&self, catches: Vec<CatchRecord>) {
        self.mirror("catches", self.inner.cache.save_catches(&catches));
        self.update(|s| s.catches = catches);
    }

    fn mirror_catches(&self) {
        let catches = self.catches();
        self.mirror("catches", self.inner.cache.save_catches(&catches));
    }

    /// Refresh the catch log. Signed out means an empty log.
    ///
    /// A failed fetch keeps the previous list and is returned; when the
    /// backend refused the token the session is dropped as well.
    pub async fn fetch_catches(&self) -> Result<()> {
        if !self.is_authenticated() {
            self.set_catches(Vec::new());
            return Ok(());
        }

        let result = {
            let _loading = self.start_loading();
            self.inner.backend.catches().await
        };

        match result {
            Ok(catches) => {
                let today = date_key(self.now().date_naive());
                let catches: Vec<CatchRecord> =
                    catches.into_iter().map(|c| c.normalized(&today)).collect();
                debug!(count = catches.len(), "Catch log refreshed");
                self.set_catches(catches);
                Ok(())
            }
            Err(e) => {
                self.protected_read_failed("fetch_catches", &e);
                Err(e.context("Failed to fetch catch log"))
            }
        }
    }

    pub async fn create_catch(&self, new_catch: &NewCatch) -> Result<CatchRecord> {
        match self.inner.backend.create_catch(new_catch).await {
            Ok(record) => {
                self.update(|s| s.upsert_catch(record.clone()));
                self.mirror_catches();
                Ok(record)
            }
            Err(e) => {
                self.record_error("create_catch", &e);
                Err(e)
            }
        }
    }

    /// Validated locally first; an invalid edit never reaches the backend.
    pub async fn update_catch(&self, update: &CatchUpdate) -> Result<CatchRecord> {
        let id = match update.validate() {
            Ok(id) => id,
            Err(e) => {
                self.record_error("update_catch", &e);
                return Err(StoreError::from(e).into());
            }
        };

        match self.inner.backend.update_catch(id, update).await {
            Ok(record) => {
                if !self.update(|s| s.replace_catch(record.clone())) {
                    debug!(id, "Updated catch is not in the local log");
                }
                self.mirror_catches();
                Ok(record)
            }
            Err(e) => {
                self.record_error("update_catch", &e);
                Err(e)
            }
        }
    }

    pub async fn delete_catch(&self, id: &str) -> Result<()> {
        match self.inner.backend.delete_catch(id).await {
            Ok(()) => {
                self.update(|s| s.remove_catch(id));
                self.mirror_catches();
                Ok(())
            }
            Err(e) => {
                self.record_error("delete_catch", &e);
                Err(e)
            }
        }
    }

    /// Send a photo for species recognition
    pub async fn predict_catch(&self, photo: ImageUpload) -> Result<Value> {
        let _loading = self.start_loading();
        let result = self.inner.backend.predict_catch(photo).await;

        result.inspect_err(|e| self.record_error("predict_catch", e))
    }

    // ========================================================================
    // Consent
    // ========================================================================

    pub async fn check_consent(&self) -> Result<ConsentRecord> {
        match self.inner.backend.check_consent().await {
            Ok(record) => {
                self.update(|s| s.consent = record.clone());
                Ok(record)
            }
            Err(e) => {
                self.record_error("check_consent", &e);
                Err(e)
            }
        }
    }

    pub async fn update_consent(&self, consent: bool) -> Result<Value> {
        match self.inner.backend.update_consent(consent).await {
            Ok(response) => {
                self.update(|s| {
                    s.consent = ConsentRecord {
                        has_consent: consent,
                        last_consent_date: Some(self.now().with_timezone(&Utc)),
                    }
                });
                Ok(response)
            }
            Err(e) => {
                self.record_error("update_consent", &e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Community
    // ========================================================================

    /// The service directory, falling back to the built-in one
    pub async fn fetch_services(&self) -> Vec<ServiceEntry> {
        let services = match self.inner.backend.services().await {
            Ok(services) => services,
            Err(failure) => {
                warn!(error = %failure, "Using default service directory");
                ServiceEntry::default_directory()
            }
        };
        self.update(|s| s.services = services.clone());
        services
    }

    /// Refresh the community board. Failures are returned like
    /// [`Coordinator::fetch_catches`] does.
    pub async fn fetch_posts(&self) -> Result<()> {
        match self.inner.backend.posts().await {
            Ok(posts) => {
                self.update(|s| s.posts = posts);
                Ok(())
            }
            Err(e) => {
                self.protected_read_failed("fetch_posts", &e);
                Err(e.context("Failed to fetch posts"))
            }
        }
    }

    pub fn update_post(&self, post: Post) {
        if !self.update(|s| s.replace_post(post)) {
            debug!("Edited post is not in the local list");
        }
    }

    pub fn add_post(&self, post: Post) {
        self.update(|s| s.posts.insert(0, post));
    }

    /// Home-screen headlines, falling back to the built-in list
    pub async fn fetch_hot_issues(&self) -> Vec<HotIssue> {
        let issues = match self.inner.backend.hot_issues().await {
            Ok(issues) => issues,
            Err(failure) => {
                warn!(error = %failure, "Using default hot issues");
                HotIssue::default_list(self.now().with_timezone(&Utc))
            }
        };
        self.mirror("hot issues", self.inner.cache.save_hot_issues(&issues));
        self.update(|s| s.hot_issues = issues.clone());
        issues
    }

    /// Warm the home screen: tide, catch log and hot issues side by side
    pub async fn fetch_initial_data(&self) {
        let (tide, catches, _) = tokio::join!(
            self.fetch_tide(),
            self.fetch_catches(),
            self.fetch_hot_issues()
        );

        if let Err(e) = tide {
            warn!(error = %e, "Initial tide fetch failed");
        }
        if let Err(e) = catches {
            warn!(error = %format!("{:#}", e), "Initial catch log fetch failed");
        }
    }
}
