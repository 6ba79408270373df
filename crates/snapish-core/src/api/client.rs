//! API client for communicating with the snapish backend.
//!
//! This module provides the `ApiClient` struct, which builds requests against
//! the configured base URL, attaches the bearer token, encodes bodies the way
//! each endpoint expects and maps failures to [`ApiError`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::backend::{Backend, FetchFailure, Fetched};
use super::upload::{shrink_for_upload, ImageUpload};
use super::ApiError;
use crate::models::{
    CatchRecord, CatchUpdate, ConsentRecord, ConsentUpdate, Coordinates, HotIssue, LoginRequest,
    LoginResponse, NewCatch, Post, PostsResponse, ProfileUpdate, ServiceEntry, SignupRequest,
    UserProfile,
};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const CLOSEST_LOCATION_PATH: &str = "/backend/closest-sealoc";
const TIDE_PATH: &str = "/backend/mulddae";
const WEATHER_PATH: &str = "/backend/get-weather";
const HOT_ISSUES_PATH: &str = "/backend/hot-issues";
const PREDICT_PATH: &str = "/backend/predict";
const LOGIN_PATH: &str = "/login";
const SIGNUP_PATH: &str = "/signup";
const PROFILE_PATH: &str = "/profile";
const CATCHES_PATH: &str = "/catches";
const SERVICES_PATH: &str = "/api/services";
const CONSENT_PATH: &str = "/api/consent";
const CONSENT_CHECK_PATH: &str = "/api/consent/check";
const POSTS_PATH: &str = "/api/posts";

/// API client for the snapish backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the same token slot.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request to `path`, with the bearer token attached when one is held
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// `application/x-www-form-urlencoded` POST, used by the `/backend/*` lookups
    pub fn form_request(&self, path: &str, fields: &[(&str, String)]) -> RequestBuilder {
        self.request(Method::POST, path).form(fields)
    }

    /// Build a multipart body. An image part is shrunk before it is attached.
    pub fn multipart_form(fields: &[(&str, &str)], image: Option<ImageUpload>) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.to_string(), value.to_string());
        }

        if let Some(image) = image {
            let image = if image.is_image() {
                shrink_for_upload(image)?
            } else {
                image
            };
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.content_type)
                .context("Invalid image content type")?;
            form = form.part("image", part);
        }

        Ok(form)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(ApiError::Network)
            .with_context(|| format!("Failed to send {} request", what))?;

        let response = Self::check_response(response).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path), path).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body), path)
            .await
    }

    async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.request(Method::PUT, path).json(body), path)
            .await
    }

    async fn post_form(&self, path: &str, fields: &[(&str, String)]) -> Result<Value> {
        self.send(self.form_request(path, fields), path).await
    }

    /// Log a read-style failure and turn it into the uniform sentinel
    fn read<T>(resource: &str, result: Result<T>) -> Fetched<T> {
        result.map_err(|e| {
            warn!(resource, error = %e, "Fetch failed");
            FetchFailure::from(e)
        })
    }

    fn coordinate_fields(at: Coordinates) -> [(&'static str, String); 2] {
        [
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
        ]
    }
}

#[async_trait]
impl Backend for ApiClient {
    fn set_token(&self, token: Option<String>) {
        debug!(present = token.is_some(), "Bearer token updated");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn closest_location(&self, at: Coordinates) -> Fetched<Value> {
        let result = self
            .post_form(CLOSEST_LOCATION_PATH, &Self::coordinate_fields(at))
            .await;
        Self::read("closest_location", result)
    }

    async fn tide(&self, date_key: &str) -> Fetched<Value> {
        debug!(date = date_key, "Fetching tide table");
        let result = self
            .post_form(TIDE_PATH, &[("nowdate", date_key.to_string())])
            .await;
        Self::read("tide", result)
    }

    async fn weather(&self, at: Coordinates) -> Fetched<Value> {
        let result = self
            .post_form(WEATHER_PATH, &Self::coordinate_fields(at))
            .await;
        Self::read("weather", result)
    }

    async fn hot_issues(&self) -> Fetched<Vec<HotIssue>> {
        Self::read("hot_issues", self.get(HOT_ISSUES_PATH).await)
    }

    async fn services(&self) -> Fetched<Vec<ServiceEntry>> {
        Self::read("services", self.get(SERVICES_PATH).await)
    }


    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.post_json(LOGIN_PATH, &body).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<()> {
        let _: Value = self.post_json(SIGNUP_PATH, request).await?;
        Ok(())
    }

    async fn profile(&self) -> Result<UserProfile> {
        self.get(PROFILE_PATH).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        let response: Value = self.put_json(PROFILE_PATH, update).await?;

        // The backend may answer with the profile or with a bare confirmation
        // message; in the latter case read the profile back.
        if response.get("user_id").is_some() || response.get("username").is_some() {
            serde_json::from_value(response)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))
                .context("Failed to parse updated profile")
        } else {
            debug!("Profile update returned no profile, refetching");
            self.profile().await
        }
    }

    async fn catches(&self) -> Result<Vec<CatchRecord>> {
        self.get(CATCHES_PATH).await
    }

    async fn posts(&self) -> Result<Vec<Post>> {
        let response: PostsResponse = self.get(POSTS_PATH).await?;
        Ok(response.posts)
    }

    async fn create_catch(&self, new_catch: &NewCatch) -> Result<CatchRecord> {
        self.post_json(CATCHES_PATH, new_catch).await
    }

    async fn update_catch(&self, id: &str, update: &CatchUpdate) -> Result<CatchRecord> {
        self.put_json(&format!("{}/{}", CATCHES_PATH, id), update)
            .await
    }

    async fn delete_catch(&self, id: &str) -> Result<()> {
        let path = format!("{}/{}", CATCHES_PATH, id);
        let _: Value = self.send(self.request(Method::DELETE, &path), &path).await?;
        Ok(())
    }

    async fn check_consent(&self) -> Result<ConsentRecord> {
        self.get(CONSENT_CHECK_PATH).await
    }

    async fn update_consent(&self, consent: bool) -> Result<Value> {
        self.post_json(CONSENT_PATH, &ConsentUpdate { consent }).await
    }

    async fn predict_catch(&self, photo: ImageUpload) -> Result<Value> {
        let form = Self::multipart_form(&[], Some(photo))?;
        self.send(self.request(Method::POST, PREDICT_PATH).multipart(form), PREDICT_PATH)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

    fn client() -> ApiClient {
        ApiClient::new("https://snapish.test/").expect("client")
    }

    #[test]
    fn test_url_joining() {
        let client = client();
        assert_eq!(client.base_url(), "https://snapish.test");
        assert_eq!(client.url("/profile"), "https://snapish.test/profile");
        assert_eq!(client.url("api/posts"), "https://snapish.test/api/posts");
    }

    #[test]
    fn test_bearer_header_follows_token() {
        let client = client();
        let request = client
            .request(Method::GET, PROFILE_PATH)
            .build()
            .expect("build");
        assert!(request.headers().get(AUTHORIZATION).is_none());

        client.set_token(Some("abc.def".to_string()));
        let request = client
            .request(Method::GET, PROFILE_PATH)
            .build()
            .expect("build");
        assert_eq!(
            request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc.def")
        );

        client.set_token(None);
        let request = client
            .request(Method::GET, PROFILE_PATH)
            .build()
            .expect("build");
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_clones_share_token() {
        let client = client();
        let clone = client.clone();
        client.set_token(Some("shared".to_string()));
        assert_eq!(clone.token().as_deref(), Some("shared"));
    }

    #[test]
    fn test_lookup_bodies_are_url_encoded() {
        let client = client();
        let fields = ApiClient::coordinate_fields(Coordinates::new(35.1, 129.04));
        let request = client
            .form_request(WEATHER_PATH, &fields)
            .build()
            .expect("build");

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), "/backend/get-weather");
        assert_eq!(
            request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/x-www-form-urlencoded")
        );
        let body = request.body().and_then(|b| b.as_bytes()).expect("body");
        assert_eq!(body, b"lat=35.1&lon=129.04");
    }

    #[test]
    fn test_multipart_rejects_undecodable_image() {
        let photo = ImageUpload {
            file_name: "broken.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert!(ApiClient::multipart_form(&[], Some(photo)).is_err());
    }

    #[test]
    fn test_multipart_passes_non_images_through() {
        let doc = ImageUpload {
            file_name: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        };
        assert!(ApiClient::multipart_form(&[("memo", "x")], Some(doc)).is_ok());
    }

    /// Base URL of a local port that was bound and released again
    fn closed_base_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        format!("http://{}", listener.local_addr().expect("local addr"))
    }

    #[tokio::test]
    async fn test_read_fetch_swallows_transport_errors() {
        let client = ApiClient::with_timeout(&closed_base_url(), Duration::from_secs(2))
            .expect("client");
        let result = client.tide("2024-05-01").await;
        let failure = result.expect_err("tide should fail");
        assert!(failure.error.contains("Failed to send"));
    }

    #[tokio::test]
    async fn test_mutation_fetch_propagates_network_error() {
        let client = ApiClient::with_timeout(&closed_base_url(), Duration::from_secs(2))
            .expect("client");
        let err = client.profile().await.expect_err("profile should fail");
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Network(_))));
    }
}
