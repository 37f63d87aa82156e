//! Authenticated JSON client for the Anypoint Platform API.
//!
//! [`ApiClient`] resolves request paths against a configured base address,
//! attaches a bearer token obtained from an [`Authorizer`], and classifies
//! responses. A 401 on the first attempt of a logical call resets the cached
//! token and retries the whole request exactly once; every other non-success
//! status surfaces as [`HttpError::Status`].
//!
//! The configured `timeout` and `retry_attempts` are accepted and exposed but
//! deliberately not enforced: the only built-in retry is the single 401 path.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::auth::Authorizer;
use crate::cache::CacheStats;
use crate::error::{HttpError, Result};

/// Caller-supplied request headers, keyed in stable (sorted) order.
pub type RequestHeaders = BTreeMap<String, String>;

/// Production base address of the Anypoint Platform API.
pub const DEFAULT_BASE_URL: &str = "https://anypoint.mulesoft.com";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`ApiClient`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base address requests are resolved against.
    pub base_url: Url,

    /// Request timeout. Accepted but not currently enforced.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry attempt budget. Accepted but not consulted beyond the single
    /// built-in 401 retry.
    pub retry_attempts: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

impl ApiConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base address.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry attempt budget.
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }
}

// =============================================================================
// HTTP Operations Trait
// =============================================================================

/// Dyn-safe surface of authenticated JSON request operations.
///
/// The cache lifecycle methods have no-op defaults so the bare [`ApiClient`]
/// and the caching decorator share one trait object type; only the decorator
/// overrides them.
#[async_trait]
pub trait HttpOperations: Send + Sync {
    /// Issues a GET and returns the parsed JSON body.
    async fn get_json(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<Value>;

    /// Issues a POST with a JSON body.
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value>;

    /// Issues a PUT with a JSON body.
    async fn put_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value>;

    /// Issues a PATCH with a JSON body.
    async fn patch_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value>;

    /// Issues a DELETE. Returns `Value::Null` for 204 responses.
    async fn delete(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<Value>;

    /// Cache statistics, when a cache layer is present.
    async fn cache_stats(&self) -> Option<CacheStats> {
        None
    }

    /// Clears the cache layer, when present.
    async fn clear_cache(&self) {}

    /// Releases cache resources (background tasks, entries), when present.
    async fn destroy(&self) {}
}

/// Typed convenience layer over [`HttpOperations`].
///
/// Blanket-implemented for every implementer; bodies are serialized to
/// [`Value`] on the way in and results deserialized on the way out.
#[async_trait]
pub trait HttpOperationsExt: HttpOperations {
    /// Typed GET.
    async fn get<T>(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        Ok(serde_json::from_value(self.get_json(path, headers).await?)?)
    }

    /// Typed POST.
    async fn post<T, B>(&self, path: &str, body: &B, headers: Option<&RequestHeaders>) -> Result<T>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync,
    {
        let body = serde_json::to_value(body)?;
        Ok(serde_json::from_value(
            self.post_json(path, &body, headers).await?,
        )?)
    }

    /// Typed PUT.
    async fn put<T, B>(&self, path: &str, body: &B, headers: Option<&RequestHeaders>) -> Result<T>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync,
    {
        let body = serde_json::to_value(body)?;
        Ok(serde_json::from_value(
            self.put_json(path, &body, headers).await?,
        )?)
    }

    /// Typed PATCH.
    async fn patch<T, B>(&self, path: &str, body: &B, headers: Option<&RequestHeaders>) -> Result<T>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync,
    {
        let body = serde_json::to_value(body)?;
        Ok(serde_json::from_value(
            self.patch_json(path, &body, headers).await?,
        )?)
    }
}

impl<C: HttpOperations + ?Sized> HttpOperationsExt for C {}

// =============================================================================
// API Client
// =============================================================================

/// Authenticated HTTP client for the platform API.
pub struct ApiClient {
    http: reqwest::Client,
    authorizer: Arc<dyn Authorizer>,
    organization_id: String,
    config: ApiConfig,
}

impl ApiClient {
    /// Creates a client scoped to one organization.
    #[must_use]
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        organization_id: impl Into<String>,
        config: ApiConfig,
    ) -> Self {
        Self {
            // No timeout on the transport: the configured value is accepted
            // but not enforced.
            http: reqwest::Client::new(),
            authorizer,
            organization_id: organization_id.into(),
            config,
        }
    }

    /// The organization scope of this client.
    #[must_use]
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// The configured base address.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// The accepted (unenforced) request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// The accepted (inert) retry attempt budget.
    #[must_use]
    pub fn retry_attempts(&self) -> u32 {
        self.config.retry_attempts
    }

    /// Sends one logical request with the single built-in 401 retry.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        let url = self.config.base_url.join(path)?;

        let mut attempt = 0u8;
        loop {
            let token = self.authorizer.authorize().await?;
            let header_map = build_headers(&token.access_token, body.is_some(), headers)?;

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .headers(header_map);
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!(method = %method, path, attempt, "sending request");
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::NO_CONTENT {
                tracing::debug!(method = %method, path, status = 204, "received empty response");
                return Ok(Value::Null);
            }

            if status.is_success() {
                let text = response.text().await?;
                let value: Value = serde_json::from_str(&text)?;
                tracing::debug!(method = %method, path, status = status.as_u16(), "received response");
                return Ok(value);
            }

            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                tracing::warn!(
                    method = %method,
                    path,
                    status = 401,
                    "received 401, resetting token and retrying"
                );
                self.authorizer.reset_token();
                attempt += 1;
                continue;
            }

            let status_text = status.canonical_reason().unwrap_or("");
            tracing::error!(
                method = %method,
                path,
                status = status.as_u16(),
                attempt,
                "request failed"
            );
            return Err(HttpError::status(status.as_u16(), status_text));
        }
    }
}

#[async_trait]
impl HttpOperations for ApiClient {
    async fn get_json(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<Value> {
        self.request(Method::GET, path, None, headers).await
    }

    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        self.request(Method::POST, path, Some(body), headers).await
    }

    async fn put_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        self.request(Method::PUT, path, Some(body), headers).await
    }

    async fn patch_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        self.request(Method::PATCH, path, Some(body), headers).await
    }

    async fn delete(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<Value> {
        self.request(Method::DELETE, path, None, headers).await
    }
}

/// Builds the request header map.
///
/// Later inserts replace earlier ones, so precedence is: JSON content-type
/// (when a body is present) < `Accept` + bearer < caller headers.
fn build_headers(
    access_token: &str,
    has_body: bool,
    headers: Option<&RequestHeaders>,
) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();

    if has_body {
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    map.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|e| HttpError::invalid_header(format!("authorization: {e}")))?;
    map.insert(AUTHORIZATION, bearer);

    if let Some(headers) = headers {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::invalid_header(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::invalid_header(format!("{name}: {e}")))?;
            map.insert(name, value);
        }
    }

    Ok(map)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url.as_str(), "https://anypoint.mulesoft.com/");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_config_builder() {
        let base = Url::parse("http://localhost:8080").unwrap();
        let config = ApiConfig::new()
            .with_base_url(base.clone())
            .with_timeout(Duration::from_secs(5))
            .with_retry_attempts(0);

        assert_eq!(config.base_url, base);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_attempts, 0);
    }

    #[test]
    fn test_build_headers_defaults() {
        let map = build_headers("tok-1", false, None).unwrap();

        assert_eq!(map.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(map.get(AUTHORIZATION).unwrap(), "Bearer tok-1");
        assert!(map.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_build_headers_sets_content_type_with_body() {
        let map = build_headers("tok-1", true, None).unwrap();
        assert_eq!(map.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let mut headers = RequestHeaders::new();
        headers.insert("accept".to_string(), "application/xml".to_string());
        headers.insert("x-custom".to_string(), "yes".to_string());

        let map = build_headers("tok-1", false, Some(&headers)).unwrap();

        assert_eq!(map.get(ACCEPT).unwrap(), "application/xml");
        assert_eq!(map.get("x-custom").unwrap(), "yes");
        // The bearer header is untouched by unrelated overrides.
        assert_eq!(map.get(AUTHORIZATION).unwrap(), "Bearer tok-1");
    }

    #[test]
    fn test_invalid_caller_header_is_rejected() {
        let mut headers = RequestHeaders::new();
        headers.insert("x-bad".to_string(), "line\nbreak".to_string());

        let err = build_headers("tok-1", false, Some(&headers)).unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeader(_)));
    }

    #[test]
    fn test_base_url_join_semantics() {
        let config = ApiConfig::default();
        let joined = config.base_url.join("/amc/api/v2/orgs?limit=5").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://anypoint.mulesoft.com/amc/api/v2/orgs?limit=5"
        );
    }
}
