//! Response-caching decorator over [`HttpOperations`].
//!
//! Only GET requests are cached; write verbs and DELETE pass straight
//! through. The cache key is composed from the organization scope, the HTTP
//! method, the path (query string included) and a canonical serialization of
//! the request headers, so distinct header sets for one path never collide.
//!
//! A cached value is returned only when it is *truthy*: `null`, `false`,
//! numeric zero and the empty string are treated as misses and re-fetched.
//! This mirrors the lookup's value-level presence check and is deliberate,
//! observable behavior, not an expiry artifact.

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CacheStats, TtlCache};
use crate::client::{HttpOperations, RequestHeaders};
use crate::error::Result;

/// Decorates an inner client with a [`TtlCache`] for GET responses.
pub struct CachedApiClient<C: HttpOperations> {
    inner: C,
    cache: TtlCache<Value>,
    organization_id: String,
}

impl<C: HttpOperations> CachedApiClient<C> {
    /// Wraps `inner` with `cache`, scoping keys to `organization_id`.
    #[must_use]
    pub fn new(inner: C, cache: TtlCache<Value>, organization_id: impl Into<String>) -> Self {
        Self {
            inner,
            cache,
            organization_id: organization_id.into(),
        }
    }

    /// The organization scope used in cache keys.
    #[must_use]
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// Builds the deterministic cache key for a request.
    ///
    /// Headers are a `BTreeMap`, so their JSON serialization is order-stable
    /// regardless of caller insertion order; absent headers serialize as `{}`.
    fn cache_key(&self, method: &str, path: &str, headers: Option<&RequestHeaders>) -> String {
        let canonical_headers = match headers {
            Some(headers) => {
                serde_json::to_string(headers).unwrap_or_else(|_| String::from("{}"))
            }
            None => String::from("{}"),
        };
        format!("{}:{}:{}:{}", self.organization_id, method, path, canonical_headers)
    }
}

#[async_trait]
impl<C: HttpOperations> HttpOperations for CachedApiClient<C> {
    async fn get_json(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<Value> {
        let key = self.cache_key("GET", path, headers);

        if let Some(cached) = self.cache.get(&key).await
            && is_truthy(&cached)
        {
            tracing::debug!(path, "serving GET from cache");
            return Ok(cached);
        }

        let result = self.inner.get_json(path, headers).await?;
        self.cache.set(&key, result.clone()).await;
        Ok(result)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        self.inner.post_json(path, body, headers).await
    }

    async fn put_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        self.inner.put_json(path, body, headers).await
    }

    async fn patch_json(
        &self,
        path: &str,
        body: &Value,
        headers: Option<&RequestHeaders>,
    ) -> Result<Value> {
        self.inner.patch_json(path, body, headers).await
    }

    async fn delete(&self, path: &str, headers: Option<&RequestHeaders>) -> Result<Value> {
        self.inner.delete(path, headers).await
    }

    async fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats().await)
    }

    async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    async fn destroy(&self) {
        self.cache.destroy().await;
    }
}

/// JavaScript-style truthiness for cached JSON values.
///
/// Objects and arrays are always truthy, even when empty.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================
