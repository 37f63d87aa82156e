//! Bearer token acquisition for the Anypoint Platform.
//!
//! [`ClientCredentialsAuthorizer`] exchanges a client id/secret pair for an
//! access token at the platform token endpoint and caches the token until it
//! is explicitly reset. Concurrent [`Authorizer::authorize`] calls while an
//! exchange is in flight are coalesced onto one shared future, so only a
//! single credential exchange is ever issued at a time (single-flight) and
//! every waiter observes the same settlement, success or failure.
//!
//! The token's declared `expires_in` is informational only: nothing expires
//! the cached token proactively. The single 401-handling path in the HTTP
//! client calls [`Authorizer::reset_token`] to force reacquisition.

use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthorizationError;

/// Production token endpoint for client-credentials exchange.
pub const DEFAULT_TOKEN_URL: &str = "https://anypoint.mulesoft.com/accounts/api/v2/oauth2/token";

// =============================================================================
// Access Token
// =============================================================================

/// A bearer credential issued by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    /// The bearer token value.
    pub access_token: String,
    /// Declared lifetime in seconds. Informational only; never consulted for
    /// proactive expiry.
    pub expires_in: u64,
    /// Token type as reported by the endpoint (typically `bearer`).
    pub token_type: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`ClientCredentialsAuthorizer`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Connected-app client id.
    pub client_id: String,

    /// Connected-app client secret.
    pub client_secret: String,

    /// Token endpoint for the credential exchange. Overridable so tests can
    /// point at a local mock server.
    pub token_url: Url,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: default_token_url(),
        }
    }
}

fn default_token_url() -> Url {
    Url::parse(DEFAULT_TOKEN_URL).expect("default token URL is valid")
}

impl AuthConfig {
    /// Creates a configuration with the production token endpoint.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: default_token_url(),
        }
    }

    /// Sets the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, token_url: Url) -> Self {
        self.token_url = token_url;
        self
    }
}

// =============================================================================
// Authorizer Trait
// =============================================================================

/// Capability for acquiring and invalidating the bearer credential.
///
/// `reset_token` is a mandatory part of the contract: the HTTP client depends
/// on it unconditionally for its 401 handling.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns the cached token, or acquires a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] when the credential exchange fails.
    /// The failed exchange is not remembered; a subsequent call starts a new
    /// one.
    async fn authorize(&self) -> Result<AccessToken, AuthorizationError>;

    /// Drops the cached token so the next `authorize` call reacquires.
    ///
    /// Has no effect on an exchange that is already in flight.
    fn reset_token(&self);
}

// =============================================================================
// Client Credentials Authorizer
// =============================================================================

type TokenFuture = Shared<BoxFuture<'static, Result<AccessToken, AuthorizationError>>>;

/// Mutable authorizer state. The lock is only ever held for field access,
/// never across an await.
struct AuthState {
    token: Option<AccessToken>,
    pending: Option<TokenFuture>,
}

/// Single-flight client-credentials authorizer.
pub struct ClientCredentialsAuthorizer {
    http: reqwest::Client,
    config: AuthConfig,
    state: Mutex<AuthState>,
}

impl ClientCredentialsAuthorizer {
    /// Creates an authorizer for the configured connected app.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            state: Mutex::new(AuthState {
                token: None,
                pending: None,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Performs one credential exchange against the token endpoint.
    async fn exchange(
        http: reqwest::Client,
        config: AuthConfig,
    ) -> Result<AccessToken, AuthorizationError> {
        tracing::debug!(token_url = %config.token_url, "requesting access token");

        let response = http
            .post(config.token_url.clone())
            .json(&serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": config.client_id,
                "client_secret": config.client_secret,
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(token_url = %config.token_url, error = %e, "token request failed");
                AuthorizationError::network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token endpoint rejected exchange");
            return Err(AuthorizationError::Rejected(status.as_u16()));
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| AuthorizationError::malformed_response(e.to_string()))?;

        tracing::debug!(token_type = %token.token_type, expires_in = token.expires_in, "access token acquired");
        Ok(token)
    }
}

#[async_trait]
impl Authorizer for ClientCredentialsAuthorizer {
    async fn authorize(&self) -> Result<AccessToken, AuthorizationError> {
        // Installing the shared future happens synchronously under the lock,
        // before the first await, so a second concurrent caller always joins
        // the existing exchange instead of starting its own.
        let fut = {
            let mut state = self.state();

            if let Some(token) = &state.token {
                return Ok(token.clone());
            }

            match &state.pending {
                Some(pending) => pending.clone(),
                None => {
                    let fut = Self::exchange(self.http.clone(), self.config.clone())
                        .boxed()
                        .shared();
                    state.pending = Some(fut.clone());
                    fut
                }
            }
        };

        let result = fut.clone().await;

        {
            let mut state = self.state();
            // Clear the pending slot only if it still refers to this exchange;
            // a newer in-flight exchange must not be evicted by an old waiter.
            if state.pending.as_ref().is_some_and(|p| Shared::ptr_eq(p, &fut)) {
                state.pending = None;
            }
            if let Ok(token) = &result {
                state.token = Some(token.clone());
            }
        }

        result
    }

    fn reset_token(&self) {
        let mut state = self.state();
        state.token = None;
        tracing::debug!("cached access token reset");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AuthConfig::default();
        assert!(config.client_id.is_empty());
        assert!(config.client_secret.is_empty());
        assert_eq!(config.token_url.as_str(), DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_config_with_token_url() {
        let url = Url::parse("http://localhost:9999/token").unwrap();
        let config = AuthConfig::new("id", "secret").with_token_url(url.clone());
        assert_eq!(config.token_url, url);
        assert_eq!(config.client_id, "id");
    }

    #[test]
    fn test_access_token_debug_redacts_value() {
        let token = AccessToken {
            access_token: "super-secret-token".to_string(),
            expires_in: 3600,
            token_type: "bearer".to_string(),
        };

        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("3600"));
    }

    #[test]
    fn test_access_token_deserialization() {
        let token: AccessToken = serde_json::from_str(
            r#"{"access_token": "tok", "expires_in": 1800, "token_type": "bearer"}"#,
        )
        .unwrap();

        assert_eq!(token.access_token, "tok");
        assert_eq!(token.expires_in, 1800);
        assert_eq!(token.token_type, "bearer");
    }

    #[tokio::test]
    async fn test_reset_token_without_cached_token_is_noop() {
        let authorizer = ClientCredentialsAuthorizer::new(AuthConfig::default());
        authorizer.reset_token();
        assert!(authorizer.state().token.is_none());
        assert!(authorizer.state().pending.is_none());
    }
}
