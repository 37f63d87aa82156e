//! # anypoint-client
//!
//! Resilient, rate-conscious access to the Anypoint Platform API.
//!
//! The crate authenticates requests with a refreshable bearer credential,
//! transparently retries once on authorization expiry, and caches idempotent
//! GET results with per-endpoint TTL overrides resolved by matching request
//! paths against wildcard patterns.
//!
//! ## Overview
//!
//! - [`PathTrie`] — prefix-tree matcher resolving request paths against
//!   wildcard patterns
//! - [`TtlCache`] — TTL-, size- and count-bounded in-memory store with
//!   hit/miss accounting and a background sweep
//! - [`ClientCredentialsAuthorizer`] — single-flight bearer token acquisition
//!   behind the [`Authorizer`] capability trait
//! - [`ApiClient`] — authenticated JSON requests with a single 401
//!   reset-and-retry, behind the [`HttpOperations`] capability trait
//! - [`CachedApiClient`] — caching decorator over any [`HttpOperations`]
//!   implementer
//!
//! ## Example
//!
//! ```ignore
//! use anypoint_client::{HttpOperationsExt, config::loader, create_client};
//!
//! let config = loader::load_config(None)?;
//! let client = create_client(&config);
//!
//! let environments: Vec<Environment> = client
//!     .get("/accounts/api/organizations/my-org/environments", None)
//!     .await?;
//! ```

mod auth;
mod cache;
mod cached;
mod client;
pub mod config;
mod error;
mod factory;
mod path_trie;

// Re-export everything from submodules
pub use auth::{AccessToken, AuthConfig, Authorizer, ClientCredentialsAuthorizer, DEFAULT_TOKEN_URL};
pub use cache::{CacheConfig, CacheStats, TtlCache};
pub use cached::CachedApiClient;
pub use client::{
    ApiClient, ApiConfig, DEFAULT_BASE_URL, HttpOperations, HttpOperationsExt, RequestHeaders,
};
pub use config::{Config, ConfigError};
pub use error::{AuthorizationError, HttpError, Result};
pub use factory::{DynHttpOperations, create_client};
pub use path_trie::{PathMatch, PathTrie};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use anypoint_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::{AccessToken, AuthConfig, Authorizer, ClientCredentialsAuthorizer};
    pub use crate::cache::{CacheConfig, CacheStats, TtlCache};
    pub use crate::cached::CachedApiClient;
    pub use crate::client::{
        ApiClient, ApiConfig, HttpOperations, HttpOperationsExt, RequestHeaders,
    };
    pub use crate::config::{Config, ConfigError};
    pub use crate::error::{AuthorizationError, HttpError};
    pub use crate::factory::{DynHttpOperations, create_client};
    pub use crate::path_trie::{PathMatch, PathTrie};
    pub use crate::Result;
}
