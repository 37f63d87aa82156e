//! Composition root for the client stack.
//!
//! Components are constructed explicitly in dependency order — authorizer,
//! cache, client, caching decorator — and handed out behind a single
//! [`HttpOperations`] trait object. There is no service locator; callers own
//! the returned handle and manage its lifecycle through the trait's cache
//! methods.

use std::sync::Arc;

use crate::auth::{Authorizer, ClientCredentialsAuthorizer};
use crate::cache::TtlCache;
use crate::cached::CachedApiClient;
use crate::client::{ApiClient, HttpOperations};
use crate::config::Config;

/// Type alias for a shareable client instance.
pub type DynHttpOperations = Arc<dyn HttpOperations>;

/// Builds the client stack described by `config`.
///
/// With `enable_caching` set, GET responses flow through a [`TtlCache`];
/// otherwise the bare [`ApiClient`] is returned and the trait's cache
/// lifecycle methods are no-ops.
///
/// Must be called inside a Tokio runtime when caching is enabled: cache
/// construction spawns the background sweep task.
#[must_use]
pub fn create_client(config: &Config) -> DynHttpOperations {
    let authorizer: Arc<dyn Authorizer> =
        Arc::new(ClientCredentialsAuthorizer::new(config.auth.clone()));

    let client = ApiClient::new(
        authorizer,
        config.organization_id.clone(),
        config.api.clone(),
    );

    if config.enable_caching {
        let cache = TtlCache::new(config.cache.clone());
        Arc::new(CachedApiClient::new(
            client,
            cache,
            config.organization_id.clone(),
        ))
    } else {
        Arc::new(client)
    }
}
