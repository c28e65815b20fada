//! Studio Access - Authenticated API access layer
//!
//! The part of the creator studio front end that talks to the backend:
//! every outbound request, its credential, and what happens when it fails.
//!
//! ## Features
//!
//! - Per-request credential resolution: fresh identity-provider tokens first,
//!   the legacy cookie/local token second
//! - Failure normalization into user-facing notices (timeouts, rate limits,
//!   malformed responses)
//! - Forced logout and redirect on authorization failure
//! - Best-effort key-value storage over a host API or a local fallback
//!
//! ## Architecture
//!
//! - **Auth**: cookie store, legacy token persistence, credential resolver
//! - **Storage**: dual-backend key-value persistence that never fails the caller
//! - **Client**: the request/response pipeline and session teardown
//! - **Security**: redaction of secrets for logging
//!
//! All ambient state (cookie jar, local store, host storage, navigation,
//! identity session) is injected, so every piece runs against in-memory
//! doubles in tests.

pub mod auth;
pub mod client;
pub mod config;
pub mod security;
pub mod storage;

use std::sync::Arc;

use auth::{CookieJar, CookieStore, CredentialResolver, IdentityProvider, LegacyTokenStore};
use client::{ApiClient, ApiError, ClientConfig, Navigator};
use config::AccessConfig;
use storage::{HostStorage, LocalStore, Storage};

/// External capabilities the access layer runs on
pub struct Collaborators {
    /// Ambient cookie jar
    pub cookie_jar: Arc<dyn CookieJar>,
    /// Synchronous local persistence
    pub local_store: Arc<dyn LocalStore>,
    /// Host-provided storage, when the embedding host offers one
    pub host_storage: Option<Arc<dyn HostStorage>>,
    /// Signed-in identity session, if the identity provider is wired up
    pub identity: Option<Arc<dyn IdentityProvider>>,
    /// Navigation boundary
    pub navigator: Arc<dyn Navigator>,
}

/// The assembled access layer
pub struct AccessLayer {
    /// Authenticated API client
    pub client: ApiClient,
    /// Key-value storage
    pub storage: Storage,
    /// Legacy token persistence, for login flows that issue one
    pub legacy: LegacyTokenStore,
}

impl AccessLayer {
    /// Wires every component from `config` and the injected collaborators
    pub fn new(config: &AccessConfig, collaborators: Collaborators) -> Result<Self, ApiError> {
        let cookies = CookieStore::new(collaborators.cookie_jar, config.secure_transport);
        let legacy = LegacyTokenStore::new(cookies, collaborators.local_store.clone())
            .with_key(config.legacy_token_key.clone())
            .with_cookie_days(config.cookie_days);

        let resolver = CredentialResolver::new(collaborators.identity, legacy.clone());
        let client = ApiClient::new(ClientConfig::from(config), resolver, collaborators.navigator)?;
        let storage = Storage::new(collaborators.host_storage, collaborators.local_store);

        tracing::info!(
            "Access layer ready (api: {}, storage: {:?})",
            security::redact_url(&config.api_base_url),
            storage.mode()
        );

        Ok(Self {
            client,
            storage,
            legacy,
        })
    }
}

/// Installs the default `tracing` subscriber
///
/// Honors `RUST_LOG`; otherwise logs this crate at debug and everything else
/// at info. Calling it again is a no-op.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("studio_access=debug,info"));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::MemoryCookieJar;
    use client::MemoryNavigator;
    use serde_json::{json, Value};
    use storage::{MemoryHostStorage, MemoryLocalStore, StorageMode};

    fn collaborators(host: Option<Arc<dyn HostStorage>>) -> (Arc<MemoryLocalStore>, Collaborators) {
        let local = Arc::new(MemoryLocalStore::new());
        let collaborators = Collaborators {
            cookie_jar: Arc::new(MemoryCookieJar::new()),
            local_store: local.clone(),
            host_storage: host,
            identity: None,
            navigator: Arc::new(MemoryNavigator::new("/dashboard")),
        };
        (local, collaborators)
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }

    #[tokio::test]
    async fn test_access_layer_wiring() {
        let mut config = AccessConfig::with_base_url("https://api.example.com");
        config.legacy_token_key = "auth_token".into();

        let (local, collaborators) = collaborators(None);
        let layer = AccessLayer::new(&config, collaborators).unwrap();

        assert_eq!(layer.storage.mode(), StorageMode::Local);
        assert_eq!(layer.client.config().base_url, "https://api.example.com");

        layer.legacy.save("issued");
        assert_eq!(local.get_item("auth_token").unwrap(), Some("issued".to_string()));

        let credential = layer.client.resolver().resolve().await.unwrap();
        assert_eq!(credential.token().expose(), "issued");
    }

    #[tokio::test]
    async fn test_access_layer_prefers_host_storage() {
        let host = Arc::new(MemoryHostStorage::new());
        let (local, collaborators) = collaborators(Some(host.clone()));
        let layer = AccessLayer::new(&AccessConfig::default(), collaborators).unwrap();

        assert_eq!(layer.storage.mode(), StorageMode::Host);
        layer.storage.set_value("theme", json!("dark")).await;
        assert_eq!(host.get("theme").await.unwrap(), Some(json!("dark")));
        assert!(local.is_empty());
        assert_eq!(layer.storage.get_value("theme", Value::Null).await.into_value(), json!("dark"));
    }
}
