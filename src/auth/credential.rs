//! Credential resolution
//!
//! Picks the bearer token for an outbound request. A token freshly minted by
//! the identity provider always wins; the legacy token persisted in the
//! cookie jar or local store is the fallback.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::legacy::LegacyTokenStore;
use crate::security::redact_token;

/// A bearer token whose memory is zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for placing on the wire
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretToken({})", redact_token(&self.0))
    }
}

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Minted just now from the signed-in identity session
    IdentityProvider,
    /// Persisted by the older login flow (cookie or local store)
    Legacy,
}

/// The single credential attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: SecretToken,
    source: CredentialSource,
}

impl Credential {
    pub fn new(token: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            token: SecretToken::new(token),
            source,
        }
    }

    pub fn identity(token: impl Into<String>) -> Self {
        Self::new(token, CredentialSource::IdentityProvider)
    }

    pub fn legacy(token: impl Into<String>) -> Self {
        Self::new(token, CredentialSource::Legacy)
    }

    pub fn token(&self) -> &SecretToken {
        &self.token
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Value for the `Authorization` header
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token.expose())
    }
}

/// Errors reported by an identity provider
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token minting failed
    #[error("Failed to mint ID token: {0}")]
    TokenMint(String),

    /// The identity session is no longer valid
    #[error("Identity session expired")]
    SessionExpired,

    /// Network error talking to the identity service
    #[error("Identity network error: {0}")]
    Network(String),
}

/// The user of the current identity session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub uid: String,
    pub email: Option<String>,
}

impl IdentityUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// External identity session
///
/// Only success, failure and the returned values matter here; refresh and
/// expiry are the provider's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the signed-in user, if any
    async fn current_user(&self) -> Option<IdentityUser>;

    /// Mints a fresh ID token for `user`
    async fn mint_id_token(&self, user: &IdentityUser) -> Result<String, IdentityError>;
}

/// Chooses the credential for each outbound request
pub struct CredentialResolver {
    identity: Option<Arc<dyn IdentityProvider>>,
    legacy: LegacyTokenStore,
}

impl CredentialResolver {
    pub fn new(identity: Option<Arc<dyn IdentityProvider>>, legacy: LegacyTokenStore) -> Self {
        Self { identity, legacy }
    }

    /// Resolver that only knows the legacy token
    pub fn legacy_only(legacy: LegacyTokenStore) -> Self {
        Self::new(None, legacy)
    }

    pub fn legacy_store(&self) -> &LegacyTokenStore {
        &self.legacy
    }

    /// Resolves the credential for one request
    ///
    /// Identity-provider failures are logged and fall through to the legacy
    /// token. `None` means the request goes out unauthenticated.
    pub async fn resolve(&self) -> Option<Credential> {
        if let Some(token) = self.identity_token().await {
            return Some(Credential::identity(token));
        }

        self.legacy.read().map(Credential::legacy)
    }

    async fn identity_token(&self) -> Option<String> {
        let identity = self.identity.as_ref()?;
        let user = identity.current_user().await?;

        match identity.mint_id_token(&user).await {
            Ok(token) if !token.is_empty() => {
                tracing::debug!("Using identity token {}", redact_token(&token));
                Some(token)
            }
            Ok(_) => {
                tracing::warn!("Identity provider returned an empty token for {}", user.uid);
                None
            }
            Err(e) => {
                tracing::warn!("Could not get identity token, falling back to legacy token: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CookieOptions, CookieStore, MemoryCookieJar};
    use crate::storage::{LocalStore, MemoryLocalStore};

    struct Fixture {
        cookies: CookieStore,
        local: Arc<MemoryLocalStore>,
        legacy: LegacyTokenStore,
    }

    fn fixture() -> Fixture {
        let cookies = CookieStore::new(Arc::new(MemoryCookieJar::new()), false);
        let local = Arc::new(MemoryLocalStore::new());
        let legacy = LegacyTokenStore::new(cookies.clone(), local.clone());
        Fixture {
            cookies,
            local,
            legacy,
        }
    }

    fn signed_in(mint: Result<&'static str, &'static str>) -> Arc<dyn IdentityProvider> {
        let mut mock = MockIdentityProvider::new();
        mock.expect_current_user()
            .returning(|| Some(IdentityUser::new("uid-1").with_email("creator@example.com")));
        mock.expect_mint_id_token().returning(move |_| match mint {
            Ok(token) => Ok(token.to_string()),
            Err(msg) => Err(IdentityError::TokenMint(msg.to_string())),
        });
        Arc::new(mock)
    }

    #[test]
    fn test_secret_token_debug_is_redacted() {
        let token = SecretToken::new("super-secret-abcd");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("abcd"));
    }

    #[test]
    fn test_credential_bearer_header() {
        let credential = Credential::legacy("abc");
        assert_eq!(credential.bearer_header(), "Bearer abc");
        assert_eq!(credential.source(), CredentialSource::Legacy);
        assert_eq!(credential.token().expose(), "abc");
    }

    #[tokio::test]
    async fn test_identity_token_wins_over_legacy_cookie() {
        let f = fixture();
        f.cookies.set("token", "legacy-cookie", 7, &CookieOptions::default());

        let resolver = CredentialResolver::new(Some(signed_in(Ok("id-token"))), f.legacy);
        let credential = resolver.resolve().await.unwrap();

        assert_eq!(credential.source(), CredentialSource::IdentityProvider);
        assert_eq!(credential.token().expose(), "id-token");
    }

    #[tokio::test]
    async fn test_mint_failure_falls_back_to_cookie() {
        let f = fixture();
        f.cookies.set("token", "legacy-cookie", 7, &CookieOptions::default());
        f.local.set_item("token", "legacy-local").unwrap();

        let resolver = CredentialResolver::new(Some(signed_in(Err("quota"))), f.legacy);
        let credential = resolver.resolve().await.unwrap();

        assert_eq!(credential.source(), CredentialSource::Legacy);
        assert_eq!(credential.token().expose(), "legacy-cookie");
    }

    #[tokio::test]
    async fn test_mint_failure_falls_back_to_local_store() {
        let f = fixture();
        f.local.set_item("token", "legacy-local").unwrap();

        let resolver = CredentialResolver::new(Some(signed_in(Err("quota"))), f.legacy);
        let credential = resolver.resolve().await.unwrap();

        assert_eq!(credential.token().expose(), "legacy-local");
    }

    #[tokio::test]
    async fn test_empty_identity_token_falls_back() {
        let f = fixture();
        f.local.set_item("token", "legacy-local").unwrap();

        let resolver = CredentialResolver::new(Some(signed_in(Ok(""))), f.legacy);
        assert_eq!(resolver.resolve().await.unwrap().source(), CredentialSource::Legacy);
    }

    #[tokio::test]
    async fn test_no_identity_session_skips_mint() {
        let f = fixture();
        f.cookies.set("token", "legacy-cookie", 7, &CookieOptions::default());

        let mut mock = MockIdentityProvider::new();
        mock.expect_current_user().returning(|| None);
        mock.expect_mint_id_token().never();

        let resolver = CredentialResolver::new(Some(Arc::new(mock)), f.legacy);
        assert_eq!(resolver.resolve().await.unwrap().token().expose(), "legacy-cookie");
    }

    #[tokio::test]
    async fn test_nothing_available_resolves_to_none() {
        let f = fixture();
        let resolver = CredentialResolver::legacy_only(f.legacy);
        assert!(resolver.resolve().await.is_none());
    }

    #[tokio::test]
    async fn test_identity_provider_error_variants() {
        let f = fixture();
        let mut mock = MockIdentityProvider::new();
        mock.expect_current_user().returning(|| Some(IdentityUser::new("uid-2")));
        mock.expect_mint_id_token()
            .times(1)
            .returning(|_| Err(IdentityError::SessionExpired));

        let resolver = CredentialResolver::new(Some(Arc::new(mock)), f.legacy);
        assert!(resolver.resolve().await.is_none());
    }
}
