//! Authentication module - Credentials for outbound requests
//!
//! Provides:
//! - A cookie store over an injected cookie jar
//! - Legacy token persistence (cookie + local store)
//! - Credential resolution preferring identity-provider tokens

mod cookies;
mod credential;
mod legacy;

pub use cookies::{CookieJar, CookieOptions, CookieStore, JarEntry, MemoryCookieJar, SameSite, DEFAULT_COOKIE_DAYS};
pub use credential::{
    Credential, CredentialResolver, CredentialSource, IdentityError, IdentityProvider, IdentityUser,
    SecretToken,
};
pub use legacy::{LegacyTokenStore, LEGACY_TOKEN_KEY};
