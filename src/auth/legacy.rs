//! Legacy token persistence
//!
//! The older login flow leaves its bearer token in two places: a cookie and
//! the local store, both under the same key. Reads prefer the cookie.

use std::sync::Arc;

use super::cookies::{CookieOptions, CookieStore, DEFAULT_COOKIE_DAYS};
use crate::storage::LocalStore;

/// Key of the legacy token in both the cookie jar and the local store
pub const LEGACY_TOKEN_KEY: &str = "token";

/// Reads, writes and purges the legacy token
#[derive(Clone)]
pub struct LegacyTokenStore {
    cookies: CookieStore,
    local: Arc<dyn LocalStore>,
    key: String,
    cookie_days: i64,
}

impl LegacyTokenStore {
    /// Creates a store over the given cookie store and local store
    ///
    /// # Arguments
    ///
    /// * `cookies` - Cookie store holding the token cookie
    /// * `local` - Local store holding the persisted copy
    pub fn new(cookies: CookieStore, local: Arc<dyn LocalStore>) -> Self {
        Self {
            cookies,
            local,
            key: LEGACY_TOKEN_KEY.to_string(),
            cookie_days: DEFAULT_COOKIE_DAYS,
        }
    }

    /// Uses a different key for both stores
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Lifetime of the cookie written by [`save`](Self::save)
    pub fn with_cookie_days(mut self, days: i64) -> Self {
        self.cookie_days = days;
        self
    }

    /// Key used in both stores
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    /// Reads the legacy token
    ///
    /// # Returns
    ///
    /// The cookie value if present and non-empty, otherwise the local store
    /// value if non-empty, otherwise `None`. Local store faults read as `None`.
    pub fn read(&self) -> Option<String> {
        if let Some(token) = self.cookies.get(&self.key).filter(|t| !t.is_empty()) {
            return Some(token);
        }

        match self.local.get_item(&self.key) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read legacy token from local store: {}", e);
                None
            }
        }
    }

    /// Persists a token issued by a login response in both places
    ///
    /// # Arguments
    ///
    /// * `token` - The token to store; written to the cookie for the
    ///   configured lifetime and to the local store
    pub fn save(&self, token: &str) {
        self.cookies
            .set(&self.key, token, self.cookie_days, &CookieOptions::default());
        if let Err(e) = self.local.set_item(&self.key, token) {
            tracing::warn!("Failed to persist legacy token locally: {}", e);
        }
    }

    /// Removes the token from both places; safe to call repeatedly
    pub fn purge(&self) {
        self.cookies.delete(&self.key, &CookieOptions::default());
        if let Err(e) = self.local.remove_item(&self.key) {
            tracing::warn!("Failed to remove legacy token from local store: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCookieJar;
    use crate::storage::MemoryLocalStore;

    fn store() -> (Arc<MemoryLocalStore>, LegacyTokenStore) {
        let cookies = CookieStore::new(Arc::new(MemoryCookieJar::new()), false);
        let local = Arc::new(MemoryLocalStore::new());
        (local.clone(), LegacyTokenStore::new(cookies, local))
    }

    #[test]
    fn test_read_prefers_cookie() {
        let (local, legacy) = store();
        local.set_item("token", "from-local").unwrap();
        legacy.cookies().set("token", "from-cookie", 7, &CookieOptions::default());

        assert_eq!(legacy.read(), Some("from-cookie".to_string()));
    }

    #[test]
    fn test_empty_cookie_falls_through() {
        let (local, legacy) = store();
        legacy.cookies().set("token", "", 7, &CookieOptions::default());
        local.set_item("token", "from-local").unwrap();

        assert_eq!(legacy.read(), Some("from-local".to_string()));
    }

    #[test]
    fn test_empty_everywhere_is_none() {
        let (local, legacy) = store();
        local.set_item("token", "").unwrap();
        assert_eq!(legacy.read(), None);
    }

    #[test]
    fn test_save_and_purge() {
        let (local, legacy) = store();
        legacy.save("issued-token");

        assert_eq!(legacy.cookies().get("token"), Some("issued-token".to_string()));
        assert_eq!(local.get_item("token").unwrap(), Some("issued-token".to_string()));

        legacy.purge();
        assert!(!legacy.cookies().has("token"));
        assert_eq!(local.get_item("token").unwrap(), None);

        // Second purge is a no-op
        legacy.purge();
        assert_eq!(legacy.read(), None);
    }

    #[test]
    fn test_save_with_oversized_cookie_lifetime() {
        let (local, legacy) = store();
        let legacy = legacy.with_cookie_days(i64::MAX);
        legacy.save("issued-token");

        assert_eq!(legacy.cookies().get("token"), Some("issued-token".to_string()));
        assert_eq!(local.get_item("token").unwrap(), Some("issued-token".to_string()));
    }

    #[test]
    fn test_custom_key() {
        let (local, legacy) = store();
        let legacy = legacy.with_key("auth_token").with_cookie_days(1);
        legacy.save("abc");

        assert_eq!(legacy.key(), "auth_token");
        assert_eq!(local.get_item("auth_token").unwrap(), Some("abc".to_string()));
        assert_eq!(local.get_item("token").unwrap(), None);
    }
}
