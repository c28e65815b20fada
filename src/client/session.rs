//! Session teardown on authorization failure
//!
//! Purges the legacy token and sends the user back to the application root,
//! unless they are already on the root or an auth-entry page.

use std::sync::Arc;

use super::navigator::Navigator;
use crate::auth::LegacyTokenStore;

/// Forced logout performed when a request comes back 401
#[derive(Clone)]
pub struct SessionTeardown {
    legacy: LegacyTokenStore,
    navigator: Arc<dyn Navigator>,
    root_path: String,
    auth_entry_paths: Vec<String>,
}

impl SessionTeardown {
    pub fn new(
        legacy: LegacyTokenStore,
        navigator: Arc<dyn Navigator>,
        root_path: impl Into<String>,
        auth_entry_paths: Vec<String>,
    ) -> Self {
        Self {
            legacy,
            navigator,
            root_path: root_path.into(),
            auth_entry_paths,
        }
    }

    /// Whether `path` is the root or an auth-entry page (or below one)
    ///
    /// Query string and fragment are ignored, so `/?ref=x` is the root.
    pub fn is_public_path(&self, path: &str) -> bool {
        let path = path.find(['?', '#']).map_or(path, |end| &path[..end]);
        if path.is_empty() || path == self.root_path {
            return true;
        }
        self.auth_entry_paths.iter().any(|entry| {
            path == entry
                || path
                    .strip_prefix(entry.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Purges legacy credentials and redirects; returns whether it navigated
    ///
    /// Idempotent: concurrent 401s may each call this.
    pub fn run(&self) -> bool {
        self.legacy.purge();

        let current = self.navigator.current_path();
        if self.is_public_path(&current) {
            tracing::info!("Session cleared on {}, staying on public page", current);
            return false;
        }

        tracing::info!("Session cleared, redirecting {} -> {}", current, self.root_path);
        self.navigator.navigate(&self.root_path);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CookieStore, MemoryCookieJar};
    use crate::client::MemoryNavigator;
    use crate::storage::{LocalStore, MemoryLocalStore};

    fn teardown(current: &str) -> (Arc<MemoryNavigator>, Arc<MemoryLocalStore>, SessionTeardown) {
        let cookies = CookieStore::new(Arc::new(MemoryCookieJar::new()), false);
        let local = Arc::new(MemoryLocalStore::new());
        let legacy = LegacyTokenStore::new(cookies, local.clone());
        legacy.save("legacy-token");

        let nav = Arc::new(MemoryNavigator::new(current));
        let entries = vec!["/login".to_string(), "/register".to_string()];
        let session = SessionTeardown::new(legacy, nav.clone(), "/", entries);
        (nav, local, session)
    }

    #[test]
    fn test_public_paths() {
        let (_, _, session) = teardown("/");
        assert!(session.is_public_path("/"));
        assert!(session.is_public_path(""));
        assert!(session.is_public_path("/login"));
        assert!(session.is_public_path("/login/callback"));
        assert!(session.is_public_path("/register?ref=tiktok"));
        assert!(session.is_public_path("/login#reset"));
        assert!(!session.is_public_path("/loginhelp"));
        assert!(!session.is_public_path("/dashboard?tab=1"));
        assert!(!session.is_public_path("/dashboard"));
    }

    #[test]
    fn test_redirects_from_private_page() {
        let (nav, local, session) = teardown("/dashboard");
        assert!(session.run());

        assert_eq!(nav.history(), vec!["/".to_string()]);
        assert_eq!(local.get_item("token").unwrap(), None);
    }

    #[test]
    fn test_no_redirect_on_login_page() {
        let (nav, local, session) = teardown("/login");
        assert!(!session.run());

        assert!(nav.history().is_empty());
        assert_eq!(local.get_item("token").unwrap(), None);
    }

    #[test]
    fn test_no_redirect_on_root_with_query_or_fragment() {
        for current in ["/?ref=x", "/#top"] {
            let (nav, local, session) = teardown(current);
            assert!(!session.run());

            assert!(nav.history().is_empty());
            assert_eq!(local.get_item("token").unwrap(), None);
        }
    }

    #[test]
    fn test_repeated_teardown_is_harmless() {
        let (nav, _, session) = teardown("/projects/42");
        assert!(session.run());
        // Navigator is now on root, so the second run stays put
        assert!(!session.run());
        assert_eq!(nav.history().len(), 1);
    }
}
