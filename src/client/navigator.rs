//! Navigation boundary
//!
//! Session teardown needs to know where the user is and to send them to the
//! application root.

use std::sync::RwLock;

/// Current location and full-page navigation
pub trait Navigator: Send + Sync {
    /// Path of the current page (e.g. `/dashboard`)
    fn current_path(&self) -> String;

    /// Performs a full-page navigation to `path`
    fn navigate(&self, path: &str);
}

/// Navigator that records navigations instead of performing them
#[derive(Debug)]
pub struct MemoryNavigator {
    current: RwLock<String>,
    history: RwLock<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(current.into()),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Every path passed to `navigate`, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.read().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn set_current_path(&self, path: impl Into<String>) {
        if let Ok(mut current) = self.current.write() {
            *current = path.into();
        }
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.current.read().map(|c| c.clone()).unwrap_or_default()
    }

    fn navigate(&self, path: &str) {
        if let Ok(mut history) = self.history.write() {
            history.push(path.to_string());
        }
        self.set_current_path(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_navigator_records_history() {
        let nav = MemoryNavigator::new("/dashboard");
        assert_eq!(nav.current_path(), "/dashboard");
        assert!(nav.history().is_empty());

        nav.navigate("/");
        assert_eq!(nav.current_path(), "/");
        assert_eq!(nav.history(), vec!["/".to_string()]);
    }

    #[test]
    fn test_default_is_root() {
        assert_eq!(MemoryNavigator::default().current_path(), "/");
    }
}
