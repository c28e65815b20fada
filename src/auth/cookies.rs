//! Cookie store over an injected cookie jar
//!
//! Reads and writes cookies the way a page script does: one assignment
//! string per write, and a flat `name=value; other=value` header per read.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Default cookie lifetime in days
pub const DEFAULT_COOKIE_DAYS: i64 = 7;

/// Format used for the `expires` attribute (`Thu, 01 Jan 1970 00:00:00 GMT`)
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Latest expiry ever written: `Fri, 31 Dec 9999 23:59:59 GMT`
const MAX_EXPIRY_TIMESTAMP: i64 = 253_402_300_799;

/// Expiry `days` from now, capped at the latest representable cookie date
///
/// Lifetimes too far in the past clamp to the epoch so the write still
/// deletes.
fn expiry_after(days: i64) -> DateTime<Utc> {
    let latest = DateTime::from_timestamp(MAX_EXPIRY_TIMESTAMP, 0).unwrap_or(DateTime::<Utc>::MAX_UTC);
    match Duration::try_days(days).and_then(|offset| Utc::now().checked_add_signed(offset)) {
        Some(at) if at > latest => latest,
        Some(at) if at < DateTime::<Utc>::UNIX_EPOCH => DateTime::<Utc>::UNIX_EPOCH,
        Some(at) => at,
        None if days < 0 => DateTime::<Utc>::UNIX_EPOCH,
        None => latest,
    }
}

/// Same-site policy attached to written cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Lax => f.write_str("Lax"),
            Self::None => f.write_str("None"),
        }
    }
}

/// Optional attributes for `set` and `delete`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// Cookie path, "/" when unset
    pub path: Option<String>,
    /// Cookie domain, host-only when unset
    pub domain: Option<String>,
    /// Request the `secure` attribute explicitly
    pub secure: bool,
    /// Same-site policy, `Lax` when unset
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("/")
    }
}

/// The ambient cookie jar a page script sees
///
/// `cookie_header` is the read view (`a=1; b=2`), `write` takes a single
/// assignment string with attributes. Writes cannot be introspected.
pub trait CookieJar: Send + Sync {
    /// Returns every live cookie as a `name=value; ...` string
    fn cookie_header(&self) -> String;

    /// Applies one cookie assignment (`name=value; expires=...; path=/`)
    fn write(&self, assignment: &str);
}

/// A cookie held by [`MemoryCookieJar`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarEntry {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub same_site: Option<String>,
}

impl JarEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn same_slot(&self, other: &JarEntry) -> bool {
        self.name == other.name && self.path == other.path && self.domain == other.domain
    }
}

/// In-memory cookie jar with browser overwrite/expiry semantics
///
/// Cookies are keyed by (name, path, domain). An assignment with an expiry
/// in the past removes the matching cookie; with a mismatched path or domain
/// it removes nothing.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    entries: RwLock<Vec<JarEntry>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the live cookies with their attributes
    pub fn entries(&self) -> Vec<JarEntry> {
        let now = Utc::now();
        match self.entries.read() {
            Ok(entries) => entries.iter().filter(|e| !e.is_expired(now)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn parse_assignment(assignment: &str) -> Option<JarEntry> {
        let mut parts = assignment.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        if name.is_empty() {
            return None;
        }

        let mut entry = JarEntry {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            domain: None,
            expires: None,
            secure: false,
            same_site: None,
        };

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            match key.to_ascii_lowercase().as_str() {
                "expires" => {
                    entry.expires = NaiveDateTime::parse_from_str(val, HTTP_DATE_FORMAT)
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive));
                }
                "path" => entry.path = val.to_string(),
                "domain" => entry.domain = Some(val.to_string()),
                "secure" => entry.secure = true,
                "samesite" => entry.same_site = Some(val.to_string()),
                _ => {}
            }
        }

        Some(entry)
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_header(&self) -> String {
        self.entries()
            .iter()
            .map(|e| format!("{}={}", e.name, e.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn write(&self, assignment: &str) {
        let Some(entry) = Self::parse_assignment(assignment) else {
            tracing::debug!("Ignoring malformed cookie assignment");
            return;
        };

        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        entries.retain(|existing| !existing.same_slot(&entry));
        if !entry.is_expired(Utc::now()) {
            entries.push(entry);
        }
    }
}

/// Cookie store used for the legacy credential and other small values
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use studio_access::auth::{CookieOptions, CookieStore, MemoryCookieJar};
///
/// let cookies = CookieStore::new(Arc::new(MemoryCookieJar::new()), false);
/// cookies.set("token", "a b;c", 7, &CookieOptions::default());
/// assert_eq!(cookies.get("token"), Some("a b;c".to_string()));
///
/// cookies.delete("token", &CookieOptions::default());
/// assert!(!cookies.has("token"));
/// ```
#[derive(Clone)]
pub struct CookieStore {
    jar: Arc<dyn CookieJar>,
    secure_transport: bool,
}

impl CookieStore {
    /// Creates a store over `jar`; `secure_transport` forces the `secure` attribute
    pub fn new(jar: Arc<dyn CookieJar>, secure_transport: bool) -> Self {
        Self {
            jar,
            secure_transport,
        }
    }

    /// Whether the page is served over a secure transport
    pub fn is_secure_transport(&self) -> bool {
        self.secure_transport
    }

    /// Writes a cookie that expires `days` from now
    ///
    /// # Arguments
    ///
    /// * `name` - Exact cookie name
    /// * `value` - Raw value, percent-encoded before writing
    /// * `days` - Lifetime; zero or negative expires the cookie at once, very
    ///   large values are capped at year 9999
    /// * `options` - Path, domain, `secure` and same-site attributes
    pub fn set(&self, name: &str, value: &str, days: i64, options: &CookieOptions) {
        let expires = expiry_after(days);
        let mut assignment = format!(
            "{}={}; expires={}; path={}",
            name,
            urlencoding::encode(value),
            expires.format(HTTP_DATE_FORMAT),
            options.path()
        );

        if let Some(domain) = &options.domain {
            assignment.push_str(&format!("; domain={}", domain));
        }
        if options.secure || self.secure_transport {
            assignment.push_str("; secure");
        }
        assignment.push_str(&format!(
            "; samesite={}",
            options.same_site.unwrap_or_default()
        ));

        self.jar.write(&assignment);
    }

    /// Reads a cookie by exact name
    ///
    /// # Returns
    ///
    /// The decoded value, or `None` when no cookie has exactly that name.
    /// A value with a malformed escape comes back undecoded.
    pub fn get(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.jar
            .cookie_header()
            .split(';')
            .map(|segment| segment.trim_start_matches(' '))
            .find_map(|segment| segment.strip_prefix(prefix.as_str()))
            .map(decode_value)
    }

    /// Expires a cookie at the given path/domain
    ///
    /// Path and domain must match the ones used when the cookie was set,
    /// otherwise nothing is removed.
    pub fn delete(&self, name: &str, options: &CookieOptions) {
        let mut assignment = format!(
            "{}=; expires={}; path={}",
            name,
            DateTime::<Utc>::UNIX_EPOCH.format(HTTP_DATE_FORMAT),
            options.path()
        );
        if let Some(domain) = &options.domain {
            assignment.push_str(&format!("; domain={}", domain));
        }
        self.jar.write(&assignment);
    }

    /// Checks whether a cookie named exactly `name` is present
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parses every cookie into a name to value map
    pub fn get_all(&self) -> HashMap<String, String> {
        self.jar
            .cookie_header()
            .split(';')
            .filter_map(|segment| segment.split_once('='))
            .map(|(name, value)| (name.trim().to_string(), decode_value(value)))
            .collect()
    }
}

fn decode_value(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
