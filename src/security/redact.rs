//! Redaction helpers for log output
//!
//! Bearer tokens and request URLs pass through here before they reach a
//! `tracing` macro, so credentials never end up in logs verbatim.

/// Redacts a bearer token, keeping only the last 4 characters
///
/// # Examples
///
/// ```
/// use studio_access::security::redact_token;
///
/// assert_eq!(redact_token("eyJhbGciOiJSUzI1NiJ9.payload.sig"), "***.sig");
/// assert_eq!(redact_token("abc"), "****");
/// ```
pub fn redact_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***{}", tail)
    } else {
        "****".to_string()
    }
}

/// Strips query string and fragment from a URL
///
/// ```
/// use studio_access::security::redact_url;
///
/// assert_eq!(
///     redact_url("https://api.example.com/tiktok/callback?code=secret#top"),
///     "https://api.example.com/tiktok/callback"
/// );
/// ```
pub fn redact_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
