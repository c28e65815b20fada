//! Security module - Redaction of secrets before they reach the logs

mod redact;

pub use redact::{redact_token, redact_url};
