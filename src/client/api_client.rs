//! Request/response pipeline
//!
//! Every outbound call goes through [`ApiClient::send`]: the credential is
//! resolved and attached first, and failures are classified into
//! [`ApiError`] afterwards. A 401 tears the session down before the error is
//! returned.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::{ApiError, UNAUTHORIZED_MESSAGE};
use super::navigator::Navigator;
use super::session::SessionTeardown;
use crate::auth::CredentialResolver;
use crate::config::AccessConfig;
use crate::security::redact_url;

/// Settings the pipeline is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL request paths are joined onto
    pub base_url: String,
    /// Upper bound for one request, connect through body
    pub timeout: Duration,
    /// Where session teardown navigates to
    pub root_path: String,
    /// Pages that session teardown never navigates away from
    pub auth_entry_paths: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&AccessConfig::default())
    }
}

impl From<&AccessConfig> for ClientConfig {
    fn from(config: &AccessConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout: config.timeout(),
            root_path: config.root_path.clone(),
            auth_entry_paths: config.auth_entry_paths.clone(),
        }
    }
}

impl ClientConfig {
    /// Default settings against `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Overrides the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A request to send through the pipeline
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    cancel: Option<CancellationToken>,
}

impl ApiRequest {
    /// Creates a request without a body
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `path` - Path relative to the base URL, or an absolute URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            cancel: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets a JSON body
    ///
    /// # Returns
    ///
    /// `ApiError::InvalidRequest` if `body` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Lets the caller abort the request; aborting yields [`ApiError::Cancelled`]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// HTTP method of this request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path or absolute URL as given
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A successful response, untouched by the pipeline
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::warn!("Undecodable response body ({}): {}", self.status, e);
            ApiError::InvalidResponse { status: self.status }
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Authenticated HTTP client
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use studio_access::auth::{CookieStore, CredentialResolver, LegacyTokenStore, MemoryCookieJar};
/// use studio_access::client::{ApiClient, ApiRequest, ClientConfig, MemoryNavigator};
/// use studio_access::storage::MemoryLocalStore;
///
/// # async fn run() -> Result<(), studio_access::client::ApiError> {
/// let cookies = CookieStore::new(Arc::new(MemoryCookieJar::new()), true);
/// let legacy = LegacyTokenStore::new(cookies, Arc::new(MemoryLocalStore::new()));
/// let client = ApiClient::new(
///     ClientConfig::with_base_url("https://api.example.com"),
///     CredentialResolver::legacy_only(legacy),
///     Arc::new(MemoryNavigator::new("/dashboard")),
/// )?;
///
/// let projects: serde_json::Value = client.send(ApiRequest::get("/projects")).await?.json()?;
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    resolver: Arc<CredentialResolver>,
    session: SessionTeardown,
}

impl ApiClient {
    /// Builds the client; fails only if the HTTP stack cannot be initialized
    pub fn new(
        config: ClientConfig,
        resolver: CredentialResolver,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        let session = SessionTeardown::new(
            resolver.legacy_store().clone(),
            navigator,
            config.root_path.clone(),
            config.auth_entry_paths.clone(),
        );

        Ok(Self {
            http,
            config,
            resolver: Arc::new(resolver),
            session,
        })
    }

    /// Settings this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// Joins `path` onto the base URL; absolute URLs are used as-is
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Sends a request through the pipeline
    ///
    /// Attaches the resolved credential, then classifies the outcome. A 401
    /// purges the legacy token and may redirect before the error returns.
    ///
    /// # Arguments
    ///
    /// * `request` - The request; its cancellation token, if any, aborts it
    ///
    /// # Returns
    ///
    /// The response for any 2xx status, otherwise exactly one [`ApiError`]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let ApiRequest {
            method,
            path,
            body,
            cancel,
        } = request;
        let url = self.url_for(&path);
        tracing::debug!("{} {}", method, redact_url(&url));

        let exchange = self.exchange(method.clone(), &url, body);
        let result = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("{} {} cancelled by caller", method, redact_url(&url));
                    return Err(ApiError::Cancelled);
                }
                result = exchange => result,
            },
            None => exchange.await,
        };

        let response = result.map_err(|e| Self::transport_error(&url, e))?;
        if response.is_success() {
            return Ok(response);
        }

        Err(self.classify(&url, response))
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// POST a JSON body to `path` and decode the JSON reply
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// PUT a JSON body to `path` and decode the JSON reply
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// DELETE `path`, returning the raw response
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::delete(path)).await
    }

    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, reqwest::Error> {
        let mut builder = self.http.request(method, url);

        if let Some(credential) = self.resolver.resolve().await {
            builder = builder.header(AUTHORIZATION, credential.bearer_header());
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn transport_error(url: &str, e: reqwest::Error) -> ApiError {
        if e.is_builder() {
            return ApiError::InvalidRequest(e.to_string());
        }
        let timed_out = e.is_timeout();
        tracing::warn!(
            "Request to {} failed ({}): {}",
            redact_url(url),
            if timed_out { "timeout" } else { "network" },
            e
        );
        ApiError::Connection {
            timed_out,
            source: e,
        }
    }

    fn classify(&self, url: &str, response: ApiResponse) -> ApiError {
        let status = response.status;
        tracing::warn!("Request to {} failed with {}", redact_url(url), status);

        match status {
            StatusCode::UNAUTHORIZED => {
                self.session.run();
                let message = parse_body(&response.body)
                    .as_ref()
                    .and_then(server_message)
                    .unwrap_or_else(|| UNAUTHORIZED_MESSAGE.to_string());
                ApiError::Unauthorized { message }
            }
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                retry_after: response
                    .headers
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok()),
            },
            status => match parse_body(&response.body) {
                Some(body) => ApiError::Status {
                    status,
                    message: server_message(&body).unwrap_or_else(|| fallback_message(status)),
                    body,
                },
                None => ApiError::InvalidResponse { status },
            },
        }
    }
}

fn parse_body(body: &str) -> Option<Value> {
    serde_json::from_str::<Value>(body)
        .ok()
        .filter(|value| !value.is_null())
}

fn server_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

fn fallback_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Request failed: {}", reason),
        None => format!("Request failed with status {}", status.as_u16()),
    }
}
