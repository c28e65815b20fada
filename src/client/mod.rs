//! Client module - The authenticated request/response pipeline
//!
//! - [`ApiClient`]: credential injection and failure classification
//! - [`ApiError`]: normalized, user-facing failures
//! - [`SessionTeardown`]: forced logout on 401
//! - [`Navigator`]: the navigation boundary teardown redirects through

mod api_client;
mod error;
mod navigator;
mod session;

pub use api_client::{ApiClient, ApiRequest, ApiResponse, ClientConfig};
pub use error::{
    ApiError, CONNECTION_MESSAGE, INVALID_RESPONSE_MESSAGE, RATE_LIMITED_MESSAGE, UNAUTHORIZED_MESSAGE,
};
pub use navigator::{MemoryNavigator, Navigator};
pub use session::SessionTeardown;

pub use tokio_util::sync::CancellationToken;
