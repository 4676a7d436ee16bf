//! Client library for the upstream DIY print API.
//!
//! Provides upload request signing, bearer-token normalization, and the
//! HTTP transport (generic JSON proxy + multipart artwork upload).

pub mod api;
pub mod sign;
pub mod token;

pub use api::{ApiResponse, DiyClient, ProxyRequest, UploadRequest};
pub use sign::{upload_sign, Signer};
pub use token::{bearer_header, normalize_token};

/// Unified error type for the diy-client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for diy-client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
