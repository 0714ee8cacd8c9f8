use shared::error::{ApiException, ErrorCode};
use thiserror::Error;

use crate::credentials::CredentialsError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("credentials unavailable: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("invalid API base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpSetup(#[source] reqwest::Error),
    #[error("authentication rejected: {0}")]
    Unauthorized(String),
    #[error("API error: {0}")]
    Api(#[from] ApiException),
    #[error("failed to reach {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// True when the failure means there is no usable session: bad or
    /// missing credentials, or the server refusing the key.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Credentials(_) | Self::Unauthorized(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn api_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api(exception) => Some(exception.code),
            _ => None,
        }
    }
}
