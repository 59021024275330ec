//! Forwarding pipeline errors and their client-visible status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a request did not reach the streaming stage.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Destination could not be decoded from the request target.
    #[error("unresolvable target")]
    Unresolvable,

    /// Destination is not on the allow-list.
    #[error("target not allowed: {0}")]
    Disallowed(String),

    #[error("failed to connect to upstream {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to upstream {0} timed out")]
    ConnectTimeout(String),

    #[error("upstream handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] hyper::Error),

    #[error("upstream did not respond within {0} seconds")]
    ResponseTimeout(u64),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Unresolvable and disallowed are deliberately indistinguishable.
            ProxyError::Unresolvable | ProxyError::Disallowed(_) => StatusCode::FORBIDDEN,
            ProxyError::Connect { .. } | ProxyError::Handshake(_) | ProxyError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::ConnectTimeout(_) | ProxyError::ResponseTimeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
        }
    }

    /// Client-side rejections as opposed to upstream failures.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProxyError::Unresolvable | ProxyError::Disallowed(_))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
