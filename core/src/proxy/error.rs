use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::proxy::codec::DecodeError;
use crate::proxy::relay::{MARKER_HEADER, MARKER_VALUE};

/// Failure while turning an inbound request into an outbound one
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid method override '{0}'")]
    InvalidMethod(String),

    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

/// Failure of the outbound call itself
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to upstream: {0}")]
    Connect(String),

    #[error("upstream timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing proxied URL")]
    NoTargetFound,

    #[error("Proxied URL token could not be decoded: {0}")]
    CorruptToken(#[from] DecodeError),

    #[error("Decoded target is not a valid URL: {target} ({reason})")]
    InvalidTargetUrl { target: String, reason: String },

    #[error("Failed to build remote request: {0}")]
    RequestBuild(#[from] BuildError),

    #[error("Proxy fetch error: {0}")]
    RelayNetwork(#[from] TransportError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoTargetFound | Self::CorruptToken(_) | Self::InvalidTargetUrl { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::RequestBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RelayNetwork(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable identifier, used in logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoTargetFound => "no_target_found",
            Self::CorruptToken(_) => "corrupt_token",
            Self::InvalidTargetUrl { .. } => "invalid_target_url",
            Self::RequestBuild(_) => "request_build_error",
            Self::RelayNetwork(_) => "relay_network_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, self.to_string()).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(MARKER_HEADER, HeaderValue::from_static(MARKER_VALUE));
        response
    }
}
