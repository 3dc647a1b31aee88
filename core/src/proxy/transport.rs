//! Outbound transport seam
//! The relay only sees this trait; the reqwest client in `upstream` is the
//! production implementation and tests plug in scripted ones.

use std::pin::Pin;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures::Stream;

use crate::proxy::error::TransportError;
use crate::proxy::request::OutboundRequest;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Upstream body, yielded chunk by chunk as the transport receives it
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the outbound call. Resolves once the status line and headers
    /// are in; the body keeps streaming through [`UpstreamResponse::body`].
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError>;
}
