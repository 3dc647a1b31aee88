//! Scripted transport for unit tests

use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use tokio::sync::oneshot;

use crate::proxy::error::TransportError;
use crate::proxy::request::OutboundRequest;
use crate::proxy::transport::{BoxError, Transport, UpstreamResponse};

/// Replies with a fixed status, headers and chunk list. When gated, only the
/// first chunk is released until the paired sender fires. When held, `send`
/// itself does not resolve until released.
pub struct MockTransport {
    status: StatusCode,
    headers: HeaderMap,
    chunks: Vec<&'static str>,
    failure: Option<&'static str>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            chunks: vec![body],
            failure: None,
            gate: Mutex::new(None),
            hold: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::ok("")
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .append(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    pub fn with_chunks(mut self, chunks: &[&'static str]) -> Self {
        self.chunks = chunks.to_vec();
        self
    }

    pub fn gated(self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn held(self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn last_request(&self) -> Option<OutboundRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        if let Some(message) = self.failure {
            return Err(TransportError::Connect(message.to_string()));
        }

        let chunks = self.chunks.clone();
        let gate = self.gate.lock().unwrap().take();
        let body = async_stream::stream! {
            let mut chunks = chunks.into_iter();
            if let Some(first) = chunks.next() {
                yield Ok::<Bytes, BoxError>(Bytes::from_static(first.as_bytes()));
            }
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            for chunk in chunks {
                yield Ok(Bytes::from_static(chunk.as_bytes()));
            }
        };

        Ok(UpstreamResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Box::pin(body),
        })
    }
}
