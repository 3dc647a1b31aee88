//! Response relay
//! Performs the outbound call and hands the upstream body back as a live
//! stream. Only headers are touched; bytes pass through unmodified.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;

use crate::proxy::config::ProxyConfig;
use crate::proxy::error::ProxyError;
use crate::proxy::request::OutboundRequest;
use crate::proxy::transport::Transport;

pub const MARKER_HEADER: &str = "x-linkrelay-proxied-by";
pub const MARKER_VALUE: &str = concat!("linkrelay/", env!("CARGO_PKG_VERSION"));

/// Rendering policies of the remote origin. They would otherwise be applied
/// to content served from the proxy's origin.
const ORIGIN_POLICY_HEADERS: [&str; 4] = [
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "x-content-type-options",
];

const COOKIE_HEADERS: [&str; 2] = ["set-cookie", "set-cookie2"];

const HOP_BY_HOP_HEADERS: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct ResponseRelay<'a> {
    config: &'a ProxyConfig,
    transport: &'a dyn Transport,
}

impl<'a> ResponseRelay<'a> {
    pub fn new(config: &'a ProxyConfig, transport: &'a dyn Transport) -> Self {
        Self { config, transport }
    }

    /// Send `outbound` and build the relayed response. The returned body
    /// yields upstream chunks as they arrive; dropping it drops the upstream
    /// stream and with it the connection.
    pub async fn relay(&self, outbound: OutboundRequest) -> Result<Response, ProxyError> {
        let upstream = self.transport.send(outbound).await?;

        let mut headers = upstream.headers;
        sanitize_response_headers(&mut headers, self.config.relay_cookies);

        let mut response = Response::new(Body::from_stream(upstream.body));
        *response.status_mut() = upstream.status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Strip origin policies, hop-by-hop headers and (unless `relay_cookies`)
/// cookie-setting headers, then stamp the proxy marker.
pub fn sanitize_response_headers(headers: &mut HeaderMap, relay_cookies: bool) {
    // Headers nominated by `Connection` are hop-by-hop as well.
    let nominated: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in nominated {
        headers.remove(name);
    }

    for name in ORIGIN_POLICY_HEADERS.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(*name);
    }
    if !relay_cookies {
        for name in COOKIE_HEADERS {
            headers.remove(name);
        }
    }
    headers.insert(MARKER_HEADER, HeaderValue::from_static(MARKER_VALUE));
}
