//! Outbound request construction
//! Derives method, headers and body for the upstream call from the inbound
//! request. Client credentials never cross this boundary.

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::proxy::config::ProxyConfig;
use crate::proxy::error::BuildError;

/// Names the real method of a POST-tunneled request
pub const METHOD_OVERRIDE_HEADER: &str = "x-linkrelay-method";

/// Inbound headers copied to the upstream request. Nothing else is forwarded.
pub const FORWARDED_HEADERS: [HeaderName; 6] = [
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::USER_AGENT,
    header::CONTENT_TYPE,
    header::REFERER,
    header::ORIGIN,
];

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Transport follows redirects and returns the final response
    Follow,
    /// 3xx responses are relayed to the caller as-is
    Manual,
}

/// Ambient credentials attached to the outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    #[default]
    Omit,
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub redirect: RedirectMode,
    pub credentials: CredentialMode,
}

pub struct RequestBuilder<'a> {
    config: &'a ProxyConfig,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a ProxyConfig) -> Self {
        Self { config }
    }

    pub async fn build(&self, request: Request, target: Url) -> Result<OutboundRequest, BuildError> {
        let (parts, body) = request.into_parts();

        let tunneled = if parts.method == Method::POST {
            parts
                .headers
                .get(METHOD_OVERRIDE_HEADER)
                .filter(|value| !value.is_empty())
        } else {
            None
        };

        let (method, headers, body) = if let Some(value) = tunneled {
            let method = parse_override(value)?;
            let bytes = self.read_body(body).await?;
            let content_type = parts
                .headers
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, content_type);
            (method, headers, non_empty(bytes))
        } else if is_passthrough(&parts.method) {
            let headers = forward_headers(&parts.headers);
            let body = if parts.method == Method::PUT || parts.method == Method::DELETE {
                match self.read_body(body).await {
                    Ok(bytes) => non_empty(bytes),
                    Err(e) => {
                        debug!("Dropping unreadable {} body: {}", parts.method, e);
                        None
                    }
                }
            } else {
                None
            };
            (parts.method, headers, body)
        } else {
            (parts.method, HeaderMap::new(), None)
        };

        let redirect = if self.config.follow_redirects {
            RedirectMode::Follow
        } else {
            RedirectMode::Manual
        };

        Ok(OutboundRequest {
            method,
            url: target,
            headers,
            body,
            redirect,
            credentials: CredentialMode::Omit,
        })
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, BuildError> {
        axum::body::to_bytes(body, self.config.max_body_bytes)
            .await
            .map_err(|e| BuildError::BodyRead(e.to_string()))
    }
}

fn is_passthrough(method: &Method) -> bool {
    *method == Method::GET
        || *method == Method::HEAD
        || *method == Method::DELETE
        || *method == Method::PUT
}

fn parse_override(value: &HeaderValue) -> Result<Method, BuildError> {
    let raw = value
        .to_str()
        .map_err(|_| BuildError::InvalidMethod(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
    let upper = raw.trim().to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes()).map_err(|_| BuildError::InvalidMethod(upper))
}

/// Allow-listed subset of `inbound`
pub fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in FORWARDED_HEADERS.iter() {
        for value in inbound.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn non_empty(bytes: Bytes) -> Option<Bytes> {
    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::codec::CodecKind;

    fn target() -> Url {
        Url::parse("https://example.com/api/items/1").unwrap()
    }

    fn request(method: &str, headers: &[(&str, &str)], body: &'static str) -> Request {
        let mut builder = Request::builder().method(method).uri("/uv/token");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn build(config: &ProxyConfig, request: Request) -> Result<OutboundRequest, BuildError> {
        RequestBuilder::new(config).build(request, target()).await
    }

    #[tokio::test]
    async fn test_credentials_never_forwarded() {
        let config = ProxyConfig::default();
        let inbound = request(
            "GET",
            &[
                ("cookie", "session=secret"),
                ("authorization", "Bearer secret"),
                ("proxy-authorization", "Basic c2VjcmV0"),
                ("x-forwarded-for", "10.0.0.1"),
                ("host", "proxy.local"),
                ("accept", "text/html"),
                ("accept-language", "en-US"),
                ("user-agent", "test-agent"),
                ("referer", "https://proxy.local/"),
                ("origin", "https://proxy.local"),
            ],
            "",
        );

        let out = build(&config, inbound).await.unwrap();
        assert_eq!(out.method, Method::GET);
        assert!(out.headers.get(header::COOKIE).is_none());
        assert!(out.headers.get(header::AUTHORIZATION).is_none());
        assert!(out.headers.get(header::PROXY_AUTHORIZATION).is_none());
        assert!(out.headers.get("x-forwarded-for").is_none());
        assert!(out.headers.get(header::HOST).is_none());
        assert_eq!(out.headers.len(), 5);
        assert_eq!(out.headers[header::ACCEPT], "text/html");
        assert_eq!(out.credentials, CredentialMode::Omit);
        assert!(out.body.is_none());
    }

    #[tokio::test]
    async fn test_method_tunneling_forwards_body() {
        let config = ProxyConfig::default();
        let inbound = request(
            "POST",
            &[
                (METHOD_OVERRIDE_HEADER, "put"),
                ("content-type", "application/json"),
                ("cookie", "session=secret"),
                ("accept", "application/json"),
            ],
            r#"{"name":"widget"}"#,
        );

        let out = build(&config, inbound).await.unwrap();
        assert_eq!(out.method, Method::PUT);
        assert_eq!(out.body.as_deref(), Some(br#"{"name":"widget"}"#.as_slice()));
        assert_eq!(out.headers.len(), 1);
        assert_eq!(out.headers[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_tunneling_defaults_content_type_and_drops_empty_body() {
        let config = ProxyConfig::default();
        let out = build(&config, request("POST", &[(METHOD_OVERRIDE_HEADER, "DELETE")], ""))
            .await
            .unwrap();
        assert_eq!(out.method, Method::DELETE);
        assert_eq!(out.headers[header::CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert!(out.body.is_none());
    }

    #[tokio::test]
    async fn test_override_ignored_on_non_post() {
        let config = ProxyConfig::default();
        let out = build(&config, request("GET", &[(METHOD_OVERRIDE_HEADER, "DELETE")], ""))
            .await
            .unwrap();
        assert_eq!(out.method, Method::GET);
    }

    #[tokio::test]
    async fn test_invalid_override_fails() {
        let config = ProxyConfig::default();
        let err = build(&config, request("POST", &[(METHOD_OVERRIDE_HEADER, "B@D")], ""))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidMethod(m) if m == "B@D"));
    }

    #[tokio::test]
    async fn test_tunneled_body_over_limit_fails() {
        let mut config = ProxyConfig::default();
        config.max_body_bytes = 4;
        let err = build(&config, request("POST", &[(METHOD_OVERRIDE_HEADER, "PATCH")], "too large"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::BodyRead(_)));
    }

    #[tokio::test]
    async fn test_put_and_delete_bodies() {
        let config = ProxyConfig::default();

        let put = build(&config, request("PUT", &[("content-type", "text/plain")], "data"))
            .await
            .unwrap();
        assert_eq!(put.method, Method::PUT);
        assert_eq!(put.body.as_deref(), Some(b"data".as_slice()));
        assert_eq!(put.headers[header::CONTENT_TYPE], "text/plain");

        let delete = build(&config, request("DELETE", &[], "")).await.unwrap();
        assert_eq!(delete.method, Method::DELETE);
        assert!(delete.body.is_none());
    }

    #[tokio::test]
    async fn test_oversized_put_body_is_dropped_not_fatal() {
        let mut config = ProxyConfig::default();
        config.max_body_bytes = 2;
        let put = build(&config, request("PUT", &[], "abcdef")).await.unwrap();
        assert_eq!(put.method, Method::PUT);
        assert!(put.body.is_none());
    }

    #[tokio::test]
    async fn test_get_body_is_not_forwarded() {
        let config = ProxyConfig::default();
        let out = build(&config, request("GET", &[], "ignored")).await.unwrap();
        assert!(out.body.is_none());
    }

    #[tokio::test]
    async fn test_other_methods_fall_back_to_empty_headers() {
        let config = ProxyConfig::default();
        for method in ["POST", "PATCH", "OPTIONS"] {
            let out = build(&config, request(method, &[("accept", "*/*"), ("cookie", "a=b")], "body"))
                .await
                .unwrap();
            assert_eq!(out.method.as_str(), method);
            assert!(out.headers.is_empty());
            assert!(out.body.is_none());
        }
    }

    #[tokio::test]
    async fn test_redirect_mode_follows_config() {
        let mut config = ProxyConfig::new("/uv/", CodecKind::Base64);
        let out = build(&config, request("GET", &[], "")).await.unwrap();
        assert_eq!(out.redirect, RedirectMode::Follow);

        config.follow_redirects = false;
        let out = build(&config, request("GET", &[], "")).await.unwrap();
        assert_eq!(out.redirect, RedirectMode::Manual);
        assert_eq!(out.url, target());
    }
}
