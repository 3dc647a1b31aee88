//! Target extraction
//! Recovers the absolute target URL from a path-style or query-style link.

use std::borrow::Cow;

use axum::http::Uri;
use url::Url;

use crate::proxy::codec::decode_with_fallback;
use crate::proxy::config::ProxyConfig;
use crate::proxy::error::ProxyError;
use crate::proxy::router::{query_param, TARGET_PARAM};

pub struct TargetExtractor<'a> {
    config: &'a ProxyConfig,
}

impl<'a> TargetExtractor<'a> {
    pub fn new(config: &'a ProxyConfig) -> Self {
        Self { config }
    }

    /// Locate the token in `uri` and decode it.
    ///
    /// A path token is used as written; a query token is form-decoded first.
    /// An empty token, or one that decodes to an empty string, counts as no
    /// target at all.
    pub fn extract(&self, uri: &Uri) -> Result<String, ProxyError> {
        let token = self.token(uri).filter(|t| !t.is_empty()).ok_or(ProxyError::NoTargetFound)?;
        let decoded = decode_with_fallback(self.config.codec(), &token)?;
        if decoded.is_empty() {
            return Err(ProxyError::NoTargetFound);
        }
        Ok(decoded)
    }

    fn token<'u>(&self, uri: &'u Uri) -> Option<Cow<'u, str>> {
        match uri.path().strip_prefix(self.config.prefix()) {
            Some(rest) if !rest.is_empty() => Some(Cow::Borrowed(rest)),
            _ => query_param(uri, TARGET_PARAM),
        }
    }
}

/// Parse a decoded target. Only absolute `http`/`https` URLs are relayed.
pub fn parse_target(decoded: &str) -> Result<Url, ProxyError> {
    let invalid = |reason: String| ProxyError::InvalidTargetUrl {
        target: decoded.to_string(),
        reason,
    };
    let url = Url::parse(decoded).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
