//! Runtime proxy configuration
//! Immutable snapshot shared by in-flight requests; replaced wholesale on update.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::proxy::codec::{CodecKind, UrlCodec};

pub const DEFAULT_PREFIX: &str = "/relay/";
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024; // 100MB

#[derive(Clone)]
pub struct ProxyConfig {
    prefix: String,
    codec_kind: CodecKind,
    codec: Arc<dyn UrlCodec>,
    pub follow_redirects: bool,
    pub relay_cookies: bool,
    pub max_body_bytes: usize,
}

impl ProxyConfig {
    pub fn new(prefix: &str, codec_kind: CodecKind) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            codec_kind,
            codec: codec_kind.build(),
            follow_redirects: true,
            relay_cookies: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Install a codec that is not one of the named [`CodecKind`]s.
    /// `codec_kind` keeps reporting the previous named codec.
    pub fn with_codec(mut self, codec: Arc<dyn UrlCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix without its trailing slash, the path used by query-style links.
    pub fn bare_prefix(&self) -> &str {
        self.prefix.strip_suffix('/').unwrap_or(&self.prefix)
    }

    pub fn codec(&self) -> &dyn UrlCodec {
        self.codec.as_ref()
    }

    pub fn codec_kind(&self) -> CodecKind {
        self.codec_kind
    }

    /// Path-style link for `url`: `<prefix><token>`
    pub fn path_link(&self, url: &str) -> String {
        format!("{}{}", self.prefix, self.codec.encode(url))
    }

    /// Query-style link for `url`: `<prefix-without-slash>?u=<token>`, with the
    /// token escaped as a query value.
    pub fn query_link(&self, url: &str) -> String {
        let token = self.codec.encode(url);
        format!("{}?u={}", self.bare_prefix(), urlencoding::encode(&token))
    }

    /// Copy of `self` with the fields present in `update` applied.
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(prefix) = &update.prefix {
            next.prefix = normalize_prefix(prefix);
        }
        if let Some(kind) = update.codec {
            next.codec_kind = kind;
            next.codec = kind.build();
        }
        if let Some(follow) = update.follow_redirects {
            next.follow_redirects = follow;
        }
        if let Some(relay) = update.relay_cookies {
            next.relay_cookies = relay;
        }
        if let Some(max) = update.max_body_bytes {
            next.max_body_bytes = max;
        }
        next
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, CodecKind::default())
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("prefix", &self.prefix)
            .field("codec", &self.codec.name())
            .field("follow_redirects", &self.follow_redirects)
            .field("relay_cookies", &self.relay_cookies)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Ensure a leading and trailing `/`. Empty input yields the default prefix.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return DEFAULT_PREFIX.to_string();
    }
    let mut normalized = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(trimmed);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Partial configuration carried by a runtime reconfiguration message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<CodecKind>,
    #[serde(default, alias = "follow_redirects", skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
    #[serde(default, alias = "relay_cookies", skip_serializing_if = "Option::is_none")]
    pub relay_cookies: Option<bool>,
    #[serde(default, alias = "max_body_bytes", skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,
}

/// `{ "configUpdate": { ... } }`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMessage {
    #[serde(alias = "config_update")]
    pub config_update: ConfigUpdate,
}

/// Acknowledgment returned for a reconfiguration message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConfigAck {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}
