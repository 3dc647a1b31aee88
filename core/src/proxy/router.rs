//! Interception predicate
//! Called for every inbound request, so it must stay cheap and side-effect free.

use std::borrow::Cow;

use axum::http::Uri;

use crate::proxy::config::ProxyConfig;

/// Query parameter carrying the token in query-style links
pub const TARGET_PARAM: &str = "u";

pub struct RouteMatcher<'a> {
    config: &'a ProxyConfig,
}

impl<'a> RouteMatcher<'a> {
    pub fn new(config: &'a ProxyConfig) -> Self {
        Self { config }
    }

    pub fn matches(&self, uri: &Uri) -> bool {
        let path = uri.path();
        if path.starts_with(self.config.prefix()) {
            return true;
        }
        path == self.config.bare_prefix() && query_param(uri, TARGET_PARAM).is_some()
    }
}

/// Form-decoded value of the first `name` parameter in the query, if present.
pub fn query_param<'u>(uri: &'u Uri, name: &str) -> Option<Cow<'u, str>> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}
