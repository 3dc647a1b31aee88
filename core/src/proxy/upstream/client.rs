//! Upstream client for relaying requests to remote origins

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{redirect, Client};
use tokio::time::Duration;

use crate::config::UpstreamConfig;
use crate::proxy::error::TransportError;
use crate::proxy::request::{OutboundRequest, RedirectMode};
use crate::proxy::transport::{BoxError, Transport, UpstreamResponse};

/// reqwest-backed [`Transport`]. Holds one pooled client per redirect mode.
/// Neither client has a cookie store, so no ambient credentials are attached.
#[derive(Clone)]
pub struct UpstreamClient {
    following: Client,
    manual: Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        Ok(Self {
            following: Self::builder(config)
                .redirect(redirect::Policy::limited(config.max_redirects))
                .build()?,
            manual: Self::builder(config).redirect(redirect::Policy::none()).build()?,
        })
    }

    fn builder(config: &UpstreamConfig) -> reqwest::ClientBuilder {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));

        // Zero or unset means no total deadline; long downloads stream freely.
        if let Some(secs) = config.request_timeout.filter(|s| *s > 0) {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Some(proxy) = config.proxy_url.as_deref() {
            if !proxy.is_empty() {
                match reqwest::Proxy::all(proxy) {
                    Ok(p) => {
                        builder = builder.proxy(p);
                        tracing::info!("Using upstream proxy: {}", proxy);
                    }
                    Err(e) => tracing::warn!("Ignoring invalid upstream proxy {}: {}", proxy, e),
                }
            }
        }

        builder
    }

    fn client_for(&self, mode: RedirectMode) -> &Client {
        match mode {
            RedirectMode::Follow => &self.following,
            RedirectMode::Manual => &self.manual,
        }
    }
}

#[async_trait]
impl Transport for UpstreamClient {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let mut builder = self
            .client_for(request.redirect)
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::debug!("Upstream request failed: {}", e);
            TransportError::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| Box::new(e) as BoxError);

        Ok(UpstreamResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
