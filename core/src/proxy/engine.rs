//! Relay proxy facade
//! Runs each request through extract -> build -> relay against one
//! configuration snapshot.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use crate::proxy::config::{ConfigAck, ConfigMessage, ConfigUpdate, ProxyConfig};
use crate::proxy::error::ProxyError;
use crate::proxy::extract::{parse_target, TargetExtractor};
use crate::proxy::hooks::ProxyHooks;
use crate::proxy::relay::ResponseRelay;
use crate::proxy::request::RequestBuilder;
use crate::proxy::router::RouteMatcher;
use crate::proxy::transport::Transport;

/// Per-request lifecycle. Failures jump straight to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Matched,
    Extracting,
    Building,
    Relaying,
    Completed,
}

impl Stage {
    /// Stage in which `err` can arise
    pub fn of_error(err: &ProxyError) -> Self {
        match err {
            ProxyError::NoTargetFound
            | ProxyError::CorruptToken(_)
            | ProxyError::InvalidTargetUrl { .. } => Self::Extracting,
            ProxyError::RequestBuild(_) => Self::Building,
            ProxyError::RelayNetwork(_) => Self::Relaying,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Matched => "matched",
            Self::Extracting => "extracting",
            Self::Building => "building",
            Self::Relaying => "relaying",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

pub struct RelayProxy {
    config: ArcSwap<ProxyConfig>,
    transport: Arc<dyn Transport>,
    active: AtomicBool,
}

impl RelayProxy {
    pub fn new(config: ProxyConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            transport,
            active: AtomicBool::new(false),
        }
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<ProxyConfig> {
        self.config.load_full()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Merge `update` into the active configuration and swap it in.
    /// Requests already in flight keep the snapshot they started with.
    pub fn apply_update(&self, update: &ConfigUpdate) -> Arc<ProxyConfig> {
        self.config.rcu(|current| current.merged(update));
        self.config.load_full()
    }

    pub fn route(&self, request: &Request) -> bool {
        self.is_active() && RouteMatcher::new(&self.config.load()).matches(request.uri())
    }

    pub async fn handle(&self, request: Request) -> Response {
        let config = self.config.load_full();
        let trace_id = trace_id();
        let method = request.method().clone();
        let started = Instant::now();
        advance(&trace_id, Stage::Idle, Stage::Matched);

        match self.process(&config, request, &trace_id).await {
            Ok(response) => {
                info!(
                    "[{}] {} relayed | Status: {} | {}ms",
                    trace_id,
                    method,
                    response.status().as_u16(),
                    started.elapsed().as_millis()
                );
                advance(&trace_id, Stage::Relaying, Stage::Completed);
                response
            }
            Err(err) => {
                warn!(
                    "[{}] {} failed while {} ({}): {}",
                    trace_id,
                    method,
                    Stage::of_error(&err),
                    err.code(),
                    err
                );
                advance(&trace_id, Stage::of_error(&err), Stage::Completed);
                err.into_response()
            }
        }
    }

    async fn process(
        &self,
        config: &ProxyConfig,
        request: Request,
        trace_id: &str,
    ) -> Result<Response, ProxyError> {
        advance(trace_id, Stage::Matched, Stage::Extracting);
        let decoded = TargetExtractor::new(config).extract(request.uri())?;
        let target = parse_target(&decoded)?;
        debug!("[{}] Target: {}", trace_id, target);

        advance(trace_id, Stage::Extracting, Stage::Building);
        let outbound = RequestBuilder::new(config).build(request, target).await?;
        debug!(
            "[{}] Outbound {} | Redirect: {:?} | Body: {} bytes",
            trace_id,
            outbound.method,
            outbound.redirect,
            outbound.body.as_ref().map_or(0, |b| b.len())
        );

        advance(trace_id, Stage::Building, Stage::Relaying);
        ResponseRelay::new(config, self.transport.as_ref())
            .relay(outbound)
            .await
    }

    pub fn on_config_update(&self, message: serde_json::Value) -> ConfigAck {
        match serde_json::from_value::<ConfigMessage>(message) {
            Ok(message) => {
                let config = self.apply_update(&message.config_update);
                info!("Configuration updated: {:?}", config);
                ConfigAck::ok()
            }
            Err(e) => {
                warn!("Rejected configuration update: {}", e);
                ConfigAck::error(format!("invalid config update: {}", e))
            }
        }
    }
}

#[async_trait]
impl ProxyHooks for RelayProxy {
    fn on_install(&self) {
        self.active.store(false, Ordering::Release);
        let config = self.config();
        info!(
            "Relay installed | Prefix: {} | Codec: {} | Follow redirects: {} | Relay cookies: {}",
            config.prefix(),
            config.codec().name(),
            config.follow_redirects,
            config.relay_cookies
        );
    }

    fn on_activate(&self) {
        self.active.store(true, Ordering::Release);
        info!("Relay active, intercepting {}", self.config().prefix());
    }

    fn route(&self, request: &Request) -> bool {
        RelayProxy::route(self, request)
    }

    async fn handle(&self, request: Request) -> Response {
        RelayProxy::handle(self, request).await
    }

    fn on_config_update(&self, message: serde_json::Value) -> ConfigAck {
        RelayProxy::on_config_update(self, message)
    }
}

fn advance(trace_id: &str, from: Stage, to: Stage) {
    debug!("[{}] {} -> {}", trace_id, from, to);
}

fn trace_id() -> String {
    use rand::Rng;
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}
