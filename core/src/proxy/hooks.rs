//! Host integration surface
//! The hosting adapter (see `server`) drives a proxy only through this trait.

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

use crate::proxy::config::ConfigAck;

#[async_trait]
pub trait ProxyHooks: Send + Sync {
    /// Called once before the instance is exposed to traffic.
    fn on_install(&self);

    /// Called when the host starts dispatching requests to this instance.
    fn on_activate(&self);

    /// Interception predicate, evaluated for every inbound request.
    fn route(&self, request: &Request) -> bool;

    /// Handle a request for which `route` returned true. Every failure is
    /// turned into a response.
    async fn handle(&self, request: Request) -> Response;

    /// Apply a `{ "configUpdate": { ... } }` message.
    fn on_config_update(&self, message: serde_json::Value) -> ConfigAck;
}
