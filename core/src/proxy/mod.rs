//! Proxy module - URL-rewriting relay engine and its axum host

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod relay;
pub mod request;
pub mod router;
pub mod server;
pub mod transport;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testutil;

pub use codec::{CodecKind, DecodeError, UrlCodec};
pub use config::{ConfigAck, ConfigUpdate, ProxyConfig};
pub use engine::{RelayProxy, Stage};
pub use error::{BuildError, ProxyError, TransportError};
pub use hooks::ProxyHooks;
pub use server::ProxyServer;
pub use transport::Transport;
pub use upstream::UpstreamClient;
