use std::path::PathBuf;
use std::sync::Arc;

use linkrelay_core::config::load_config;
use linkrelay_core::proxy::{ProxyServer, RelayProxy, UpstreamClient};

pub async fn run(
    config_path: Option<PathBuf>,
    port_override: Option<u16>,
    prefix_override: Option<String>,
) -> anyhow::Result<()> {
    // Load configuration
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(prefix) = prefix_override {
        config.proxy.prefix = prefix;
    }

    let proxy_config = config.proxy.to_proxy_config();
    let host = config.server.get_bind_address().to_string();

    tracing::info!("Starting linkrelay...");
    tracing::info!("  Port: {}", config.server.port);
    tracing::info!("  Host: {}", host);
    tracing::info!("  Prefix: {}", proxy_config.prefix());
    tracing::info!("  Codec: {}", proxy_config.codec_kind());
    if config.control.enabled {
        tracing::info!("  Control endpoint: POST {}", config.control.path);
    }

    let transport = Arc::new(UpstreamClient::new(&config.upstream)?);
    let proxy = Arc::new(RelayProxy::new(proxy_config, transport));

    let server = ProxyServer::new(host.clone(), config.server.port, proxy, config.control.clone());

    tracing::info!("Relay starting on http://{}:{}", host, config.server.port);
    tracing::info!("Press Ctrl+C to stop");

    // Run server (blocks until shutdown)
    server.run().await?;

    Ok(())
}
