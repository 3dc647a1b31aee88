use std::path::PathBuf;

use linkrelay_core::config::{default_config_path, load_config};

pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let proxy = config.proxy.to_proxy_config();

    println!("linkrelay status");
    println!("================");
    println!();
    println!("Configuration:");
    println!("  Default config file: {:?}", default_config_path());
    println!();
    println!("Server settings:");
    println!("  Host: {}", config.server.get_bind_address());
    println!("  Port: {}", config.server.port);
    println!();
    println!("Relay settings:");
    println!("  Prefix: {}", proxy.prefix());
    println!("  Codec: {}", proxy.codec_kind());
    println!("  Follow redirects: {}", proxy.follow_redirects);
    println!("  Relay cookies: {}", proxy.relay_cookies);
    if config.control.enabled {
        println!("  Control endpoint: POST {}", config.control.path);
    } else {
        println!("  Control endpoint: disabled");
    }

    // Check if server is reachable
    println!();
    let host = match config.server.get_bind_address() {
        "0.0.0.0" => "127.0.0.1",
        other => other,
    };
    let url = format!("http://{}:{}/healthz", host, config.server.port);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("Server: RUNNING ✓");
        }
        _ => {
            println!("Server: NOT RUNNING");
        }
    }

    Ok(())
}
