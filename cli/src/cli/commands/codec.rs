use std::path::PathBuf;

use linkrelay_core::config::load_config;
use linkrelay_core::proxy::codec::decode_with_fallback;
use linkrelay_core::proxy::{CodecKind, ProxyConfig};

fn proxy_config(config_path: Option<PathBuf>, codec: Option<CodecKind>) -> anyhow::Result<ProxyConfig> {
    let config = load_config(config_path)?;
    let mut proxy = config.proxy;
    if let Some(kind) = codec {
        proxy.codec = kind;
    }
    Ok(proxy.to_proxy_config())
}

pub fn encode(config_path: Option<PathBuf>, url: &str, codec: Option<CodecKind>) -> anyhow::Result<()> {
    let config = proxy_config(config_path, codec)?;

    println!("Token: {}", config.codec().encode(url));
    println!("Path:  {}", config.path_link(url));
    println!("Query: {}", config.query_link(url));
    Ok(())
}

pub fn decode(config_path: Option<PathBuf>, token: &str, codec: Option<CodecKind>) -> anyhow::Result<()> {
    let config = proxy_config(config_path, codec)?;

    let url = decode_with_fallback(config.codec(), token)
        .map_err(|e| anyhow::anyhow!("{} token could not be decoded: {}", config.codec_kind(), e))?;
    println!("{}", url);
    Ok(())
}
