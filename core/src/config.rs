use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::proxy::codec::CodecKind;
use crate::proxy::config::{ProxyConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_PREFIX};

/// Relay configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub proxy: ProxySection,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub allow_lan_access: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allow_lan_access: false,
        }
    }
}

impl ServerConfig {
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            &self.host
        }
    }
}

/// Interception and relay behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySection {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub codec: CodecKind,

    #[serde(default = "default_true")]
    pub follow_redirects: bool,

    #[serde(default)]
    pub relay_cookies: bool,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            codec: CodecKind::default(),
            follow_redirects: true,
            relay_cookies: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ProxySection {
    pub fn to_proxy_config(&self) -> ProxyConfig {
        let mut config = ProxyConfig::new(&self.prefix, self.codec);
        config.follow_redirects = self.follow_redirects;
        config.relay_cookies = self.relay_cookies;
        config.max_body_bytes = self.max_body_bytes;
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Total deadline per upstream request in seconds, body included
    #[serde(default)]
    pub request_timeout: Option<u64>,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: None,
            max_redirects: default_max_redirects(),
            proxy_url: None,
        }
    }
}

/// Runtime reconfiguration endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_control_path")]
    pub path: String,

    /// When set, updates must carry `Authorization: Bearer <key>` or `x-api-key`
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_control_path(),
            api_key: None,
        }
    }
}

// Default value functions
fn default_port() -> u16 { 8046 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_prefix() -> String { DEFAULT_PREFIX.to_string() }
fn default_true() -> bool { true }
fn default_max_body_bytes() -> usize { DEFAULT_MAX_BODY_BYTES }
fn default_connect_timeout() -> u64 { 20 }
fn default_max_redirects() -> usize { 10 }
fn default_control_path() -> String { "/__linkrelay/config".to_string() }

/// Get default config file path
/// Uses ~/.config/linkrelay/config.toml for Unix-like CLI experience
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("linkrelay")
        .join("config.toml")
}

/// Load config from file, or return defaults if not found.
///
/// Loading order:
/// 1. Specified path (if provided)
/// 2. ./config.toml (if exists)
/// 3. default_config_path() (usually ~/.config/linkrelay/config.toml)
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    if let Some(config_path) = path {
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::info!("Loaded config from specified path {:?}", config_path);
            return Ok(config);
        } else {
            anyhow::bail!("Specified config file not found: {:?}", config_path);
        }
    }

    // Try current directory config.toml
    let local_config = PathBuf::from("config.toml");
    if local_config.exists() {
        match std::fs::read_to_string(&local_config) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from current directory {:?}", local_config);
                    return Ok(config);
                }
                Err(e) => {
                    tracing::error!("Failed to parse ./config.toml: {}. Falling back to default path.", e);
                }
            },
            Err(e) => {
                tracing::error!("Failed to read ./config.toml: {}. Falling back to default path.", e);
            }
        }
    }

    let default_path = default_config_path();
    if default_path.exists() {
        let content = std::fs::read_to_string(&default_path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::info!("Loaded config from default path {:?}", default_path);
        Ok(config)
    } else {
        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8046);
        assert_eq!(config.proxy.prefix, DEFAULT_PREFIX);
        assert_eq!(config.proxy.codec, CodecKind::Base64);
        assert!(config.proxy.follow_redirects);
        assert!(!config.proxy.relay_cookies);
        assert_eq!(config.upstream.request_timeout, None);
        assert!(config.control.enabled);
        assert_eq!(config.control.path, "/__linkrelay/config");
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [proxy]
            prefix = "service/uv"
            codec = "xor"
            relay_cookies = true

            [upstream]
            request_timeout = 30
            proxy_url = "http://corp-proxy:3128"

            [control]
            api_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.upstream.request_timeout, Some(30));
        assert_eq!(config.upstream.connect_timeout, 20);
        assert_eq!(config.control.api_key.as_deref(), Some("secret"));

        let proxy = config.proxy.to_proxy_config();
        assert_eq!(proxy.prefix(), "/service/uv/");
        assert_eq!(proxy.codec_kind(), CodecKind::Xor);
        assert!(proxy.relay_cookies);
        assert!(proxy.follow_redirects);
    }

    #[test]
    fn test_unknown_codec_is_rejected() {
        assert!(toml::from_str::<Config>("[proxy]\ncodec = \"rot13\"").is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let missing = PathBuf::from("/definitely/not/here/linkrelay.toml");
        assert!(load_config(Some(missing)).is_err());
    }

    #[test]
    fn test_bind_address() {
        let mut server = ServerConfig::default();
        assert_eq!(server.get_bind_address(), "127.0.0.1");
        server.allow_lan_access = true;
        assert_eq!(server.get_bind_address(), "0.0.0.0");
    }
}
