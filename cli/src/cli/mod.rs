pub mod commands;

use clap::{Parser, Subcommand};
use linkrelay_core::proxy::CodecKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linkrelay")]
#[command(author, version, about = "Transparent URL-rewriting relay proxy")]
pub struct Cli {
    /// Path to config file (checked in order: local config.toml, ~/.config/linkrelay/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Start {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Interception prefix (overrides config)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Print the proxied links for a target URL
    Encode {
        url: String,

        /// base64, plain or xor (defaults to the configured codec)
        #[arg(long)]
        codec: Option<CodecKind>,
    },

    /// Decode a proxied URL token back to its target
    Decode {
        token: String,

        #[arg(long)]
        codec: Option<CodecKind>,
    },

    /// Show relay status
    Status,
}
