use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("linkrelay=info".parse()?)
                .add_directive("linkrelay_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port, prefix } => {
            cli::commands::start::run(cli.config, port, prefix).await?;
        }
        Commands::Encode { url, codec } => {
            cli::commands::codec::encode(cli.config, &url, codec)?;
        }
        Commands::Decode { token, codec } => {
            cli::commands::codec::decode(cli.config, &token, codec)?;
        }
        Commands::Status => {
            cli::commands::status::run(cli.config).await?;
        }
    }

    Ok(())
}
