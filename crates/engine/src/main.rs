use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pl_engine::cli::{self, Cli, Command, ConfigArgs, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to chat when no subcommand is given.
        None => {
            init_tracing();
            let (config, _path) = cli::load_config()?;
            cli::chat::chat(Arc::new(config), "default".into(), None).await
        }
        Some(Command::Chat { user, session }) => {
            init_tracing();
            let (config, _path) = cli::load_config()?;
            cli::chat::chat(Arc::new(config), user, session).await
        }
        Some(Command::Config(ConfigArgs { command: ConfigCommand::Validate })) => {
            let (config, path) = cli::load_config()?;
            if !cli::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigArgs { command: ConfigCommand::Show })) => {
            let (config, _path) = cli::load_config()?;
            cli::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("paceline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured tracing to stderr, filtered by `RUST_LOG`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pl_engine=debug")),
        )
        .init();
}
