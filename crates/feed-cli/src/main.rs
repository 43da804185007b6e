use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feed_cli::commands::publish::{self, PublishOptions};
use feed_cli::commands::subscribe::{self, SubscribeOptions};
use feed_cli::{Cli, Commands, Config};

/// Load and validate config, failing before any session starts.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so they never mix with headless output or the dashboard
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Some(Commands::Subscribe {
            topic,
            address,
            log_dir,
            headless,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            subscribe::run(
                &config,
                SubscribeOptions {
                    topic,
                    address,
                    log_dir,
                    headless,
                    json,
                },
            )?;
        }
        Some(Commands::Publish { name, topic, bind }) => {
            let config = load_config(cli.config.as_deref())?;
            publish::run(&config, PublishOptions { name, topic, bind })?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
