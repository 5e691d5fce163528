//! Keyhole gateway daemon

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use keyhole::cli::{Cli, Command, config_json, config_table};
use keyhole::config::Config;
use keyhole::error::{KeyholeError, Result};
use keyhole::proxy::{Credential, ProxyServer};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Config { json }) => show_config(&config, json),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,keyhole=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting Keyhole gateway");
    tracing::debug!("Config loaded: {:?}", config);

    // No credential, no server.
    let credential = Credential::from_env(&config.upstream.api_key_env)?;
    tracing::info!(
        "Upstream credential loaded from ${}",
        config.upstream.api_key_env
    );

    ProxyServer::new(config, credential).serve().await?;

    tracing::info!("Keyhole gateway stopped");
    Ok(())
}

fn show_config(config: &Config, json: bool) -> Result<()> {
    let credential_present = Credential::from_env(&config.upstream.api_key_env).is_ok();

    if json {
        let output = serde_json::to_string_pretty(&config_json(config, credential_present))
            .map_err(|e| KeyholeError::Serialization(e.to_string()))?;
        println!("{output}");
    } else {
        println!("{}", config_table(config, credential_present));
    }

    Ok(())
}
