use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use tolk::cli::build_server_cli;
use tolk::config::Config;
use tolk::services::{Dispatcher, GatewayServer};
use tolk::{modbus, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_server_cli().get_matches();
    let config = Config::from_matches(&matches).context("Invalid configuration")?;

    if let Some(path) = matches.get_one::<String>("write-config") {
        config
            .save_to_file(path)
            .with_context(|| format!("Cannot write configuration to {}", path))?;
        println!("✅ Configuration written to {}", path);
        return Ok(());
    }

    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, &config.log_level),
    );

    info!("🖥️  Tolk {} starting", VERSION);
    match matches.get_one::<String>("config") {
        Some(path) => info!("📋 Loaded configuration from {}", path),
        None => info!("📋 Using built-in defaults"),
    }
    info!("📡 Modbus link: {}", config.modbus.describe());

    let client = modbus::connect(&config.modbus).await;
    let dispatcher = Arc::new(Dispatcher::new(client));

    let server = GatewayServer::bind(&config.server, dispatcher)
        .await
        .context("Cannot start JSON-RPC server")?;
    server.serve_until_ctrl_c().await?;

    info!("👋 Tolk stopped");
    Ok(())
}
