//! Greenbook lay-betting bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Automated lay-betting engine with a staging mode and operator API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (also via GREENBOOK_CONFIG).
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS crypto provider must be installed before any stream connects.
    greenbook_stream::init_crypto();

    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var("GREENBOOK_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = greenbook_bot::AppConfig::load(&config_path)?;
    init_logging(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %config_path,
        data_dir = %config.data_dir,
        "Starting greenbook"
    );

    greenbook_bot::Application::new(config).run().await?;
    Ok(())
}
