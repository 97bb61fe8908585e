use ad_marketplace::cli::Cli;
use ad_marketplace::config::{config, MarketplaceConfig};
use ad_marketplace::telemetry::{init_telemetry, shutdown_telemetry};
use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => {
            MarketplaceConfig::load_env_file()?;
            MarketplaceConfig::load_from(Some(path))?
        }
        None => config()?.clone(),
    };

    init_telemetry(
        &config.observability.log_level,
        config.observability.json_logs,
    )?;

    let result = tokio::runtime::Runtime::new()?.block_on(cli.run(config));
    shutdown_telemetry();
    result
}
