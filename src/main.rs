use actions_exporter::{app_init::initialize_exporter, config::Cli, logging::init_logging, server};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config = Cli::parse().load()?;
    let _log_guard = init_logging(config.log_format)?;
    info!(version = env!("CARGO_PKG_VERSION"), "actions-exporter starting up");

    let components = initialize_exporter(&config)?;
    server::serve(components.listen_address, components.metrics).await?;

    Ok(())
}
