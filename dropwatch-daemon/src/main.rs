use anyhow::Result;
use clap::Parser;

use dropwatch_daemon::cli::DaemonCli;
use dropwatch_daemon::{load_config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let (mut config, found) = load_config(&cli.config).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.check {
        println!(
            "configuration OK: {} ({} exporter section(s))",
            cli.config.display(),
            config.configured_exporters()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    if !found {
        tracing::warn!(
            path = %cli.config.display(),
            "config file not found, using defaults"
        );
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dropwatch starting");

    run(config, cli.verbose).await
}

#[cfg(target_os = "linux")]
async fn run(config: dropwatch_core::config::DropwatchConfig, verbose: bool) -> Result<()> {
    use dropwatch_daemon::orchestrator::Orchestrator;
    use dropwatch_dropmon::GenlSocket;

    let socket = GenlSocket::open()
        .map_err(|e| anyhow::anyhow!("failed to open generic netlink socket: {}", e))?;
    let mut orchestrator = Orchestrator::build(config, socket, verbose)?;
    orchestrator.run().await
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: dropwatch_core::config::DropwatchConfig, _verbose: bool) -> Result<()> {
    Err(anyhow::anyhow!(
        "the kernel drop monitor is only available on Linux"
    ))
}
