use clap::Parser;
use crossmode_core::{Gateway, GatewayConfig};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crossmode")]
#[command(about = "DMR <-> YSF digital voice gateway")]
struct Cli {
    /// Gateway configuration file
    #[arg(value_name = "CONFIG.TOML")]
    config: PathBuf,

    /// Validate the configuration, route and ID files, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(&cli.config)?;

    if cli.check {
        return check_command(&cli.config, &config);
    }

    init_logging(&config.log.filter);
    run_command(config).await
}

/// `RUST_LOG` wins over the filter from the config file
fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn check_command(path: &Path, config: &GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Loads the route and ID files and resolves every address without binding
    Gateway::from_config(config)?;

    println!("Configuration OK: {}", path.display());
    println!(
        "  {} (DMR ID {}), slot {}, colour code {}",
        config.ysf_callsign(),
        config.general.dmr_id,
        config.dmr.slot,
        config.dmr.color_code
    );
    println!(
        "  DMR {} <-> {}, YSF {} <-> {}",
        config.dmr.local_address, config.dmr.remote_address, config.ysf.local_address, config.ysf.remote_address
    );
    Ok(())
}

async fn run_command(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    // The gateway loop is synchronous and paces itself, so it gets its own thread
    let mut worker = tokio::task::spawn_blocking(move || {
        let mut gateway = Gateway::from_config(&config)?;
        gateway.run(&worker_cancel)
    });

    tokio::select! {
        joined = &mut worker => {
            // Only reached when the gateway failed to start
            joined??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Interrupt received, stopping gateway");
            cancel.cancel();
        }
    }

    worker.await??;
    Ok(())
}
