use clap::Parser;
use fleet_control::logging::Logging;
use fleet_control::{run, settings};
use std::path::PathBuf;
use std::process;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "fleet-control",
    about = "Control-plane backend for a fleet of telemetry-collector agents",
    version
)]
struct Cli {
    /// Path to the backend settings file.
    #[arg(long, default_value = "config/backend.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = Logging::try_init() {
        eprintln!("{err}");
        process::exit(1);
    }

    let settings = match settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(err) => {
            error!(config = %cli.config.display(), error = %err, "loading settings");
            process::exit(1);
        }
    };

    if let Err(err) = run::run(settings).await {
        error!(error = %err, "backend terminated");
        process::exit(1);
    }
}
