//! MockRobot onboard software simulator
//!
//! Usage:
//!   cargo run -p mockrobot_simulator -- [listen address] [process duration ms]
//!   # Then connect the driver to 127.0.0.1 (port 1000 by default)

use std::time::Duration;

use mockrobot_simulator::{Simulator, SimulatorSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "0.0.0.0:1000".to_string());
    let mut settings = SimulatorSettings::default();
    if let Some(ms) = args.next() {
        match ms.parse() {
            Ok(ms) => settings.process_duration = Duration::from_millis(ms),
            Err(err) => {
                error!("Invalid process duration `{}`: {}", ms, err);
                std::process::exit(2);
            }
        }
    }

    let simulator = match Simulator::bind(addr.as_str(), settings.clone()).await {
        Ok(simulator) => simulator,
        Err(err) => {
            error!("Could not listen on {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    info!("MockRobot simulator listening on {}", addr);
    info!(
        "Processes take {:?}; reachable locations {:?}",
        settings.process_duration, settings.locations
    );

    if let Err(err) = simulator.run().await {
        error!("Simulator stopped: {}", err);
    }
}
