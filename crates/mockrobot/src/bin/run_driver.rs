//! Walks a MockRobot arm through a short session.
//!
//! Usage:
//!   cargo run -p mockrobot --features bin-deps --bin run_driver -- 127.0.0.1
//!
//! Set `MOCKROBOT_DRIVER_CONFIG` to a JSON settings file to override the
//! defaults (port 1000, 1s polling), and `RUST_LOG` to change verbosity.

use std::sync::Arc;

use mockrobot::{DriverBridge, DriverSettings, TcpDriver, TcpTransport};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "MOCKROBOT_DRIVER_CONFIG";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let address = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1".to_string());
    let settings = match std::env::var(CONFIG_ENV) {
        Ok(path) => match DriverSettings::from_json_file(&path) {
            Ok(settings) => settings,
            Err(err) => {
                error!("{}: {}", path, err);
                std::process::exit(2);
            }
        },
        Err(_) => DriverSettings::default(),
    };

    let bridge = DriverBridge::new(Arc::new(TcpDriver::new(TcpTransport, settings)));

    report("OpenConnection", bridge.open_connection(&address).await);
    report("Initialize", bridge.initialize().await);

    // A second request while the first is still moving is refused.
    let first = {
        let bridge = bridge.clone();
        let names = strings(&["Source Location"]);
        let values = strings(&["10"]);
        tokio::spawn(async move { bridge.execute_operation("Pick", &names, &values).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    report(
        "Pick (concurrent)",
        bridge
            .execute_operation("Pick", &strings(&["Source Location"]), &strings(&["5"]))
            .await,
    );
    match first.await {
        Ok(outcome) => report("Pick", outcome),
        Err(err) => error!("Pick task failed: {}", err),
    }

    report(
        "Transfer",
        bridge
            .execute_operation(
                "Transfer",
                &strings(&["Destination Location", "Source Location"]),
                &strings(&["5", "10"]),
            )
            .await,
    );

    report("Abort", bridge.abort().await);
    info!("Final state: {}", bridge.state());
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn report(call: &str, outcome: String) {
    if outcome.is_empty() {
        info!("{}: ok", call);
    } else {
        error!("{}: {}", call, outcome);
    }
}
