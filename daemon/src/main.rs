use kube::Client;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use krangd::{mutate, plugins, util, validate};

const HEALTH_ADDR: &str = "0.0.0.0:8081";
const METRICS_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    krang_common::init();

    let client = Client::try_default().await?;

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        krang_common::shutdown::shutdown_signal().await;
        shutdown_signal.cancel();
    });

    // Plain health listener, shared by both managers.
    tokio::spawn(util::metrics::run_server(HEALTH_ADDR, false));
    // Metrics + health listener, bound only where the `metrics` feature is on.
    #[cfg(feature = "metrics")]
    tokio::spawn(util::metrics::run_server(METRICS_ADDR, true));

    krang_common::signal_ready();
    println!("{}", "🌱 krangd is ready".green());

    // Leader manager: Validation only.
    let leader_client = client.clone();
    let leader_shutdown = shutdown.clone();
    let leader_manager = tokio::spawn(async move {
        if let Err(e) = validate::run(leader_client, leader_shutdown).await {
            eprintln!("{}", format!("Validation manager exited with error: {e}").red());
        }
    });

    // Daemon manager: Plugin Installer + Live Mutation, runs on every node.
    let daemon_client = client.clone();
    let daemon_shutdown = shutdown.clone();
    let daemon_manager = tokio::spawn(async move {
        let installer_shutdown = daemon_shutdown.clone();
        let installer_client = daemon_client.clone();
        let installer = tokio::spawn(async move {
            if let Err(e) = plugins::run(installer_client, installer_shutdown).await {
                eprintln!("{}", format!("Plugin Installer exited with error: {e}").red());
            }
        });

        let mutation_shutdown = daemon_shutdown.clone();
        let mutation_client = daemon_client.clone();
        let mutation = tokio::spawn(async move {
            if let Err(e) = mutate::run(mutation_client, mutation_shutdown).await {
                eprintln!("{}", format!("Live Mutation exited with error: {e}").red());
            }
        });

        let _ = tokio::join!(installer, mutation);
    });

    tokio::select! {
        _ = leader_manager => {},
        _ = daemon_manager => {},
        _ = shutdown.cancelled() => {},
    }

    Ok(())
}
