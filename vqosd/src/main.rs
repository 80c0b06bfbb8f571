mod policy_store;
mod reload;
mod rpc;

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use vqos_bus::{BusServer, QosNotifier, SubscriberRegistry};
use vqos_config::EtcVqos;

/// Configure console logging, with the level taken from `RUST_LOG`.
pub fn set_console_logging() -> Result<()> {
    let level = if let Ok(level) = std::env::var("RUST_LOG") {
        match level.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::WARN,
        }
    } else {
        LevelFilter::WARN
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        // Use a more compact, abbreviated log format
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    set_console_logging()?;
    info!("vqosd starting");

    let config = EtcVqos::load()?;
    let Some(server) = config.server else {
        bail!("/etc/vqos has no [server] section; nothing to serve");
    };

    // The subscriber registry doubles as the notifier's fanout
    // transport: reload events broadcast straight to connected agents.
    let registry = SubscriberRegistry::new();
    let notifier = Arc::new(QosNotifier::new(
        registry.clone(),
        &server.base_topic,
    ));
    reload::policy_file_watcher(PathBuf::from(&server.policy_file), notifier).await;

    let bus = BusServer::new(&server.bind_address);
    tokio::select! {
        result = bus.listen(rpc::handle_bus_call, registry) => {
            if let Err(e) = result {
                error!("Bus server stopped: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Terminating on SIGINT");
        }
    }
    Ok(())
}
