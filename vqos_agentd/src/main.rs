use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use vqos_agent::{run_subscription, BusPolicyClient, QosAgent, VlanMap};
use vqos_config::EtcVqos;
use vqos_drivers::{build_driver, driver_names, OvsBridge, VlanTag};

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
    info!("vqos agent starting");

    let config = EtcVqos::load()?;
    let Some(agent_config) = config.agent else {
        bail!("/etc/vqos has no [agent] section; nothing to enforce");
    };

    // Seed the VLAN map from configuration. The local networking layer
    // keeps its own handle and updates assignments as segments move.
    let vlans = VlanMap::new();
    for mapping in &config.vlan_mapping {
        vlans.assign(&mapping.network_id, VlanTag(mapping.tag));
    }

    let sink = Arc::new(OvsBridge::new(&agent_config.bridge));
    let Some(driver) = build_driver(&agent_config.qos_driver, sink) else {
        bail!(
            "Unknown qos_driver {:?}; registered drivers: {}",
            agent_config.qos_driver,
            driver_names().join(", ")
        );
    };
    info!(
        "Enforcing with the {} driver on bridge {}",
        driver.name(),
        agent_config.bridge
    );

    let bridge = OvsBridge::new(&agent_config.bridge);
    let policy = BusPolicyClient::new(&agent_config.server_address);
    let agent = Arc::new(QosAgent::new(policy, bridge, vlans, driver));

    tokio::select! {
        result = run_subscription(agent, &agent_config.server_address, &agent_config.base_topic) => {
            if let Err(e) = result {
                error!("Subscription loop stopped: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Terminating on SIGINT");
        }
    }
    Ok(())
}
