use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const CONFIG_PATH: &str = "/etc/vqos";

#[derive(Deserialize, Clone, Debug)]
pub struct EtcVqos {
    pub server: Option<ServerConfig>,
    pub agent: Option<AgentConfig>,
    #[serde(default)]
    pub vlan_mapping: Vec<VlanMapping>,
}

/// Settings for the central policy daemon (`vqosd`).
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    /// Address:port the bus server binds.
    pub bind_address: String,
    /// Path of the TOML policy file to serve and watch.
    pub policy_file: String,
    /// Base RPC topic. The fanout topic is derived from this.
    pub base_topic: String,
}

/// Settings for the per-host agent daemon (`vqos_agentd`).
#[derive(Deserialize, Clone, Debug)]
pub struct AgentConfig {
    /// Address:port of the central `vqosd` bus server.
    pub server_address: String,
    /// Base RPC topic. Must match the server's.
    pub base_topic: String,
    /// Name of the enforcement driver to load, e.g. "openflow-vlan".
    pub qos_driver: String,
    /// Name of the local virtual switch bridge.
    pub bridge: String,
}

/// One network-to-VLAN assignment, supplied by the local networking
/// layer. Seeds the agent's VLAN map at start-up.
#[derive(Deserialize, Clone, Debug)]
pub struct VlanMapping {
    pub network_id: String,
    pub tag: u16,
}

impl EtcVqos {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file {0} does not exist. You must set it up.")]
    Missing(String),
    #[error("Unable to read configuration: {0}")]
    Unreadable(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod test {
    use super::EtcVqos;

    const EXAMPLE: &str = r#"
[server]
bind_address = "0.0.0.0:9554"
policy_file = "/etc/vqos_policies.toml"
base_topic = "q-agent-notifier"

[agent]
server_address = "10.0.0.1:9554"
base_topic = "q-agent-notifier"
qos_driver = "openflow-vlan"
bridge = "br-int"

[[vlan_mapping]]
network_id = "net1"
tag = 101

[[vlan_mapping]]
network_id = "net2"
tag = 102
"#;

    #[test]
    fn parse_full_config() {
        let cfg = EtcVqos::parse(EXAMPLE).unwrap();
        let server = cfg.server.unwrap();
        assert_eq!(server.bind_address, "0.0.0.0:9554");
        assert_eq!(server.policy_file, "/etc/vqos_policies.toml");
        let agent = cfg.agent.unwrap();
        assert_eq!(agent.qos_driver, "openflow-vlan");
        assert_eq!(agent.bridge, "br-int");
        assert_eq!(cfg.vlan_mapping.len(), 2);
        assert_eq!(cfg.vlan_mapping[0].network_id, "net1");
        assert_eq!(cfg.vlan_mapping[0].tag, 101);
    }

    #[test]
    fn parse_agent_only() {
        let raw = r#"
[agent]
server_address = "10.0.0.1:9554"
base_topic = "q-agent-notifier"
qos_driver = "noop"
bridge = "br-int"
"#;
        let cfg = EtcVqos::parse(raw).unwrap();
        assert!(cfg.server.is_none());
        assert!(cfg.vlan_mapping.is_empty());
        assert_eq!(cfg.agent.unwrap().qos_driver, "noop");
    }

    #[test]
    fn reject_garbage() {
        assert!(EtcVqos::parse("not [valid").is_err());
    }
}
