//! Configuration for the vqos daemons, read from `/etc/vqos` (TOML).
//! Both daemons share one file: `vqosd` reads the `[server]` section,
//! `vqos_agentd` reads `[agent]` and the `[[vlan_mapping]]` table.

mod etc;

pub use etc::{AgentConfig, ConfigError, EtcVqos, ServerConfig, VlanMapping};
