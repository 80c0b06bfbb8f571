// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use crate::driver::EnforcementError;
use crate::openflow::{FlowSink, FlowSpec};
use tracing::debug;
use vqos_utils::run_output;

/// An OpenFlow port number: a port identifier meaningful only within
/// one virtual switch instance. Re-resolved for every enforcement
/// operation, because the underlying port may have been replugged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OfPort(pub u32);

/// A local VLAN segment tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VlanTag(pub u16);

/// A port as the local switch sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VifPort {
    /// The fleet-wide port id this entry was resolved from.
    pub port_id: String,
    /// The switch-local handle.
    pub ofport: OfPort,
    /// The network the port belongs to, when the switch knows it.
    pub network_id: Option<String>,
}

/// Port resolution on the local virtual switch. A miss is not an error:
/// ports migrate between hosts, and a notification for a port that is
/// no longer (or not yet) local is an expected race.
pub trait Bridge: Send + Sync {
    /// Looks up one port by its fleet-wide id.
    fn resolve_port(&self, port_id: &str) -> Option<VifPort>;
    /// Lists the local ports currently belonging to a network.
    fn ports_on_network(&self, network_id: &str) -> Vec<VifPort>;
}

/// Shell-out implementation of [`Bridge`] and [`FlowSink`] against Open
/// vSwitch. Deliberately narrow: the switch-control library proper is
/// not this crate's concern.
pub struct OvsBridge {
    name: String,
}

impl OvsBridge {
    /// A handle on the named bridge (e.g. `br-int`).
    pub fn new<S: ToString>(name: S) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// The bridge name this handle controls.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn interface_field(&self, port_id: &str, column: &str) -> Option<String> {
        let filter = format!("external_ids:iface-id={port_id}");
        let out = run_output(
            "/usr/bin/ovs-vsctl",
            &["--bare", &format!("--columns={column}"), "find", "Interface", &filter],
        )?;
        let value = out.trim();
        if value.is_empty() || value == "[]" {
            return None;
        }
        Some(value.to_string())
    }
}

impl Bridge for OvsBridge {
    fn resolve_port(&self, port_id: &str) -> Option<VifPort> {
        let ofport = self
            .interface_field(port_id, "ofport")?
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)? as u32;
        let network_id = self
            .interface_field(port_id, "external_ids")
            .and_then(|ids| parse_external_id(&ids, "network-id"));
        Some(VifPort {
            port_id: port_id.to_string(),
            ofport: OfPort(ofport),
            network_id,
        })
    }

    fn ports_on_network(&self, network_id: &str) -> Vec<VifPort> {
        let filter = format!("external_ids:network-id={network_id}");
        let Some(out) = run_output(
            "/usr/bin/ovs-vsctl",
            &["--bare", "--columns=external_ids,ofport", "find", "Interface", &filter],
        ) else {
            debug!("No local ports found for network {network_id}");
            return Vec::new();
        };
        parse_port_listing(&out, network_id)
    }
}

impl FlowSink for OvsBridge {
    fn add_flow(&self, flow: &FlowSpec) -> Result<(), EnforcementError> {
        let rendered = flow.render();
        if vqos_utils::run_success!("/usr/bin/ovs-ofctl", "add-flow", &self.name, &rendered) {
            Ok(())
        } else {
            Err(EnforcementError::FlowProgrammingFailed(rendered))
        }
    }

    fn delete_flows(&self, port: OfPort, vlan: VlanTag) -> Result<(), EnforcementError> {
        let matcher = format!("in_port={},dl_vlan={}", port.0, vlan.0);
        if vqos_utils::run_success!("/usr/bin/ovs-ofctl", "del-flows", &self.name, &matcher) {
            Ok(())
        } else {
            Err(EnforcementError::FlowProgrammingFailed(matcher))
        }
    }
}

/// Pulls one `key=value` entry out of an OVS external_ids rendering
/// such as `{iface-id=port1, network-id=net1}`.
fn parse_external_id(ids: &str, key: &str) -> Option<String> {
    let trimmed = ids.trim().trim_start_matches('{').trim_end_matches('}');
    for entry in trimmed.split(',') {
        let (k, v) = entry.split_once('=')?;
        if k.trim() == key {
            return Some(v.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// Parses `--bare` find output: alternating external_ids / ofport lines
/// separated by blank lines, one record per interface.
fn parse_port_listing(out: &str, network_id: &str) -> Vec<VifPort> {
    let mut ports = Vec::new();
    let mut lines = out.lines().filter(|l| !l.trim().is_empty());
    while let (Some(ids), Some(ofport)) = (lines.next(), lines.next()) {
        let Ok(ofport) = ofport.trim().parse::<i64>() else {
            continue;
        };
        if ofport <= 0 {
            continue;
        }
        let Some(port_id) = parse_external_id(ids, "iface-id") else {
            continue;
        };
        ports.push(VifPort {
            port_id,
            ofport: OfPort(ofport as u32),
            network_id: Some(network_id.to_string()),
        });
    }
    ports
}
