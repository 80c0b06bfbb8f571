// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use crate::bridge::{OfPort, VlanTag};
use crate::driver::{EnforcementError, QosDriver, DRIVER_OPENFLOW_VLAN};
use std::sync::Arc;
use tracing::debug;
use vqos_bus::PolicyAttribute;

/// One flow-table modification, keyed by input port and VLAN. The
/// actions are carried as key/value pairs; rendering to the switch's
/// own rule grammar is the sink's concern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowSpec {
    /// The switch-local port the flow matches on.
    pub in_port: OfPort,
    /// The VLAN segment the flow is scoped to.
    pub vlan: VlanTag,
    /// Policy attributes to apply, in policy order.
    pub actions: Vec<(String, String)>,
}

impl FlowSpec {
    /// Renders the spec as a comma-joined `key=value` rule string.
    pub fn render(&self) -> String {
        let mut rule = format!("in_port={},dl_vlan={}", self.in_port.0, self.vlan.0);
        for (key, value) in &self.actions {
            rule.push_str(&format!(",{key}={value}"));
        }
        rule
    }
}

/// Flow programming on the local virtual switch. Narrow by design; the
/// full switch-control library is an external collaborator.
pub trait FlowSink: Send + Sync {
    /// Installs (or overwrites) one flow.
    fn add_flow(&self, flow: &FlowSpec) -> Result<(), EnforcementError>;
    /// Deletes the flows matching a port/VLAN pair.
    fn delete_flows(&self, port: OfPort, vlan: VlanTag) -> Result<(), EnforcementError>;
}

/// The reference enforcement driver: expresses a policy as OpenFlow
/// flow modifications keyed by input port and VLAN tag. Re-applying the
/// same policy overwrites the same flow, so repeated invocation is
/// harmless.
pub struct OpenflowVlanDriver {
    sink: Arc<dyn FlowSink>,
}

impl OpenflowVlanDriver {
    /// Creates the driver over a flow sink (normally the local bridge).
    pub fn new(sink: Arc<dyn FlowSink>) -> Self {
        Self { sink }
    }
}

impl QosDriver for OpenflowVlanDriver {
    fn name(&self) -> &'static str {
        DRIVER_OPENFLOW_VLAN
    }

    fn apply(
        &self,
        port: OfPort,
        vlan: VlanTag,
        attributes: &[PolicyAttribute],
    ) -> Result<(), EnforcementError> {
        let flow = FlowSpec {
            in_port: port,
            vlan,
            actions: attributes
                .iter()
                .map(|attr| (attr.key.clone(), attr.value.clone()))
                .collect(),
        };
        debug!("Applying flow: {}", flow.render());
        self.sink.add_flow(&flow)
    }

    fn remove(&self, port: OfPort, vlan: VlanTag) -> Result<(), EnforcementError> {
        debug!("Clearing flows for port {} vlan {}", port.0, vlan.0);
        self.sink.delete_flows(port, vlan)
    }
}
