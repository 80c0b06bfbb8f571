// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use crate::entity::EntityRef;
use crate::policy_client::PolicyClient;
use crate::vlan_map::VlanMap;
use dashmap::DashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use vqos_bus::{BusClientError, RequestContext};
use vqos_drivers::{Bridge, EnforcementError, QosDriver, VifPort, VlanTag};

/// Errors surfaced by the synchronization operations. Either way the
/// entity is left unmarked in the cache, so it stays eligible for
/// convergence on its next notification.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The policy store could not be reached, or refused the lookup.
    #[error("Policy lookup failed: {0}")]
    Transport(#[from] BusClientError),
    /// The enforcement driver reported a failure.
    #[error("Enforcement failed: {0}")]
    Enforcement(#[from] EnforcementError),
}

/// The per-host synchronization core. Holds the local enforcement
/// cache: an entry exists for an entity if and only if this agent
/// believes a policy is currently enforced on that entity's switch
/// port(s).
///
/// Every operation touches at most one cache key, so notifications for
/// different entities may be processed in any relative order - the
/// cache is sharded per key and there is no cross-entity state.
pub struct QosAgent<P: PolicyClient, B: Bridge> {
    policy: P,
    bridge: B,
    vlans: VlanMap,
    driver: Arc<dyn QosDriver>,
    enforced: DashSet<EntityRef>,
}

impl<P: PolicyClient, B: Bridge> QosAgent<P, B> {
    /// Assembles the core from its collaborators.
    pub fn new(policy: P, bridge: B, vlans: VlanMap, driver: Arc<dyn QosDriver>) -> Self {
        Self {
            policy,
            bridge,
            vlans,
            driver,
            enforced: DashSet::new(),
        }
    }

    /// Whether the agent currently believes `entity` is enforced.
    pub fn is_enforced(&self, entity: &EntityRef) -> bool {
        self.enforced.contains(entity)
    }

    /// How many entities carry an enforced marker.
    pub fn enforced_count(&self) -> usize {
        self.enforced.len()
    }

    /// Re-enforces `qos_id` on every local port of `network_id`, then
    /// marks the network enforced. A network with no local VLAN
    /// assignment is not local to this host; the call is then a no-op.
    pub async fn network_qos_updated(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
        network_id: &str,
    ) -> Result<(), AgentError> {
        let Some(vlan) = self.vlans.vlan_for(network_id) else {
            debug!("Network {network_id} has no local VLAN; skipping QoS update");
            return Ok(());
        };
        let attributes = self.policy.get_policy_for_qos(ctx, qos_id).await?;
        for port in self.bridge.ports_on_network(network_id) {
            self.driver.apply(port.ofport, vlan, &attributes)?;
        }
        self.enforced.insert(EntityRef::network(network_id));
        Ok(())
    }

    /// Unmarks `network_id`. Does not reprogram switch state: cleanup
    /// is the driver's business on the next observed change. Per-port
    /// cache entries under the network are untouched; each port is
    /// deleted by its own notification.
    pub async fn network_qos_deleted(
        &self,
        _ctx: &RequestContext,
        _qos_id: &str,
        network_id: &str,
    ) -> Result<(), AgentError> {
        self.enforced.remove(&EntityRef::network(network_id));
        Ok(())
    }

    /// Enforces `qos_id` on one port, then marks it. A port that does
    /// not resolve locally is an expected race (it may have migrated),
    /// not a fault: the call is then a no-op.
    pub async fn port_qos_updated(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
        port_id: &str,
    ) -> Result<(), AgentError> {
        let Some(port) = self.bridge.resolve_port(port_id) else {
            debug!("Port {port_id} is not local; skipping QoS update");
            return Ok(());
        };
        let Some(vlan) = self.port_vlan(&port) else {
            debug!("Port {port_id} has no local VLAN; skipping QoS update");
            return Ok(());
        };
        let attributes = self.policy.get_policy_for_qos(ctx, qos_id).await?;
        self.driver.apply(port.ofport, vlan, &attributes)?;
        self.enforced.insert(EntityRef::port(port_id));
        Ok(())
    }

    /// Unmarks `port_id` unconditionally. If the port still resolves
    /// locally, flow removal is attempted fire-and-forget: a failure is
    /// logged and the cache removal stands, because after a delete the
    /// agent's belief must be "not enforced" either way.
    pub async fn port_qos_deleted(
        &self,
        _ctx: &RequestContext,
        _qos_id: &str,
        port_id: &str,
    ) -> Result<(), AgentError> {
        self.enforced.remove(&EntityRef::port(port_id));
        if let Some(port) = self.bridge.resolve_port(port_id) {
            if let Some(vlan) = self.port_vlan(&port) {
                if let Err(e) = self.driver.remove(port.ofport, vlan) {
                    warn!("Flow removal for deleted port {port_id} failed: {e}");
                }
            }
        }
        Ok(())
    }

    fn port_vlan(&self, port: &VifPort) -> Option<VlanTag> {
        port.network_id
            .as_deref()
            .and_then(|network_id| self.vlans.vlan_for(network_id))
    }
}
