// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use crate::policy_client::PolicyClient;
use crate::sync::{AgentError, QosAgent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use vqos_bus::{
    qos_update_topic, RequestContext, RpcEnvelope, Subscription, NETWORK_QOS_DELETED,
    NETWORK_QOS_UPDATED, PORT_QOS_DELETED, PORT_QOS_UPDATED,
};
use vqos_drivers::Bridge;

const RECONNECT_HOLDOFF_SECONDS: u64 = 5;

impl<P: PolicyClient, B: Bridge> QosAgent<P, B> {
    /// Routes one fanout notification to the matching synchronization
    /// operation. Messages with an unrecognized version, method, or a
    /// missing argument are discarded with a warning - fatal for that
    /// message only, no other entity's state is affected.
    pub async fn handle_notification(&self, envelope: &RpcEnvelope) -> Result<(), AgentError> {
        if !envelope.version_matches() {
            warn!(
                "Discarding {} notification with unrecognized RPC version {}",
                envelope.method, envelope.version
            );
            return Ok(());
        }
        let Some(qos_id) = envelope.arg("qos_id") else {
            warn!("Discarding {} notification without qos_id", envelope.method);
            return Ok(());
        };
        let ctx = RequestContext::new();
        match envelope.method.as_str() {
            NETWORK_QOS_UPDATED => {
                let Some(network_id) = required_arg(envelope, "network_id") else {
                    return Ok(());
                };
                self.network_qos_updated(&ctx, qos_id, network_id).await
            }
            NETWORK_QOS_DELETED => {
                let Some(network_id) = required_arg(envelope, "network_id") else {
                    return Ok(());
                };
                self.network_qos_deleted(&ctx, qos_id, network_id).await
            }
            PORT_QOS_UPDATED => {
                let Some(port_id) = required_arg(envelope, "port_id") else {
                    return Ok(());
                };
                self.port_qos_updated(&ctx, qos_id, port_id).await
            }
            PORT_QOS_DELETED => {
                let Some(port_id) = required_arg(envelope, "port_id") else {
                    return Ok(());
                };
                self.port_qos_deleted(&ctx, qos_id, port_id).await
            }
            other => {
                warn!("Discarding notification for unrecognized method {other}");
                Ok(())
            }
        }
    }
}

fn required_arg<'a>(envelope: &'a RpcEnvelope, name: &str) -> Option<&'a str> {
    let value = envelope.arg(name);
    if value.is_none() {
        warn!("Discarding {} notification without {name}", envelope.method);
    }
    value
}

/// Drives the agent from the server's QoS fanout channel. Each inbound
/// notification is handled to completion before the next is read, so
/// cache mutations within this agent are naturally serialized. Failed
/// operations are logged and not retried; the entity converges on its
/// next notification. Reconnects with a fixed hold-off when the server
/// goes away.
pub async fn run_subscription<P: PolicyClient, B: Bridge>(
    agent: Arc<QosAgent<P, B>>,
    server_address: &str,
    base_topic: &str,
) -> Result<(), AgentError> {
    let topic = qos_update_topic(base_topic);
    loop {
        match Subscription::connect(server_address, &topic).await {
            Ok(mut subscription) => {
                info!("Subscribed to {topic}");
                loop {
                    match subscription.recv().await {
                        Ok(envelope) => {
                            if let Err(e) = agent.handle_notification(&envelope).await {
                                error!("QoS notification handling failed: {e}");
                            }
                        }
                        Err(e) => {
                            warn!("Lost subscription to {topic}: {e}");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Unable to subscribe to {topic}: {e}");
            }
        }
        sleep(Duration::from_secs(RECONNECT_HOLDOFF_SECONDS)).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::EntityRef;
    use crate::vlan_map::VlanMap;
    use std::collections::BTreeMap;
    use vqos_bus::{BusClientError, PolicyAttribute, QOS_RPC_VERSION};
    use vqos_drivers::{
        EnforcementError, OfPort, QosDriver, VifPort, VlanTag,
    };

    struct StaticPolicy;
    impl PolicyClient for StaticPolicy {
        async fn get_policy_for_qos(
            &self,
            _ctx: &RequestContext,
            _qos_id: &str,
        ) -> Result<Vec<PolicyAttribute>, BusClientError> {
            Ok(vec![PolicyAttribute::new("dscp", "32")])
        }
    }

    struct OnePortBridge;
    impl Bridge for OnePortBridge {
        fn resolve_port(&self, port_id: &str) -> Option<VifPort> {
            (port_id == "port1").then(|| VifPort {
                port_id: port_id.to_string(),
                ofport: OfPort(1),
                network_id: Some("net1".to_string()),
            })
        }
        fn ports_on_network(&self, network_id: &str) -> Vec<VifPort> {
            if network_id == "net1" {
                vec![VifPort {
                    port_id: "port1".to_string(),
                    ofport: OfPort(1),
                    network_id: Some("net1".to_string()),
                }]
            } else {
                Vec::new()
            }
        }
    }

    struct AcceptingDriver;
    impl QosDriver for AcceptingDriver {
        fn name(&self) -> &'static str {
            "accepting"
        }
        fn apply(
            &self,
            _port: OfPort,
            _vlan: VlanTag,
            _attributes: &[PolicyAttribute],
        ) -> Result<(), EnforcementError> {
            Ok(())
        }
        fn remove(&self, _port: OfPort, _vlan: VlanTag) -> Result<(), EnforcementError> {
            Ok(())
        }
    }

    fn dispatch_agent() -> QosAgent<StaticPolicy, OnePortBridge> {
        let vlans = VlanMap::new();
        vlans.assign("net1", VlanTag(101));
        QosAgent::new(StaticPolicy, OnePortBridge, vlans, Arc::new(AcceptingDriver))
    }

    fn notification(method: &str, entity_key: &str, entity_id: &str) -> RpcEnvelope {
        let mut args = BTreeMap::new();
        args.insert("qos_id".to_string(), "fake-qos".to_string());
        args.insert(entity_key.to_string(), entity_id.to_string());
        RpcEnvelope::request(method, args)
    }

    #[tokio::test]
    async fn routes_network_update() {
        let agent = dispatch_agent();
        agent
            .handle_notification(&notification("network_qos_updated", "network_id", "net1"))
            .await
            .expect("handled");
        assert!(agent.is_enforced(&EntityRef::network("net1")));
    }

    #[tokio::test]
    async fn routes_port_update_and_delete() {
        let agent = dispatch_agent();
        agent
            .handle_notification(&notification("port_qos_updated", "port_id", "port1"))
            .await
            .expect("handled");
        assert!(agent.is_enforced(&EntityRef::port("port1")));

        agent
            .handle_notification(&notification("port_qos_deleted", "port_id", "port1"))
            .await
            .expect("handled");
        assert!(!agent.is_enforced(&EntityRef::port("port1")));
    }

    #[tokio::test]
    async fn version_mismatch_is_discarded() {
        let agent = dispatch_agent();
        let mut envelope = notification("network_qos_updated", "network_id", "net1");
        assert_eq!(envelope.version, QOS_RPC_VERSION);
        envelope.version = "99.0".to_string();

        agent.handle_notification(&envelope).await.expect("discarded");
        assert_eq!(agent.enforced_count(), 0);
    }

    #[tokio::test]
    async fn unknown_method_is_discarded() {
        let agent = dispatch_agent();
        agent
            .handle_notification(&notification("subnet_qos_updated", "network_id", "net1"))
            .await
            .expect("discarded");
        assert_eq!(agent.enforced_count(), 0);
    }

    #[tokio::test]
    async fn missing_argument_is_discarded() {
        let agent = dispatch_agent();
        let mut args = BTreeMap::new();
        args.insert("qos_id".to_string(), "fake-qos".to_string());
        agent
            .handle_notification(&RpcEnvelope::request("network_qos_updated", args))
            .await
            .expect("discarded");
        assert_eq!(agent.enforced_count(), 0);
    }
}
