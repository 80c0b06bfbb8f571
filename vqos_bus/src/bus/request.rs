// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The version token carried by every message on the channel. A receiver
/// that sees any other value must refuse to process the message rather
/// than guess at its meaning.
pub const QOS_RPC_VERSION: &str = "1.1";

/// Literal suffix appended to the base agent topic to form the fanout
/// topic for QoS change notifications.
pub const QOS_TOPIC_SUFFIX: &str = "-qoss-update";

/// Method name for the agent-to-server policy lookup.
pub const GET_POLICY_FOR_QOS: &str = "get_policy_for_qos";
/// Method name broadcast when a network's QoS binding changes.
pub const NETWORK_QOS_UPDATED: &str = "network_qos_updated";
/// Method name broadcast when a network's QoS binding is removed.
pub const NETWORK_QOS_DELETED: &str = "network_qos_deleted";
/// Method name broadcast when a port's QoS binding changes.
pub const PORT_QOS_UPDATED: &str = "port_qos_updated";
/// Method name broadcast when a port's QoS binding is removed.
pub const PORT_QOS_DELETED: &str = "port_qos_deleted";

/// Derives the fanout topic for QoS updates from a base topic, keeping
/// QoS notifications isolated from other traffic sharing the base.
pub fn qos_update_topic(base_topic: &str) -> String {
    format!("{base_topic}{QOS_TOPIC_SUFFIX}")
}

/// A single RPC message: a method name, a mapping of named arguments,
/// an optional namespace discriminator, and the shared version token.
/// The same shape is used for unicast calls and fanout notifications.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RpcEnvelope {
    /// Version token; see [`QOS_RPC_VERSION`].
    pub version: String,
    /// The RPC method name.
    pub method: String,
    /// Namespace discriminator. `None` for the QoS surface.
    pub namespace: Option<String>,
    /// Named arguments.
    pub args: BTreeMap<String, String>,
}

impl RpcEnvelope {
    /// Builds an envelope for `method` carrying `args`, stamped with the
    /// current version token and an empty namespace.
    pub fn request<S: Into<String>>(method: S, args: BTreeMap<String, String>) -> Self {
        Self {
            version: QOS_RPC_VERSION.to_string(),
            method: method.into(),
            namespace: None,
            args,
        }
    }

    /// Builds the policy-lookup call for one QoS binding id.
    pub fn get_policy_for_qos(qos_id: &str) -> Self {
        let mut args = BTreeMap::new();
        args.insert("qos_id".to_string(), qos_id.to_string());
        Self::request(GET_POLICY_FOR_QOS, args)
    }

    /// Fetches one named argument.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    /// True if the envelope carries the version token this build speaks.
    pub fn version_matches(&self) -> bool {
        self.version == QOS_RPC_VERSION
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_policy_for_qos_shape() {
        let env = RpcEnvelope::get_policy_for_qos("fake-qos");
        assert_eq!(env.method, GET_POLICY_FOR_QOS);
        assert_eq!(env.version, QOS_RPC_VERSION);
        assert_eq!(env.namespace, None);
        assert_eq!(env.args.len(), 1);
        assert_eq!(env.arg("qos_id"), Some("fake-qos"));
    }

    #[test]
    fn topic_suffix_is_literal() {
        assert_eq!(qos_update_topic("fake_topic"), "fake_topic-qoss-update");
    }

    #[test]
    fn version_detection() {
        let mut env = RpcEnvelope::get_policy_for_qos("fake-qos");
        assert!(env.version_matches());
        env.version = "9.9".to_string();
        assert!(!env.version_matches());
    }
}
