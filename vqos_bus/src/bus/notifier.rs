// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::context::RequestContext;
use super::request::{
    qos_update_topic, RpcEnvelope, NETWORK_QOS_DELETED, NETWORK_QOS_UPDATED, PORT_QOS_DELETED,
    PORT_QOS_UPDATED,
};
use super::BusClientError;
use std::collections::BTreeMap;
use tracing::debug;

/// One-to-many broadcast onto a topic. No acknowledgment, no retry -
/// subscribers that miss a notification converge on the next one.
pub trait Fanout: Send + Sync {
    /// Delivers `envelope` to every current subscriber of `topic`.
    fn fanout(&self, topic: &str, envelope: RpcEnvelope) -> Result<(), BusClientError>;
}

impl<F: Fanout + ?Sized> Fanout for &F {
    fn fanout(&self, topic: &str, envelope: RpcEnvelope) -> Result<(), BusClientError> {
        (**self).fanout(topic, envelope)
    }
}

/// Server-side notifier for QoS binding changes. Holds a generic fanout
/// handle plus the derived QoS update topic; each operation packages
/// exactly the identifiers in its signature into the broadcast message.
/// The CRUD layer calls the matching operation whenever an operator
/// mutates a binding; agents re-fetch policy content themselves.
pub struct QosNotifier<F: Fanout> {
    transport: F,
    topic: String,
}

impl<F: Fanout> QosNotifier<F> {
    /// Creates a notifier broadcasting on `base_topic`'s QoS update
    /// channel.
    pub fn new(transport: F, base_topic: &str) -> Self {
        Self {
            transport,
            topic: qos_update_topic(base_topic),
        }
    }

    /// Announces that `network_id`'s QoS binding changed.
    pub fn network_qos_updated(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
        network_id: &str,
    ) -> Result<(), BusClientError> {
        self.cast(ctx, NETWORK_QOS_UPDATED, "network_id", network_id, qos_id)
    }

    /// Announces that `network_id`'s QoS binding was removed.
    pub fn network_qos_deleted(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
        network_id: &str,
    ) -> Result<(), BusClientError> {
        self.cast(ctx, NETWORK_QOS_DELETED, "network_id", network_id, qos_id)
    }

    /// Announces that `port_id`'s QoS binding changed.
    pub fn port_qos_updated(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
        port_id: &str,
    ) -> Result<(), BusClientError> {
        self.cast(ctx, PORT_QOS_UPDATED, "port_id", port_id, qos_id)
    }

    /// Announces that `port_id`'s QoS binding was removed.
    pub fn port_qos_deleted(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
        port_id: &str,
    ) -> Result<(), BusClientError> {
        self.cast(ctx, PORT_QOS_DELETED, "port_id", port_id, qos_id)
    }

    fn cast(
        &self,
        ctx: &RequestContext,
        method: &str,
        entity_key: &str,
        entity_id: &str,
        qos_id: &str,
    ) -> Result<(), BusClientError> {
        let mut args = BTreeMap::new();
        args.insert("qos_id".to_string(), qos_id.to_string());
        args.insert(entity_key.to_string(), entity_id.to_string());
        debug!(request_id = ?ctx.request_id, method, topic = %self.topic, "fanout qos notification");
        self.transport.fanout(&self.topic, RpcEnvelope::request(method, args))
    }
}
