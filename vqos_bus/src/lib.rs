// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

//! The `vqos_bus` crate provides the RPC channel between `vqosd` (the
//! central policy daemon) and the per-host `vqos_agentd` agents.
//!
//! Two message shapes travel over the channel, each carrying the shared
//! [`QOS_RPC_VERSION`] token:
//!
//! * unicast request/response - an agent connects, sends a single
//!   [`RpcEnvelope`] call (serialized with CBOR, framed into
//!   length-prefixed chunks), and receives a [`BusReply`];
//! * fanout broadcast - an agent subscribes to a topic and the server
//!   pushes one [`RpcEnvelope`] per frame to every subscriber of that
//!   topic, with no acknowledgment and no redelivery.
//!
//! QoS traffic is isolated from other RPC traffic sharing a base topic
//! by deriving the fanout topic with [`qos_update_topic`].

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
mod bus;

pub use bus::client::{QosServerApi, call_server};
pub use bus::context::RequestContext;
pub use bus::notifier::{Fanout, QosNotifier};
pub use bus::reply::{BusReply, PolicyAttribute, ReplyBody};
pub use bus::request::{
    GET_POLICY_FOR_QOS, NETWORK_QOS_DELETED, NETWORK_QOS_UPDATED, PORT_QOS_DELETED,
    PORT_QOS_UPDATED, QOS_RPC_VERSION, QOS_TOPIC_SUFFIX, RpcEnvelope, qos_update_topic,
};
pub use bus::server::{BusServer, BusServerError, SubscriberRegistry};
pub use bus::session::BusMessage;
pub use bus::subscription::Subscription;
pub use bus::BusClientError;
