// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::request::QOS_RPC_VERSION;
use serde::{Deserialize, Serialize};

/// One key/value pair of a QoS policy. The pairs are opaque to the
/// distribution layer and travel verbatim from the policy store to the
/// enforcement driver (e.g. `dscp` = `32`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PolicyAttribute {
    /// Attribute name.
    pub key: String,
    /// Attribute value, already rendered as a string.
    pub value: String,
}

impl PolicyAttribute {
    /// Convenience constructor.
    pub fn new<K: ToString, V: ToString>(key: K, value: V) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// A single reply, always generated in response to a [`crate::BusMessage`].
/// Carries the version token so the caller can detect skew.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BusReply {
    /// Version token; see [`QOS_RPC_VERSION`].
    pub version: String,
    /// The reply detail.
    pub body: ReplyBody,
}

impl BusReply {
    /// Wraps a body with the current version token.
    pub fn new(body: ReplyBody) -> Self {
        Self {
            version: QOS_RPC_VERSION.to_string(),
            body,
        }
    }
}

/// The possible reply details.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ReplyBody {
    /// The current attribute set for the requested QoS binding id.
    Policy(Vec<PolicyAttribute>),
    /// The server holds no policy under the requested id.
    NoSuchPolicy,
    /// A subscription request was accepted; fanout frames follow.
    Subscribed,
    /// The request was refused. The string names the reason.
    Fail(String),
}
