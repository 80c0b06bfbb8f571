// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::request::RpcEnvelope;
use serde::{Deserialize, Serialize};

/// What a connecting client wants from the bus server. The first frame
/// of a connection carries one of these; `Call` connections may send
/// further calls on the same stream, `Subscribe` connections switch to
/// receiving pushed envelopes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum BusMessage {
    /// A unicast request, answered synchronously with a
    /// [`crate::BusReply`].
    Call(RpcEnvelope),
    /// Register for fanout broadcasts on a topic.
    Subscribe {
        /// The full topic name, e.g. `<base>-qoss-update`.
        topic: String,
    },
}
