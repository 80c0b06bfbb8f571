// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::context::RequestContext;
use super::protocol::{client_handshake, decode_reply, encode_message, read_frame, write_frame};
use super::reply::{BusReply, PolicyAttribute, ReplyBody};
use super::request::{RpcEnvelope, QOS_RPC_VERSION};
use super::session::BusMessage;
use super::BusClientError;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tracing::{debug, error, warn};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Sends one unicast call to the bus server at `address` and waits for
/// its reply. A fresh connection is made for every call; agents issue
/// these rarely (one per update notification), so connection reuse
/// isn't worth the bookkeeping.
pub async fn call_server(
    address: &str,
    envelope: &RpcEnvelope,
) -> Result<BusReply, BusClientError> {
    let mut stream = TcpStream::connect(address).await.map_err(|e| {
        error!("Unable to connect to bus server {address}: {e:?}");
        BusClientError::ConnectError
    })?;
    client_handshake(&mut stream).await?;

    let payload = encode_message(&BusMessage::Call(envelope.clone()))?;
    let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    write_frame(&mut stream, request_id, &payload).await?;

    let (_reply_id, bytes) = read_frame(&mut stream).await?;
    decode_reply(&bytes)
}

/// The agent's view of the server's policy store: always queried fresh,
/// so the staleness window is bounded by one round trip.
pub struct QosServerApi {
    server_address: String,
}

impl QosServerApi {
    /// Creates an API handle talking to the given `vqosd` address.
    pub fn new<S: ToString>(server_address: S) -> Self {
        Self {
            server_address: server_address.to_string(),
        }
    }

    /// Fetches the current attribute set for one QoS binding id.
    pub async fn get_policy_for_qos(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
    ) -> Result<Vec<PolicyAttribute>, BusClientError> {
        debug!(request_id = ?ctx.request_id, %qos_id, "fetching policy from server");
        let envelope = RpcEnvelope::get_policy_for_qos(qos_id);
        let reply = call_server(&self.server_address, &envelope).await?;
        if reply.version != QOS_RPC_VERSION {
            warn!(
                "Discarding reply with unrecognized RPC version {}",
                reply.version
            );
            return Err(BusClientError::VersionMismatch(reply.version));
        }
        match reply.body {
            ReplyBody::Policy(attributes) => Ok(attributes),
            ReplyBody::NoSuchPolicy => Err(BusClientError::NoSuchPolicy),
            ReplyBody::Fail(reason) => Err(BusClientError::Rejected(reason)),
            ReplyBody::Subscribed => Err(BusClientError::UnexpectedReply),
        }
    }
}
