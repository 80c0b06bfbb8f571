// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::protocol::{
    decode_message, encode_envelope, encode_reply, read_frame, server_handshake, write_frame,
};
use super::reply::{BusReply, ReplyBody};
use super::request::RpcEnvelope;
use super::session::BusMessage;
use super::notifier::Fanout;
use super::BusClientError;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How many undelivered notifications a single subscriber may queue
/// before further ones are dropped for it. The channel is
/// fire-and-forget; a lagging agent converges on the next update.
const FANOUT_QUEUE_DEPTH: usize = 64;

/// Topic-keyed registry of live fanout subscribers. Cheap to clone;
/// clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    topics: Arc<DashMap<String, Vec<mpsc::Sender<RpcEnvelope>>>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber on `topic` and returns its queue.
    pub fn subscribe(&self, topic: &str) -> mpsc::Receiver<RpcEnvelope> {
        let (tx, rx) = mpsc::channel(FANOUT_QUEUE_DEPTH);
        self.topics.entry(topic.to_string()).or_default().push(tx);
        rx
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|subs| subs.len()).unwrap_or(0)
    }
}

impl Fanout for SubscriberRegistry {
    fn fanout(&self, topic: &str, envelope: RpcEnvelope) -> Result<(), BusClientError> {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.retain(|tx| match tx.try_send(envelope.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(topic, "Subscriber queue full; notification dropped for it");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
        Ok(())
    }
}

/// Implements a Tokio-friendly TCP server speaking the bus protocol.
/// Unicast calls are forwarded to the handler; subscription requests
/// are parked on the registry and fed pushed envelopes.
pub struct BusServer {
    bind_address: String,
}

impl BusServer {
    /// Creates a server that will bind `bind_address` when listening.
    pub fn new<S: ToString>(bind_address: S) -> Self {
        Self {
            bind_address: bind_address.to_string(),
        }
    }

    /// Start listening for bus traffic. Calls are answered through
    /// `handle_call`; each accepted connection runs on its own task.
    pub async fn listen(
        &self,
        handle_call: fn(&RpcEnvelope) -> BusReply,
        registry: SubscriberRegistry,
    ) -> Result<(), BusServerError> {
        let listener = TcpListener::bind(&self.bind_address).await.map_err(|e| {
            warn!("Unable to bind to {}: {e:?}", self.bind_address);
            BusServerError::BindFail
        })?;
        info!("Listening on: {}", self.bind_address);
        loop {
            let Ok((socket, peer)) = listener.accept().await else {
                warn!("Unable to accept connections on {}", self.bind_address);
                return Err(BusServerError::ListenFail);
            };
            debug!("Accepted bus connection from {peer}");
            let registry = registry.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_session(socket, handle_call, registry).await {
                    // Disconnections land here; the server remains alive.
                    debug!("Bus session ended: {e:?}");
                }
            });
        }
    }
}

/// Drives one client connection to completion: handshake, then either a
/// stream of calls or a long-lived subscription.
async fn handle_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut socket: S,
    handle_call: fn(&RpcEnvelope) -> BusReply,
    registry: SubscriberRegistry,
) -> Result<(), BusClientError> {
    server_handshake(&mut socket).await?;

    loop {
        let (request_id, bytes) = read_frame(&mut socket).await?;
        if bytes.is_empty() {
            warn!("Received empty request payload; closing client socket.");
            return Ok(());
        }
        match decode_message(&bytes)? {
            BusMessage::Call(envelope) => {
                debug!("Received call {} ({})", envelope.method, request_id);
                let reply = handle_call(&envelope);
                write_frame(&mut socket, request_id, &encode_reply(&reply)?).await?;
            }
            BusMessage::Subscribe { topic } => {
                debug!("Connection subscribed to {topic}");
                let mut queue = registry.subscribe(&topic);
                let ack = BusReply::new(ReplyBody::Subscribed);
                write_frame(&mut socket, request_id, &encode_reply(&ack)?).await?;

                // The connection now only receives pushes. Dropping the
                // queue receiver (on any write failure) unregisters the
                // subscriber at the next fanout.
                let mut push_id = 0u64;
                while let Some(envelope) = queue.recv().await {
                    push_id += 1;
                    write_frame(&mut socket, push_id, &encode_envelope(&envelope)?).await?;
                }
                return Ok(());
            }
        }
    }
}

/// Errors raised while serving the bus.
#[derive(Error, Debug)]
pub enum BusServerError {
    /// Cannot bind the TCP listener.
    #[error("Cannot bind bus listener")]
    BindFail,
    /// The listener stopped accepting connections.
    #[error("Cannot listen on bound socket")]
    ListenFail,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::protocol::{
        client_handshake, decode_envelope, decode_reply, encode_message, read_frame, write_frame,
    };
    use crate::{PolicyAttribute, GET_POLICY_FOR_QOS};

    fn test_handler(envelope: &RpcEnvelope) -> BusReply {
        if envelope.method == GET_POLICY_FOR_QOS && envelope.arg("qos_id") == Some("fake-qos") {
            BusReply::new(ReplyBody::Policy(vec![PolicyAttribute::new("dscp", "32")]))
        } else {
            BusReply::new(ReplyBody::NoSuchPolicy)
        }
    }

    #[tokio::test]
    async fn call_path_round_trip() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let registry = SubscriberRegistry::new();
        tokio::spawn(async move {
            let _ = handle_session(server, test_handler, registry).await;
        });

        client_handshake(&mut client).await.expect("handshake");
        let payload =
            encode_message(&BusMessage::Call(RpcEnvelope::get_policy_for_qos("fake-qos")))
                .expect("encode");
        write_frame(&mut client, 42, &payload).await.expect("write");

        let (reply_id, bytes) = read_frame(&mut client).await.expect("read");
        assert_eq!(reply_id, 42);
        let reply = decode_reply(&bytes).expect("decode");
        assert_eq!(
            reply.body,
            ReplyBody::Policy(vec![PolicyAttribute::new("dscp", "32")])
        );
    }

    #[tokio::test]
    async fn unknown_policy_refused() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let registry = SubscriberRegistry::new();
        tokio::spawn(async move {
            let _ = handle_session(server, test_handler, registry).await;
        });

        client_handshake(&mut client).await.expect("handshake");
        let payload =
            encode_message(&BusMessage::Call(RpcEnvelope::get_policy_for_qos("nope")))
                .expect("encode");
        write_frame(&mut client, 1, &payload).await.expect("write");

        let (_, bytes) = read_frame(&mut client).await.expect("read");
        let reply = decode_reply(&bytes).expect("decode");
        assert_eq!(reply.body, ReplyBody::NoSuchPolicy);
    }

    #[tokio::test]
    async fn subscribe_receives_fanout() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let registry = SubscriberRegistry::new();
        let broadcast_side = registry.clone();
        tokio::spawn(async move {
            let _ = handle_session(server, test_handler, registry).await;
        });

        client_handshake(&mut client).await.expect("handshake");
        let payload = encode_message(&BusMessage::Subscribe {
            topic: "fake_topic-qoss-update".to_string(),
        })
        .expect("encode");
        write_frame(&mut client, 1, &payload).await.expect("write");
        let (_, bytes) = read_frame(&mut client).await.expect("read ack");
        let ack = decode_reply(&bytes).expect("decode ack");
        assert_eq!(ack.body, ReplyBody::Subscribed);

        // Wait for the registration to land before broadcasting.
        while broadcast_side.subscriber_count("fake_topic-qoss-update") == 0 {
            tokio::task::yield_now().await;
        }
        let pushed = RpcEnvelope::get_policy_for_qos("fake-qos");
        broadcast_side
            .fanout("fake_topic-qoss-update", pushed.clone())
            .expect("fanout");

        let (_, bytes) = read_frame(&mut client).await.expect("read push");
        let envelope = decode_envelope(&bytes).expect("decode push");
        assert_eq!(envelope, pushed);
    }

    #[test]
    fn fanout_without_subscribers_is_a_no_op() {
        let registry = SubscriberRegistry::new();
        registry
            .fanout("empty-topic", RpcEnvelope::get_policy_for_qos("fake-qos"))
            .expect("fanout");
        assert_eq!(registry.subscriber_count("empty-topic"), 0);
    }
}
