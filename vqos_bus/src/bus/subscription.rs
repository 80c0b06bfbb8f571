// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::protocol::{
    client_handshake, decode_envelope, decode_reply, encode_message, read_frame, write_frame,
};
use super::reply::ReplyBody;
use super::request::RpcEnvelope;
use super::session::BusMessage;
use super::BusClientError;
use tokio::net::TcpStream;
use tracing::error;

/// A persistent fanout subscription. Holds its connection open and
/// yields pushed envelopes one at a time; when the server goes away the
/// next `recv` fails and the caller is expected to reconnect.
pub struct Subscription {
    stream: TcpStream,
}

impl Subscription {
    /// Connects to the bus server and subscribes to `topic`.
    pub async fn connect(address: &str, topic: &str) -> Result<Self, BusClientError> {
        let mut stream = TcpStream::connect(address).await.map_err(|e| {
            error!("Unable to connect to bus server {address}: {e:?}");
            BusClientError::ConnectError
        })?;
        client_handshake(&mut stream).await?;

        let payload = encode_message(&BusMessage::Subscribe {
            topic: topic.to_string(),
        })?;
        write_frame(&mut stream, 0, &payload).await?;

        let (_, bytes) = read_frame(&mut stream).await?;
        let reply = decode_reply(&bytes)?;
        match reply.body {
            ReplyBody::Subscribed => Ok(Self { stream }),
            ReplyBody::Fail(reason) => Err(BusClientError::Rejected(reason)),
            _ => Err(BusClientError::UnexpectedReply),
        }
    }

    /// Waits for the next pushed notification envelope.
    pub async fn recv(&mut self) -> Result<RpcEnvelope, BusClientError> {
        let (_, bytes) = read_frame(&mut self.stream).await?;
        decode_envelope(&bytes)
    }
}
