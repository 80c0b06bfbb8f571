// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use super::reply::BusReply;
use super::request::RpcEnvelope;
use super::session::BusMessage;
use super::BusClientError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::error;

pub(crate) const BUS_CHUNK_SIZE: usize = 8 * 1024;
pub(crate) const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
pub(crate) const CHUNK_LEN_BYTES: usize = 4;

/// Sent by a connecting client before any frame.
pub(crate) const MAGIC_NUMBER: [u8; 4] = *b"VQOS";
/// Echoed by the server to accept the connection.
pub(crate) const MAGIC_RESPONSE: [u8; 4] = *b"SOQV";

pub(crate) fn encode_message(message: &BusMessage) -> Result<Vec<u8>, BusClientError> {
    serde_cbor::to_vec(message).map_err(|e| {
        error!("Unable to serialize bus message to CBOR: {:?}", e);
        BusClientError::EncodingError
    })
}

pub(crate) fn decode_message(bytes: &[u8]) -> Result<BusMessage, BusClientError> {
    serde_cbor::from_slice(bytes).map_err(|e| {
        error!("Unable to deserialize bus message from CBOR: {:?}", e);
        BusClientError::DecodingError
    })
}

pub(crate) fn encode_reply(reply: &BusReply) -> Result<Vec<u8>, BusClientError> {
    serde_cbor::to_vec(reply).map_err(|e| {
        error!("Unable to serialize reply to CBOR: {:?}", e);
        BusClientError::EncodingError
    })
}

pub(crate) fn decode_reply(bytes: &[u8]) -> Result<BusReply, BusClientError> {
    serde_cbor::from_slice(bytes).map_err(|e| {
        error!("Unable to deserialize reply from CBOR: {:?}", e);
        BusClientError::DecodingError
    })
}

pub(crate) fn encode_envelope(envelope: &RpcEnvelope) -> Result<Vec<u8>, BusClientError> {
    serde_cbor::to_vec(envelope).map_err(|e| {
        error!("Unable to serialize envelope to CBOR: {:?}", e);
        BusClientError::EncodingError
    })
}

pub(crate) fn decode_envelope(bytes: &[u8]) -> Result<RpcEnvelope, BusClientError> {
    serde_cbor::from_slice(bytes).map_err(|e| {
        error!("Unable to deserialize envelope from CBOR: {:?}", e);
        BusClientError::DecodingError
    })
}

/// Client half of the magic-number handshake.
pub(crate) async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
) -> Result<(), BusClientError> {
    stream
        .write_all(&MAGIC_NUMBER)
        .await
        .map_err(|_| BusClientError::HandshakeError)?;
    let mut magic_buf = [0u8; 4];
    stream
        .read_exact(&mut magic_buf)
        .await
        .map_err(|_| BusClientError::HandshakeError)?;
    if magic_buf != MAGIC_RESPONSE {
        return Err(BusClientError::HandshakeError);
    }
    Ok(())
}

/// Server half of the magic-number handshake.
pub(crate) async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
) -> Result<(), BusClientError> {
    let mut magic_buf = [0u8; 4];
    stream
        .read_exact(&mut magic_buf)
        .await
        .map_err(|_| BusClientError::HandshakeError)?;
    if magic_buf != MAGIC_NUMBER {
        return Err(BusClientError::HandshakeError);
    }
    stream
        .write_all(&MAGIC_RESPONSE)
        .await
        .map_err(|_| BusClientError::HandshakeError)?;
    Ok(())
}

/// Writes one frame: a request id, the total payload length, then the
/// payload as length-prefixed chunks.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request_id: u64,
    payload: &[u8],
) -> Result<(), BusClientError> {
    if payload.len() > MAX_FRAME_BYTES {
        error!(
            "Payload size {} exceeds MAX_FRAME_BYTES {}.",
            payload.len(),
            MAX_FRAME_BYTES
        );
        return Err(BusClientError::EncodingError);
    }

    let mut header = [0u8; 16];
    header[0..8].copy_from_slice(&request_id.to_le_bytes());
    header[8..16].copy_from_slice(&(payload.len() as u64).to_le_bytes());
    writer
        .write_all(&header)
        .await
        .map_err(|_| BusClientError::StreamWriteError)?;

    for chunk in payload.chunks(BUS_CHUNK_SIZE) {
        let mut len_buf = [0u8; CHUNK_LEN_BYTES];
        len_buf.copy_from_slice(&(chunk.len() as u32).to_le_bytes());
        writer
            .write_all(&len_buf)
            .await
            .map_err(|_| BusClientError::StreamWriteError)?;
        writer
            .write_all(chunk)
            .await
            .map_err(|_| BusClientError::StreamWriteError)?;
    }
    writer
        .flush()
        .await
        .map_err(|_| BusClientError::StreamWriteError)?;

    Ok(())
}

/// Reads one frame written by [`write_frame`]. Returns the request id
/// and the reassembled payload.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<(u64, Vec<u8>), BusClientError> {
    let request_id = reader
        .read_u64_le()
        .await
        .map_err(|_| BusClientError::StreamReadError)?;
    let payload_len = reader
        .read_u64_le()
        .await
        .map_err(|_| BusClientError::StreamReadError)? as usize;

    if payload_len == 0 {
        return Ok((request_id, Vec::new()));
    }
    if payload_len > MAX_FRAME_BYTES {
        error!(
            "Payload size {} exceeds MAX_FRAME_BYTES {}.",
            payload_len, MAX_FRAME_BYTES
        );
        return Err(BusClientError::DecodingError);
    }

    let mut payload = Vec::with_capacity(payload_len);
    let mut chunk_buf = vec![0u8; BUS_CHUNK_SIZE];
    while payload.len() < payload_len {
        let mut len_buf = [0u8; CHUNK_LEN_BYTES];
        reader
            .read_exact(&mut len_buf)
            .await
            .map_err(|_| BusClientError::StreamReadError)?;
        let chunk_len = u32::from_le_bytes(len_buf) as usize;
        if chunk_len == 0 || chunk_len > BUS_CHUNK_SIZE {
            error!("Invalid chunk length {} in frame.", chunk_len);
            return Err(BusClientError::DecodingError);
        }
        if chunk_len > payload_len - payload.len() {
            error!(
                "Chunk length {} exceeds remaining payload {}.",
                chunk_len,
                payload_len - payload.len()
            );
            return Err(BusClientError::DecodingError);
        }
        reader
            .read_exact(&mut chunk_buf[..chunk_len])
            .await
            .map_err(|_| BusClientError::StreamReadError)?;
        payload.extend_from_slice(&chunk_buf[..chunk_len]);
    }

    Ok((request_id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusReply, ReplyBody, RpcEnvelope};
    use tokio::io::{duplex, AsyncWriteExt};

    #[test]
    fn cbor_round_trip_call() {
        let message = BusMessage::Call(RpcEnvelope::get_policy_for_qos("fake-qos"));
        let bytes = encode_message(&message).expect("encode_message");
        let decoded = decode_message(&bytes).expect("decode_message");
        assert_eq!(decoded, message);
    }

    #[test]
    fn cbor_round_trip_subscribe() {
        let message = BusMessage::Subscribe {
            topic: "fake_topic-qoss-update".to_string(),
        };
        let bytes = encode_message(&message).expect("encode_message");
        let decoded = decode_message(&bytes).expect("decode_message");
        assert_eq!(decoded, message);
    }

    #[test]
    fn cbor_round_trip_reply() {
        let reply = BusReply::new(ReplyBody::Subscribed);
        let bytes = encode_reply(&reply).expect("encode_reply");
        let decoded = decode_reply(&bytes).expect("decode_reply");
        assert_eq!(decoded, reply);
    }

    #[tokio::test]
    async fn frame_round_trip_small_payload() {
        let (mut client, mut server) = duplex(128 * 1024);
        let payload = vec![0xAB; BUS_CHUNK_SIZE / 2];
        let expected = payload.clone();

        let write = async {
            write_frame(&mut client, 7, &payload)
                .await
                .expect("write_frame");
        };
        let read = async { read_frame(&mut server).await.expect("read_frame") };

        let (_, (request_id, read_payload)) = tokio::join!(write, read);
        assert_eq!(request_id, 7);
        assert_eq!(read_payload, expected);
    }

    #[tokio::test]
    async fn frame_round_trip_multi_chunk_payload() {
        let (mut client, mut server) = duplex(256 * 1024);
        let payload = vec![0xCD; BUS_CHUNK_SIZE * 10 + 123];
        let expected = payload.clone();

        let write = async {
            write_frame(&mut client, 11, &payload)
                .await
                .expect("write_frame");
        };
        let read = async { read_frame(&mut server).await.expect("read_frame") };

        let (_, (request_id, read_payload)) = tokio::join!(write, read);
        assert_eq!(request_id, 11);
        assert_eq!(read_payload, expected);
    }

    #[tokio::test]
    async fn frame_rejects_oversized_on_write() {
        let (mut client, _server) = duplex(128 * 1024);
        let payload = vec![0xEF; MAX_FRAME_BYTES + 1];
        let result = write_frame(&mut client, 1, &payload).await;
        assert!(matches!(result, Err(BusClientError::EncodingError)));
    }

    #[tokio::test]
    async fn frame_rejects_oversized_on_read() {
        let (mut client, mut server) = duplex(128 * 1024);
        let write = async {
            client.write_u64_le(5).await.expect("write request id");
            client
                .write_u64_le((MAX_FRAME_BYTES as u64) + 1)
                .await
                .expect("write oversized len");
        };
        let read = async { read_frame(&mut server).await };

        let (_, result) = tokio::join!(write, read);
        assert!(matches!(result, Err(BusClientError::DecodingError)));
    }

    #[tokio::test]
    async fn handshake_round_trip() {
        let (mut client, mut server) = duplex(1024);
        let (client_side, server_side) = tokio::join!(
            client_handshake(&mut client),
            server_handshake(&mut server)
        );
        client_side.expect("client handshake");
        server_side.expect("server handshake");
    }

    #[tokio::test]
    async fn handshake_rejects_wrong_magic() {
        let (mut client, mut server) = duplex(1024);
        let write = async {
            client.write_all(b"XXXX").await.expect("write magic");
        };
        let shake = async { server_handshake(&mut server).await };
        let (_, result) = tokio::join!(write, shake);
        assert!(matches!(result, Err(BusClientError::HandshakeError)));
    }
}
