// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

pub(crate) mod client;
pub(crate) mod context;
pub(crate) mod notifier;
pub(crate) mod protocol;
pub(crate) mod reply;
pub(crate) mod request;
pub(crate) mod server;
pub(crate) mod session;
pub(crate) mod subscription;

use thiserror::Error;

/// Errors raised by the client side of the bus.
#[derive(Error, Debug)]
pub enum BusClientError {
    /// Unable to reach the bus server.
    #[error("Cannot connect to the bus server")]
    ConnectError,
    /// The magic-number handshake failed.
    #[error("Bus handshake failed")]
    HandshakeError,
    /// A payload could not be serialized.
    #[error("Unable to encode payload")]
    EncodingError,
    /// A payload could not be deserialized.
    #[error("Unable to decode payload")]
    DecodingError,
    /// Reading from the stream failed (includes the peer closing it).
    #[error("Unable to read from the bus stream")]
    StreamReadError,
    /// Writing to the stream failed.
    #[error("Unable to write to the bus stream")]
    StreamWriteError,
    /// The peer spoke an RPC version we do not recognize.
    #[error("Unrecognized RPC version: {0}")]
    VersionMismatch(String),
    /// The server holds no policy under the requested id.
    #[error("No such QoS policy")]
    NoSuchPolicy,
    /// The server refused the request.
    #[error("Request refused by the server: {0}")]
    Rejected(String),
    /// The server answered with a reply shape we did not ask for.
    #[error("Unexpected reply from the server")]
    UnexpectedReply,
}
