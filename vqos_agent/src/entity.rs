// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use std::fmt;

/// A QoS binding target. Network and port ids live in separate
/// identifier spaces; tagging the cache key keeps them from colliding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// A network, identified fleet-wide.
    Network(String),
    /// A port, identified fleet-wide.
    Port(String),
}

impl EntityRef {
    /// A network reference.
    pub fn network<S: ToString>(id: S) -> Self {
        Self::Network(id.to_string())
    }

    /// A port reference.
    pub fn port<S: ToString>(id: S) -> Self {
        Self::Port(id.to_string())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Network(id) => write!(f, "network {id}"),
            Self::Port(id) => write!(f, "port {id}"),
        }
    }
}
