// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

//! The agent-side synchronization core. Keeps one per-host view of
//! "which entities currently have an enforced QoS state", converging it
//! against the central policy store whenever a change notification
//! arrives on the bus.
//!
//! Convergence is eventual and notification-driven: a lost delete
//! leaves a stale cache entry until the entity's next notification, a
//! lost update leaves a port unprotected until the next policy
//! mutation. Nothing here retries; redelivery is the business of
//! whatever re-announces policy (e.g. an operator edit of the policy
//! file on the server).

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]

mod dispatch;
mod entity;
mod policy_client;
mod sync;
mod vlan_map;

pub use dispatch::run_subscription;
pub use entity::EntityRef;
pub use policy_client::{BusPolicyClient, PolicyClient};
pub use sync::{AgentError, QosAgent};
pub use vlan_map::VlanMap;
