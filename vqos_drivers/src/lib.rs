// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

//! Pluggable QoS enforcement backends. A driver translates the opaque
//! attribute set of a policy into control actions on one virtual-switch
//! port; the agent core selects a driver by its registered name and
//! never looks inside the attributes.
//!
//! The switch itself is reached through two narrow contracts: [`Bridge`]
//! for port resolution and [`FlowSink`] for flow programming. Both are
//! implemented by [`OvsBridge`] on real hosts and by hand-rolled fakes
//! in tests.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]

mod bridge;
mod driver;
mod openflow;

pub use bridge::{Bridge, OfPort, OvsBridge, VifPort, VlanTag};
pub use driver::{
    build_driver, driver_names, EnforcementError, NoopDriver, QosDriver, DRIVER_NOOP,
    DRIVER_OPENFLOW_VLAN,
};
pub use openflow::{FlowSink, FlowSpec, OpenflowVlanDriver};
