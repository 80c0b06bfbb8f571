// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use crate::bridge::{OfPort, VlanTag};
use crate::openflow::{FlowSink, OpenflowVlanDriver};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use vqos_bus::PolicyAttribute;

/// A pluggable enforcement backend. Implementations translate a
/// policy's attribute set into their own switch-control mechanism.
///
/// `apply` must tolerate being invoked repeatedly with the same
/// arguments; the caller does not de-duplicate beyond its per-entity
/// cache marker. A failed `apply` must be reported - the caller leaves
/// the entity unmarked so it stays eligible for retry on the next
/// notification.
pub trait QosDriver: Send + Sync {
    /// The name this driver registers under.
    fn name(&self) -> &'static str;

    /// Pushes `attributes` onto one switch port within one VLAN segment.
    fn apply(
        &self,
        port: OfPort,
        vlan: VlanTag,
        attributes: &[PolicyAttribute],
    ) -> Result<(), EnforcementError>;

    /// Removes whatever `apply` installed for the port/VLAN pair.
    fn remove(&self, port: OfPort, vlan: VlanTag) -> Result<(), EnforcementError>;
}

/// Errors raised by enforcement backends.
#[derive(Error, Debug)]
pub enum EnforcementError {
    /// The switch refused or failed the flow change. Carries the
    /// rendered flow for the log.
    #[error("Flow programming failed: {0}")]
    FlowProgrammingFailed(String),
    /// The driver cannot express one of the policy attributes.
    #[error("Unsupported policy attribute: {0}")]
    UnsupportedAttribute(String),
}

/// Registered driver name: the OpenFlow VLAN-scoped reference driver.
pub const DRIVER_OPENFLOW_VLAN: &str = "openflow-vlan";
/// Registered driver name: accepts everything, programs nothing.
pub const DRIVER_NOOP: &str = "noop";

/// The names `build_driver` accepts, for config validation messages.
pub fn driver_names() -> &'static [&'static str] {
    &[DRIVER_OPENFLOW_VLAN, DRIVER_NOOP]
}

/// Builds the named driver over the given flow sink. Returns `None`
/// for unregistered names; drivers are registered here explicitly
/// rather than discovered by reflection.
pub fn build_driver(name: &str, sink: Arc<dyn FlowSink>) -> Option<Arc<dyn QosDriver>> {
    match name {
        DRIVER_OPENFLOW_VLAN => Some(Arc::new(OpenflowVlanDriver::new(sink))),
        DRIVER_NOOP => Some(Arc::new(NoopDriver)),
        _ => None,
    }
}

/// A driver that records nothing on the switch. Used on hosts that
/// participate in the notification fabric but do not enforce.
pub struct NoopDriver;

impl QosDriver for NoopDriver {
    fn name(&self) -> &'static str {
        DRIVER_NOOP
    }

    fn apply(
        &self,
        port: OfPort,
        vlan: VlanTag,
        attributes: &[PolicyAttribute],
    ) -> Result<(), EnforcementError> {
        debug!(
            "noop driver: would apply {} attribute(s) to port {} vlan {}",
            attributes.len(),
            port.0,
            vlan.0
        );
        Ok(())
    }

    fn remove(&self, port: OfPort, vlan: VlanTag) -> Result<(), EnforcementError> {
        debug!("noop driver: would clear port {} vlan {}", port.0, vlan.0);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::openflow::FlowSpec;

    struct SilentSink;
    impl FlowSink for SilentSink {
        fn add_flow(&self, _flow: &FlowSpec) -> Result<(), EnforcementError> {
            Ok(())
        }
        fn delete_flows(&self, _port: OfPort, _vlan: VlanTag) -> Result<(), EnforcementError> {
            Ok(())
        }
    }

    #[test]
    fn registry_resolves_known_names() {
        for name in driver_names() {
            let driver = build_driver(name, Arc::new(SilentSink)).expect("registered driver");
            assert_eq!(driver.name(), *name);
        }
    }

    #[test]
    fn registry_rejects_unknown_names() {
        assert!(build_driver("no-such-driver", Arc::new(SilentSink)).is_none());
    }

    #[test]
    fn noop_driver_accepts_everything() {
        let driver = NoopDriver;
        driver
            .apply(
                OfPort(1),
                VlanTag(7),
                &[vqos_bus::PolicyAttribute::new("dscp", "32")],
            )
            .expect("apply");
        driver.remove(OfPort(1), VlanTag(7)).expect("remove");
    }
}
