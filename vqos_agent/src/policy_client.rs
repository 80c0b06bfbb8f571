// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use std::future::Future;
use vqos_bus::{BusClientError, PolicyAttribute, QosServerApi, RequestContext};

/// The synchronization core's view of the Policy Store Facade: fetch
/// the current attribute set for one QoS binding id. Always queried
/// fresh; the core caches enforcement state, never policy content.
pub trait PolicyClient: Send + Sync {
    /// Fetches the current policy for `qos_id`.
    fn get_policy_for_qos(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
    ) -> impl Future<Output = Result<Vec<PolicyAttribute>, BusClientError>> + Send;
}

/// The production [`PolicyClient`]: one bus call per fetch.
pub struct BusPolicyClient {
    api: QosServerApi,
}

impl BusPolicyClient {
    /// Creates a client talking to the given `vqosd` address.
    pub fn new(server_address: &str) -> Self {
        Self {
            api: QosServerApi::new(server_address),
        }
    }
}

impl PolicyClient for BusPolicyClient {
    async fn get_policy_for_qos(
        &self,
        ctx: &RequestContext,
        qos_id: &str,
    ) -> Result<Vec<PolicyAttribute>, BusClientError> {
        self.api.get_policy_for_qos(ctx, qos_id).await
    }
}
