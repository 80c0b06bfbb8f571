// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use dashmap::DashMap;
use std::sync::Arc;
use vqos_drivers::VlanTag;

/// Per-host mapping from network id to local VLAN segment. Owned by the
/// local networking layer; the synchronization core only reads it.
/// Clones share the same table, so the owning component can keep a
/// handle and mutate while the core holds its own.
#[derive(Clone, Default)]
pub struct VlanMap {
    map: Arc<DashMap<String, VlanTag>>,
}

impl VlanMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or replaces) a network's VLAN assignment.
    pub fn assign(&self, network_id: &str, tag: VlanTag) {
        self.map.insert(network_id.to_string(), tag);
    }

    /// Drops a network's VLAN assignment.
    pub fn forget(&self, network_id: &str) {
        self.map.remove(network_id);
    }

    /// The VLAN a network is carried on locally, if it is local at all.
    pub fn vlan_for(&self, network_id: &str) -> Option<VlanTag> {
        self.map.get(network_id).map(|entry| *entry)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assignments_are_shared_between_clones() {
        let owner = VlanMap::new();
        let reader = owner.clone();
        owner.assign("net1", VlanTag(101));
        assert_eq!(reader.vlan_for("net1"), Some(VlanTag(101)));
        owner.forget("net1");
        assert_eq!(reader.vlan_for("net1"), None);
    }
}
