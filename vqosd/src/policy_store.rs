use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use vqos_bus::PolicyAttribute;

/// The daemon-wide authoritative policy state. Swapped wholesale when
/// the policy file reloads; readers always see one consistent version.
pub static POLICY_STORE: Lazy<RwLock<PolicyStore>> =
    Lazy::new(|| RwLock::new(PolicyStore::default()));

/// On-disk shape of the policy file.
#[derive(Deserialize, Clone, Debug)]
pub struct PolicyFile {
    #[serde(default)]
    pub policy: Vec<PolicyDef>,
    #[serde(default)]
    pub binding: Vec<BindingDef>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PolicyDef {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AttributeDef {
    pub key: String,
    pub value: String,
}

/// A binding names either a network or a port, never both. One policy
/// may be bound to any number of entities.
#[derive(Deserialize, Clone, Debug)]
pub struct BindingDef {
    pub qos_id: String,
    pub network_id: Option<String>,
    pub port_id: Option<String>,
}

/// Policies plus the binding tables, indexed for lookup and diffing.
#[derive(Default, Clone, Debug)]
pub struct PolicyStore {
    policies: BTreeMap<String, Vec<PolicyAttribute>>,
    network_bindings: BTreeMap<String, String>,
    port_bindings: BTreeMap<String, String>,
}

/// One operator-visible change between two policy file versions. The
/// reload path turns each of these into a fanout notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingChange {
    NetworkUpdated { qos_id: String, network_id: String },
    NetworkDeleted { qos_id: String, network_id: String },
    PortUpdated { qos_id: String, port_id: String },
    PortDeleted { qos_id: String, port_id: String },
}

impl PolicyStore {
    pub fn load(path: &Path) -> Result<Self, PolicyStoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PolicyStoreError::Unreadable(e.to_string()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, PolicyStoreError> {
        let file: PolicyFile =
            toml::from_str(raw).map_err(|e| PolicyStoreError::Invalid(e.to_string()))?;
        let mut store = Self::default();
        for policy in file.policy {
            let attributes = policy
                .attributes
                .into_iter()
                .map(|a| PolicyAttribute::new(a.key, a.value))
                .collect();
            store.policies.insert(policy.id, attributes);
        }
        for binding in file.binding {
            if !store.policies.contains_key(&binding.qos_id) {
                return Err(PolicyStoreError::UnknownPolicy(binding.qos_id));
            }
            match (binding.network_id, binding.port_id) {
                (Some(network_id), None) => {
                    store.network_bindings.insert(network_id, binding.qos_id);
                }
                (None, Some(port_id)) => {
                    store.port_bindings.insert(port_id, binding.qos_id);
                }
                _ => return Err(PolicyStoreError::InvalidBinding(binding.qos_id)),
            }
        }
        Ok(store)
    }

    /// The current attribute set for one QoS binding id. Fresh on every
    /// call; agents never see cached policy content.
    pub fn get_policy_for_qos(&self, qos_id: &str) -> Option<Vec<PolicyAttribute>> {
        self.policies.get(qos_id).cloned()
    }

    /// What changed between `self` (the previous version) and `new`.
    /// A binding counts as updated when it is new, points at a
    /// different policy, or its policy's attribute set changed.
    pub fn diff(&self, new: &PolicyStore) -> Vec<BindingChange> {
        let mut changes = Vec::new();

        for (network_id, qos_id) in &new.network_bindings {
            if self.binding_changed(&self.network_bindings, network_id, qos_id, new) {
                changes.push(BindingChange::NetworkUpdated {
                    qos_id: qos_id.clone(),
                    network_id: network_id.clone(),
                });
            }
        }
        for (network_id, qos_id) in &self.network_bindings {
            if !new.network_bindings.contains_key(network_id) {
                changes.push(BindingChange::NetworkDeleted {
                    qos_id: qos_id.clone(),
                    network_id: network_id.clone(),
                });
            }
        }
        for (port_id, qos_id) in &new.port_bindings {
            if self.binding_changed(&self.port_bindings, port_id, qos_id, new) {
                changes.push(BindingChange::PortUpdated {
                    qos_id: qos_id.clone(),
                    port_id: port_id.clone(),
                });
            }
        }
        for (port_id, qos_id) in &self.port_bindings {
            if !new.port_bindings.contains_key(port_id) {
                changes.push(BindingChange::PortDeleted {
                    qos_id: qos_id.clone(),
                    port_id: port_id.clone(),
                });
            }
        }
        changes
    }

    #[cfg(test)]
    pub fn insert_policy(&mut self, qos_id: &str, attributes: Vec<PolicyAttribute>) {
        self.policies.insert(qos_id.to_string(), attributes);
    }

    fn binding_changed(
        &self,
        old_bindings: &BTreeMap<String, String>,
        entity_id: &str,
        new_qos_id: &str,
        new: &PolicyStore,
    ) -> bool {
        match old_bindings.get(entity_id) {
            None => true,
            Some(old_qos_id) if old_qos_id != new_qos_id => true,
            Some(old_qos_id) => {
                self.policies.get(old_qos_id) != new.policies.get(new_qos_id)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum PolicyStoreError {
    #[error("Unable to read policy file: {0}")]
    Unreadable(String),
    #[error("Invalid policy file: {0}")]
    Invalid(String),
    #[error("Binding references unknown policy {0}")]
    UnknownPolicy(String),
    #[error("Binding for policy {0} must name exactly one of network_id or port_id")]
    InvalidBinding(String),
}

#[cfg(test)]
mod test {
    use super::*;

    const BASE: &str = r#"
[[policy]]
id = "qos-gold"
attributes = [ { key = "dscp", value = "32" } ]

[[policy]]
id = "qos-best-effort"
attributes = [ { key = "dscp", value = "0" } ]

[[binding]]
qos_id = "qos-gold"
network_id = "net1"

[[binding]]
qos_id = "qos-best-effort"
port_id = "port1"
"#;

    #[test]
    fn parse_and_lookup() {
        let store = PolicyStore::parse(BASE).unwrap();
        let attrs = store.get_policy_for_qos("qos-gold").unwrap();
        assert_eq!(attrs, vec![PolicyAttribute::new("dscp", "32")]);
        assert!(store.get_policy_for_qos("missing").is_none());
    }

    #[test]
    fn binding_must_name_one_entity() {
        let raw = r#"
[[policy]]
id = "qos-gold"

[[binding]]
qos_id = "qos-gold"
"#;
        assert!(matches!(
            PolicyStore::parse(raw),
            Err(PolicyStoreError::InvalidBinding(_))
        ));
    }

    #[test]
    fn binding_must_reference_a_policy() {
        let raw = r#"
[[binding]]
qos_id = "qos-ghost"
network_id = "net1"
"#;
        assert!(matches!(
            PolicyStore::parse(raw),
            Err(PolicyStoreError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn diff_from_empty_announces_everything() {
        let old = PolicyStore::default();
        let new = PolicyStore::parse(BASE).unwrap();
        let changes = old.diff(&new);
        assert_eq!(
            changes,
            vec![
                BindingChange::NetworkUpdated {
                    qos_id: "qos-gold".to_string(),
                    network_id: "net1".to_string(),
                },
                BindingChange::PortUpdated {
                    qos_id: "qos-best-effort".to_string(),
                    port_id: "port1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unchanged_file_produces_no_changes() {
        let old = PolicyStore::parse(BASE).unwrap();
        let new = PolicyStore::parse(BASE).unwrap();
        assert!(old.diff(&new).is_empty());
    }

    #[test]
    fn removed_binding_is_announced_as_deleted() {
        let old = PolicyStore::parse(BASE).unwrap();
        let raw = r#"
[[policy]]
id = "qos-gold"
attributes = [ { key = "dscp", value = "32" } ]

[[binding]]
qos_id = "qos-gold"
network_id = "net1"
"#;
        let new = PolicyStore::parse(raw).unwrap();
        let changes = old.diff(&new);
        assert_eq!(
            changes,
            vec![BindingChange::PortDeleted {
                qos_id: "qos-best-effort".to_string(),
                port_id: "port1".to_string(),
            }]
        );
    }

    #[test]
    fn attribute_change_reannounces_bound_entities() {
        let old = PolicyStore::parse(BASE).unwrap();
        let raw = BASE.replace("\"32\"", "\"46\"");
        let new = PolicyStore::parse(&raw).unwrap();
        let changes = old.diff(&new);
        assert_eq!(
            changes,
            vec![BindingChange::NetworkUpdated {
                qos_id: "qos-gold".to_string(),
                network_id: "net1".to_string(),
            }]
        );
    }

    #[test]
    fn rebinding_to_another_policy_is_an_update() {
        let old = PolicyStore::parse(BASE).unwrap();
        let raw = BASE.replace(
            "qos_id = \"qos-best-effort\"\nport_id",
            "qos_id = \"qos-gold\"\nport_id",
        );
        let new = PolicyStore::parse(&raw).unwrap();
        let changes = old.diff(&new);
        assert_eq!(
            changes,
            vec![BindingChange::PortUpdated {
                qos_id: "qos-gold".to_string(),
                port_id: "port1".to_string(),
            }]
        );
    }
}
