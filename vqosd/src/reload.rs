use crate::policy_store::{BindingChange, PolicyStore, POLICY_STORE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use vqos_bus::{QosNotifier, RequestContext, SubscriberRegistry};
use vqos_utils::file_watcher::{FileWatcher, WatchedFileError};

/// Fires up a file system watcher on the policy file. Every observed
/// edit reloads the store and broadcasts the resulting binding changes
/// to the agents - this is the trigger the CRUD layer contract expects.
pub async fn policy_file_watcher(
    path: PathBuf,
    notifier: Arc<QosNotifier<SubscriberRegistry>>,
) {
    let _ = tokio::task::spawn_blocking(move || {
        info!("Watching for policy file changes");
        let _ = watch_for_policy_changes(path, notifier);
    });
}

fn watch_for_policy_changes(
    path: PathBuf,
    notifier: Arc<QosNotifier<SubscriberRegistry>>,
) -> Result<(), WatchedFileError> {
    let mut watcher = FileWatcher::new("policy file", path.clone());
    {
        let path = path.clone();
        let notifier = notifier.clone();
        watcher.set_file_exists_callback(move || load_policy_file(&path, &notifier));
    }
    {
        let path = path.clone();
        let notifier = notifier.clone();
        watcher.set_file_created_callback(move || load_policy_file(&path, &notifier));
    }
    {
        let path = path.clone();
        watcher.set_file_changed_callback(move || load_policy_file(&path, &notifier));
    }
    loop {
        let result = watcher.watch();
        info!("Policy file watcher returned: {result:?}");
    }
}

fn load_policy_file(path: &Path, notifier: &QosNotifier<SubscriberRegistry>) {
    match PolicyStore::load(path) {
        Ok(new_store) => {
            let changes = POLICY_STORE.read().diff(&new_store);
            *POLICY_STORE.write() = new_store;
            info!("Policy file loaded; {} binding change(s)", changes.len());
            announce(&changes, notifier);
        }
        Err(e) => {
            warn!("Policy file failed to load; keeping previous policies: {e}");
        }
    }
}

fn announce(changes: &[BindingChange], notifier: &QosNotifier<SubscriberRegistry>) {
    for change in changes {
        let ctx = RequestContext::new();
        let result = match change {
            BindingChange::NetworkUpdated { qos_id, network_id } => {
                notifier.network_qos_updated(&ctx, qos_id, network_id)
            }
            BindingChange::NetworkDeleted { qos_id, network_id } => {
                notifier.network_qos_deleted(&ctx, qos_id, network_id)
            }
            BindingChange::PortUpdated { qos_id, port_id } => {
                notifier.port_qos_updated(&ctx, qos_id, port_id)
            }
            BindingChange::PortDeleted { qos_id, port_id } => {
                notifier.port_qos_deleted(&ctx, qos_id, port_id)
            }
        };
        if let Err(e) = result {
            error!("Unable to broadcast QoS change {change:?}: {e}");
        }
    }
}
