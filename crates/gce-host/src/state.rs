use gce_api::{Disk, Instance};

use crate::types::HostState;

/// Derive the logical state from the disk and instance lookups.
///
/// Once an instance exists its status alone decides; the disk only matters
/// when there is no instance.
pub fn derive(disk: Option<&Disk>, instance: Option<&Instance>) -> HostState {
    match (disk, instance) {
        (None, None) => HostState::None,
        (Some(_), None) => HostState::Stopped,
        (_, Some(instance)) => from_instance_status(&instance.status),
    }
}

/// Map a provider instance status onto a logical state. Unknown values map
/// to `None`.
pub fn from_instance_status(status: &str) -> HostState {
    match status {
        "PROVISIONING" | "STAGING" => HostState::Starting,
        "RUNNING" => HostState::Running,
        "STOPPING" | "STOPPED" | "TERMINATED" => HostState::Stopped,
        _ => HostState::None,
    }
}
