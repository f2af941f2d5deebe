//! Fresh reads of the host's disk and instance.
//!
//! A provider "not found" is ordinary data here and comes back as `None`.

use gce_api::{Disk, Instance};

use crate::Result;
use crate::compute::ComputeApi;
use crate::types::HostDescriptor;

pub async fn disk(compute: &dyn ComputeApi, host: &HostDescriptor) -> Result<Option<Disk>> {
    absent_if_not_found(compute.get_disk(&host.disk_name()).await)
}

pub async fn instance(compute: &dyn ComputeApi, host: &HostDescriptor) -> Result<Option<Instance>> {
    absent_if_not_found(compute.get_instance(host.instance_name()).await)
}

fn absent_if_not_found<T>(result: gce_api::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(resource) => Ok(Some(resource)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
