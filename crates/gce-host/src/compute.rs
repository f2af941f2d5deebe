use async_trait::async_trait;
use gce_api::{ComputeClient, Disk, Instance, Metadata, Operation};

/// Zonal Compute Engine calls the lifecycle controller depends on.
///
/// Implemented by [`gce_api::ComputeClient`]; tests substitute an in-memory
/// provider.
#[async_trait]
pub trait ComputeApi: Send + Sync + 'static {
    async fn get_disk(&self, name: &str) -> gce_api::Result<Disk>;

    async fn insert_disk(&self, disk: &Disk, source_image: &str) -> gce_api::Result<Operation>;

    async fn delete_disk(&self, name: &str) -> gce_api::Result<Operation>;

    async fn get_instance(&self, name: &str) -> gce_api::Result<Instance>;

    async fn insert_instance(&self, instance: &Instance) -> gce_api::Result<Operation>;

    async fn delete_instance(&self, name: &str) -> gce_api::Result<Operation>;

    /// Fails with 412 unless `metadata.fingerprint` matches the current one.
    async fn set_metadata(&self, instance: &str, metadata: &Metadata)
    -> gce_api::Result<Operation>;

    async fn get_operation(&self, name: &str) -> gce_api::Result<Operation>;

    /// Self-link prefix for zonal resources.
    fn zone_url(&self) -> String;

    /// Self-link prefix for global resources.
    fn global_url(&self) -> String;
}

#[async_trait]
impl ComputeApi for ComputeClient {
    async fn get_disk(&self, name: &str) -> gce_api::Result<Disk> {
        ComputeClient::get_disk(self, name).await
    }

    async fn insert_disk(&self, disk: &Disk, source_image: &str) -> gce_api::Result<Operation> {
        ComputeClient::insert_disk(self, disk, source_image).await
    }

    async fn delete_disk(&self, name: &str) -> gce_api::Result<Operation> {
        ComputeClient::delete_disk(self, name).await
    }

    async fn get_instance(&self, name: &str) -> gce_api::Result<Instance> {
        ComputeClient::get_instance(self, name).await
    }

    async fn insert_instance(&self, instance: &Instance) -> gce_api::Result<Operation> {
        ComputeClient::insert_instance(self, instance).await
    }

    async fn delete_instance(&self, name: &str) -> gce_api::Result<Operation> {
        ComputeClient::delete_instance(self, name).await
    }

    async fn set_metadata(
        &self,
        instance: &str,
        metadata: &Metadata,
    ) -> gce_api::Result<Operation> {
        ComputeClient::set_metadata(self, instance, metadata).await
    }

    async fn get_operation(&self, name: &str) -> gce_api::Result<Operation> {
        ComputeClient::get_zone_operation(self, name).await
    }

    fn zone_url(&self) -> String {
        ComputeClient::zone_url(self)
    }

    fn global_url(&self) -> String {
        ComputeClient::global_url(self)
    }
}
