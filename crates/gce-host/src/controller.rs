use std::path::Path;
use std::sync::Arc;

use gce_api::{AccessConfig, AttachedDisk, Disk, Instance, Metadata, MetadataItem, NetworkInterface};
use tracing::{debug, info, warn};

use crate::compute::ComputeApi;
use crate::provision::ProvisionScript;
use crate::shell::{RemoteShell, SshTarget};
use crate::types::{HostDescriptor, HostState, SSH_PORT};
use crate::waiter::OperationWaiter;
use crate::{Error, Result, resources, state};

const SSH_KEYS_METADATA_KEY: &str = "sshKeys";
const INSTANCE_DESCRIPTION: &str = "docker host vm";

/// Drives the disk and instance of one host through their lifecycle.
///
/// Every decision starts from a fresh provider read and every mutating call
/// is followed by a wait on the operation it returned. Nothing is retried and
/// partial progress is not rolled back.
pub struct LifecycleController {
    compute: Arc<dyn ComputeApi>,
    shell: Arc<dyn RemoteShell>,
    waiter: OperationWaiter,
    script: ProvisionScript,
}

impl LifecycleController {
    pub fn new(compute: Arc<dyn ComputeApi>, shell: Arc<dyn RemoteShell>) -> Self {
        Self {
            compute,
            shell,
            waiter: OperationWaiter::default(),
            script: ProvisionScript::default(),
        }
    }

    pub fn with_waiter(mut self, waiter: OperationWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_script(mut self, script: ProvisionScript) -> Self {
        self.script = script;
        self
    }

    pub fn shell(&self) -> &dyn RemoteShell {
        self.shell.as_ref()
    }

    pub async fn disk(&self, host: &HostDescriptor) -> Result<Option<Disk>> {
        resources::disk(self.compute.as_ref(), host).await
    }

    pub async fn instance(&self, host: &HostDescriptor) -> Result<Option<Instance>> {
        resources::instance(self.compute.as_ref(), host).await
    }

    pub async fn state(&self, host: &HostDescriptor) -> Result<HostState> {
        let disk = self.disk(host).await?;
        let instance = self.instance(host).await?;
        Ok(state::derive(disk.as_ref(), instance.as_ref()))
    }

    /// External address of the instance.
    pub async fn ip(&self, host: &HostDescriptor) -> Result<String> {
        let instance = self
            .compute
            .get_instance(host.instance_name())
            .await?;
        external_ip(host, &instance)
    }

    async fn wait(&self, operation: &str) -> Result<()> {
        self.waiter.wait(self.compute.as_ref(), operation).await
    }

    /// Create the boot disk from the base image.
    pub async fn create_disk(&self, host: &HostDescriptor) -> Result<()> {
        let disk_name = host.disk_name();
        info!(disk = %disk_name, image = host.image(), "creating disk");

        let result = async {
            let op = self
                .compute
                .insert_disk(
                    &Disk {
                        name: disk_name.clone(),
                        ..Default::default()
                    },
                    host.image(),
                )
                .await?;
            info!(disk = %disk_name, operation = %op.name, "waiting for disk");
            self.wait(&op.name).await
        }
        .await;

        result.map_err(|e| Error::ProvisionFailed {
            resource: format!("disk {disk_name}"),
            source: Box::new(e),
        })
    }

    /// Delete the boot disk. A disk that is already gone counts as deleted.
    pub async fn delete_disk(&self, host: &HostDescriptor) -> Result<()> {
        let disk_name = host.disk_name();
        info!(disk = %disk_name, "deleting disk");

        let op = match self.compute.delete_disk(&disk_name).await {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                warn!(disk = %disk_name, "disk already deleted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        info!(disk = %disk_name, operation = %op.name, "waiting for disk to delete");
        self.wait(&op.name).await
    }

    /// Delete the instance, leaving the disk. An instance that is already
    /// gone counts as deleted.
    pub async fn delete_instance(&self, host: &HostDescriptor) -> Result<()> {
        let name = host.instance_name();
        info!(instance = name, "deleting instance");

        let op = match self.compute.delete_instance(name).await {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                warn!(instance = name, "instance already deleted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        info!(instance = name, operation = %op.name, "waiting for instance to delete");
        self.wait(&op.name).await
    }

    /// Create the instance on top of the boot disk (creating the disk first
    /// if it does not exist), install the caller's public key and configure
    /// the container runtime over ssh.
    pub async fn create_instance(
        &self,
        host: &HostDescriptor,
        public_key: &Path,
        private_key: &Path,
        machine_type: &str,
    ) -> Result<()> {
        let name = host.instance_name();
        info!(instance = name, machine_type, "creating instance");

        if self.disk(host).await?.is_none() {
            self.create_disk(host).await?;
        } else {
            debug!(disk = %host.disk_name(), "reusing existing disk");
        }

        let op = self
            .compute
            .insert_instance(&self.instance_spec(host, machine_type))
            .await?;
        info!(instance = name, operation = %op.name, "waiting for instance");
        self.wait(&op.name).await?;

        let instance = self.compute.get_instance(name).await?;
        let ip = external_ip(host, &instance)?;
        self.shell.wait_until_reachable(&ip, SSH_PORT).await?;

        let key = tokio::fs::read_to_string(public_key).await?;
        self.push_ssh_key(host, &instance, &key).await?;

        let target = SshTarget {
            address: &ip,
            port: SSH_PORT,
            user: host.user_name(),
            private_key,
        };
        self.configure(&target).await?;
        self.update_runtime(&target).await
    }

    fn instance_spec(&self, host: &HostDescriptor, machine_type: &str) -> Instance {
        let zone_url = self.compute.zone_url();
        Instance {
            name: host.instance_name().to_string(),
            description: Some(INSTANCE_DESCRIPTION.into()),
            machine_type: format!("{zone_url}/machineTypes/{machine_type}"),
            disks: vec![AttachedDisk {
                boot: true,
                auto_delete: false,
                kind: "PERSISTENT".into(),
                mode: "READ_WRITE".into(),
                source: format!("{zone_url}/disks/{}", host.disk_name()),
            }],
            network_interfaces: vec![NetworkInterface {
                network: format!("{}/networks/default", self.compute.global_url()),
                access_configs: vec![AccessConfig {
                    kind: "ONE_TO_ONE_NAT".into(),
                    name: None,
                    nat_ip: None,
                }],
            }],
            ..Default::default()
        }
    }

    /// Write `public_key` into the instance's `sshKeys` metadata.
    ///
    /// The write carries the fingerprint observed on `instance`; if someone
    /// else changed the metadata since, the provider rejects it and the
    /// error is returned unchanged.
    pub async fn push_ssh_key(
        &self,
        host: &HostDescriptor,
        instance: &Instance,
        public_key: &str,
    ) -> Result<()> {
        let name = host.instance_name();
        info!(instance = name, "uploading ssh key");

        let current = instance.metadata.clone().unwrap_or_default();
        let mut items: Vec<MetadataItem> = current
            .items
            .into_iter()
            .filter(|item| item.key != SSH_KEYS_METADATA_KEY)
            .collect();
        items.push(MetadataItem {
            key: SSH_KEYS_METADATA_KEY.into(),
            value: format!("{}:{}\n", host.user_name(), public_key.trim_end()),
        });

        let op = self
            .compute
            .set_metadata(
                name,
                &Metadata {
                    fingerprint: current.fingerprint,
                    items,
                },
            )
            .await?;
        info!(instance = name, operation = %op.name, "waiting for ssh key");
        self.wait(&op.name).await
    }

    /// Run the configure script (daemon port, firewall) on the host.
    pub async fn configure(&self, target: &SshTarget<'_>) -> Result<()> {
        info!(address = target.address, "setting up instance");
        self.execute_commands(target, &self.script.configure).await
    }

    /// Run the runtime update script on the host.
    pub async fn update_runtime(&self, target: &SshTarget<'_>) -> Result<()> {
        info!(address = target.address, "updating container runtime");
        self.execute_commands(target, &self.script.update).await
    }

    async fn execute_commands(&self, target: &SshTarget<'_>, commands: &[String]) -> Result<()> {
        for command in commands {
            debug!(command = %command, "running command");
            self.shell.run(target, command).await?;
        }
        Ok(())
    }
}

fn external_ip(host: &HostDescriptor, instance: &Instance) -> Result<String> {
    instance
        .external_ip()
        .map(str::to_string)
        .ok_or_else(|| Error::MissingAddress(host.instance_name().to_string()))
}
