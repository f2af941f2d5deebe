use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::compute::ComputeApi;
use crate::controller::LifecycleController;
use crate::provision::ProvisionScript;
use crate::shell::{RemoteShell, SshShell, SshTarget, ssh_command};
use crate::types::{HostConfig, HostDescriptor, HostState, SSH_PORT};
use crate::waiter::OperationWaiter;
use crate::{Error, HostDriver, Result, auth};

pub const DRIVER_NAME: &str = "gce";

/// Compute Engine host driver: one instance plus its persistent boot disk.
///
/// `stop` deletes the instance and keeps the disk, `start` recreates the
/// instance on the same disk, `remove` deletes both.
pub struct GceDriver {
    host: HostDescriptor,
    controller: LifecycleController,
}

impl GceDriver {
    pub fn new(
        host: HostDescriptor,
        compute: Arc<dyn ComputeApi>,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        let controller = LifecycleController::new(compute, shell)
            .with_script(ProvisionScript::docker(host.daemon_port()));
        Self { host, controller }
    }

    /// Validate `config`, obtain an access token from its store directory and
    /// wire up the real API client and ssh shell.
    pub async fn connect(config: &HostConfig) -> Result<Self> {
        let host = HostDescriptor::new(config)?;
        let token = auth::obtain_token(&config.store_path).await?;
        let client = gce_api::ComputeClient::new(token, host.project(), host.zone());

        info!(
            project = host.project(),
            zone = host.zone(),
            instance = host.instance_name(),
            "gce driver ready"
        );
        Ok(Self::new(host, Arc::new(client), Arc::new(SshShell::new())))
    }

    pub fn with_waiter(mut self, waiter: OperationWaiter) -> Self {
        self.controller = self.controller.with_waiter(waiter);
        self
    }

    pub fn with_script(mut self, script: ProvisionScript) -> Self {
        self.controller = self.controller.with_script(script);
        self
    }

    pub fn host(&self) -> &HostDescriptor {
        &self.host
    }

    async fn create_instance(&self) -> Result<()> {
        self.controller
            .create_instance(
                &self.host,
                self.host.public_key_path(),
                self.host.private_key_path(),
                self.host.machine_type(),
            )
            .await
    }

    fn ssh_target<'a>(&'a self, address: &'a str) -> SshTarget<'a> {
        SshTarget {
            address,
            port: SSH_PORT,
            user: self.host.user_name(),
            private_key: self.host.private_key_path(),
        }
    }
}

#[async_trait]
impl HostDriver for GceDriver {
    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    async fn create(&self) -> Result<()> {
        let name = self.host.instance_name();
        info!(instance = name, "creating gce host");

        if self.controller.instance(&self.host).await?.is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        if self.controller.disk(&self.host).await?.is_some() {
            warn!(
                disk = %self.host.disk_name(),
                "disk left over from a previous host will be reused"
            );
        }

        self.controller
            .shell()
            .generate_key_pair(self.host.private_key_path())
            .await?;

        self.create_instance().await
    }

    async fn start(&self) -> Result<()> {
        info!(instance = self.host.instance_name(), "starting gce host");
        self.create_instance().await
    }

    async fn stop(&self) -> Result<()> {
        info!(instance = self.host.instance_name(), "stopping gce host");
        self.controller.delete_instance(&self.host).await
    }

    async fn restart(&self) -> Result<()> {
        info!(instance = self.host.instance_name(), "restarting gce host");
        self.controller.delete_instance(&self.host).await?;
        self.create_instance().await
    }

    async fn remove(&self) -> Result<()> {
        info!(instance = self.host.instance_name(), "removing gce host");

        let instance_result = if self.state().await? == HostState::Running {
            self.controller.delete_instance(&self.host).await
        } else {
            Ok(())
        };
        if let Err(e) = &instance_result {
            error!(instance = self.host.instance_name(), error = %e, "error deleting instance");
        }

        self.controller.delete_disk(&self.host).await?;
        instance_result
    }

    async fn state(&self) -> Result<HostState> {
        self.controller.state(&self.host).await
    }

    async fn ip(&self) -> Result<String> {
        self.controller.ip(&self.host).await
    }

    async fn url(&self) -> Result<String> {
        let ip = self.ip().await?;
        Ok(format!("tcp://{ip}:{}", self.host.daemon_port()))
    }

    async fn upgrade(&self) -> Result<()> {
        let ip = self.ip().await?;
        self.controller.update_runtime(&self.ssh_target(&ip)).await
    }

    async fn ssh_command(&self, args: &[&str]) -> Result<Command> {
        let ip = self.ip().await?;
        Ok(ssh_command(&self.ssh_target(&ip), args))
    }
}
