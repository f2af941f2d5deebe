pub mod auth;
pub mod compute;
pub mod controller;
pub mod driver;
pub mod provision;
pub mod resources;
pub mod shell;
pub mod state;
pub mod types;
pub mod waiter;

#[cfg(test)]
mod testing;

use async_trait::async_trait;
use tokio::process::Command;

pub use compute::ComputeApi;
pub use controller::LifecycleController;
pub use driver::GceDriver;
pub use provision::ProvisionScript;
pub use shell::{RemoteShell, SshShell, SshTarget};
pub use types::{HostConfig, HostDescriptor, HostState};
pub use waiter::OperationWaiter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compute api error: {0}")]
    Transport(#[from] gce_api::Error),

    #[error("operation {operation} failed: {code}: {message}")]
    OperationFailed {
        operation: String,
        code: String,
        message: String,
    },

    #[error("failed to provision {resource}: {source}")]
    ProvisionFailed {
        resource: String,
        #[source]
        source: Box<Error>,
    },

    #[error("instance {0} already exists")]
    AlreadyExists(String),

    #[error("remote command {command:?} failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("instance {0} has no external address")]
    MissingAddress(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Verb surface a host-management tool drives.
///
/// Every verb re-reads provider state before acting; nothing about the
/// remote host is cached between calls.
#[async_trait]
pub trait HostDriver: Send + Sync {
    /// Driver identifier.
    fn driver_name(&self) -> &'static str;

    /// Provision disk and instance. Fails if the instance already exists.
    async fn create(&self) -> Result<()>;

    /// Recreate the instance on top of the existing disk.
    async fn start(&self) -> Result<()>;

    /// Delete the instance, keeping the disk.
    async fn stop(&self) -> Result<()>;

    /// Same as `stop`.
    async fn kill(&self) -> Result<()> {
        self.stop().await
    }

    /// Delete and recreate the instance, keeping the disk.
    async fn restart(&self) -> Result<()>;

    /// Delete the instance (when running) and the disk.
    async fn remove(&self) -> Result<()>;

    /// Logical lifecycle state derived from the provider.
    async fn state(&self) -> Result<HostState>;

    /// External address of the instance.
    async fn ip(&self) -> Result<String>;

    /// URL of the container daemon running on the host.
    async fn url(&self) -> Result<String>;

    /// Re-run the runtime update script on the host.
    async fn upgrade(&self) -> Result<()>;

    /// A ready-to-spawn ssh command targeting the host.
    async fn ssh_command(&self, args: &[&str]) -> Result<Command>;
}
