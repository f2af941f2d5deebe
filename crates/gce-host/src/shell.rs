use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(windows)]
const DEV_NULL: &str = "NUL";
#[cfg(not(windows))]
const DEV_NULL: &str = "/dev/null";

/// Where and as whom remote commands run.
#[derive(Debug, Clone, Copy)]
pub struct SshTarget<'a> {
    pub address: &'a str,
    pub port: u16,
    pub user: &'a str,
    pub private_key: &'a Path,
}

/// Remote shell channel used to configure a host once it is reachable.
#[async_trait]
pub trait RemoteShell: Send + Sync + 'static {
    /// Block until a TCP connection to `address:port` succeeds.
    async fn wait_until_reachable(&self, address: &str, port: u16) -> Result<()>;

    /// Run one command; a non-zero exit is an [`Error::Command`].
    async fn run(&self, target: &SshTarget<'_>, command: &str) -> Result<()>;

    /// Create an RSA key pair at `private_key` (and `<private_key>.pub`)
    /// unless one is already there.
    async fn generate_key_pair(&self, private_key: &Path) -> Result<()>;
}

/// Build an `ssh` invocation for `target` running `args`.
pub fn ssh_command(target: &SshTarget<'_>, args: &[&str]) -> Command {
    let known_hosts = format!("UserKnownHostsFile={DEV_NULL}");
    let port = target.port.to_string();
    let key = target.private_key.to_string_lossy();
    let destination = format!("{}@{}", target.user, target.address);

    let mut cmd = Command::new("ssh");
    cmd.args([
        "-o",
        "StrictHostKeyChecking=no",
        "-o",
        known_hosts.as_str(),
        "-o",
        "LogLevel=ERROR",
        "-o",
        "BatchMode=yes",
        "-p",
        port.as_str(),
        "-i",
        &*key,
        destination.as_str(),
    ]);
    cmd.args(args);
    cmd
}

/// [`RemoteShell`] backed by the system `ssh` and `ssh-keygen` binaries.
#[derive(Debug, Clone, Default)]
pub struct SshShell;

impl SshShell {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn wait_until_reachable(&self, address: &str, port: u16) -> Result<()> {
        info!(address, port, "waiting for ssh");
        let addr = format!("{address}:{port}");
        loop {
            match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) => debug!(%addr, error = %e, "ssh port not reachable yet"),
                Err(_) => debug!(%addr, "ssh connect timed out"),
            }
            sleep(CONNECT_RETRY_INTERVAL).await;
        }
    }

    async fn run(&self, target: &SshTarget<'_>, command: &str) -> Result<()> {
        debug!(address = target.address, command, "running remote command");

        let output = ssh_command(target, &[command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Command {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn generate_key_pair(&self, private_key: &Path) -> Result<()> {
        if tokio::fs::try_exists(private_key).await? {
            debug!(path = %private_key.display(), "ssh key already present");
            return Ok(());
        }
        if let Some(parent) = private_key.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(path = %private_key.display(), "generating ssh key");
        let output = Command::new("ssh-keygen")
            .args(["-t", "rsa", "-N", "", "-q", "-f"])
            .arg(private_key)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Command {
                command: format!("ssh-keygen -f {}", private_key.display()),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
