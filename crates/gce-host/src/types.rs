use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_ZONE: &str = "us-central1-a";
pub const DEFAULT_MACHINE_TYPE: &str = "f1-micro";
pub const DEFAULT_INSTANCE_NAME: &str = "docker-host";
pub const DEFAULT_IMAGE: &str = "https://www.googleapis.com/compute/v1/projects/google-containers/global/images/container-vm-v20141016";
pub const DEFAULT_DAEMON_PORT: u16 = 2375;
pub const SSH_PORT: u16 = 22;

/// Caller-supplied host configuration, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub instance_name: String,
    pub zone: String,
    pub machine_type: String,
    pub user_name: String,
    pub project: String,
    /// Directory holding the SSH key pair and the cached credential.
    pub store_path: PathBuf,
    pub image: String,
    pub daemon_port: u16,
}

impl HostConfig {
    /// Create from env vars:
    ///
    /// - `GCE_PROJECT` (required)
    /// - `GCE_STORE_PATH` (required)
    /// - `GCE_ZONE` (default: `"us-central1-a"`)
    /// - `GCE_MACHINE_TYPE` (default: `"f1-micro"`)
    /// - `GCE_INSTANCE_NAME` (default: `"docker-host"`)
    /// - `GCE_USERNAME` (default: the current login name)
    /// - `GCE_IMAGE` (default: the container-vm base image)
    /// - `GCE_DAEMON_PORT` (default: `2375`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project = get("GCE_PROJECT").ok_or_else(|| Error::MissingEnv("GCE_PROJECT".into()))?;
        let store_path = get("GCE_STORE_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| Error::MissingEnv("GCE_STORE_PATH".into()))?;

        let login = if cfg!(windows) { "USERNAME" } else { "USER" };
        let user_name = get("GCE_USERNAME").or_else(|| get(login)).unwrap_or_default();

        let daemon_port = match get("GCE_DAEMON_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::InvalidConfig(format!("GCE_DAEMON_PORT={raw} is not a port")))?,
            None => DEFAULT_DAEMON_PORT,
        };

        Ok(Self {
            instance_name: get("GCE_INSTANCE_NAME").unwrap_or_else(|| DEFAULT_INSTANCE_NAME.into()),
            zone: get("GCE_ZONE").unwrap_or_else(|| DEFAULT_ZONE.into()),
            machine_type: get("GCE_MACHINE_TYPE").unwrap_or_else(|| DEFAULT_MACHINE_TYPE.into()),
            user_name,
            project,
            store_path,
            image: get("GCE_IMAGE").unwrap_or_else(|| DEFAULT_IMAGE.into()),
            daemon_port,
        })
    }
}

/// Identifies one logical host. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDescriptor {
    instance_name: String,
    zone: String,
    machine_type: String,
    project: String,
    user_name: String,
    image: String,
    daemon_port: u16,
    private_key_path: PathBuf,
    public_key_path: PathBuf,
}

impl HostDescriptor {
    pub fn new(config: &HostConfig) -> Result<Self> {
        if config.project.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "a project name is required (GCE_PROJECT)".into(),
            ));
        }
        if config.user_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "unable to determine the current username (set GCE_USERNAME)".into(),
            ));
        }
        if !is_valid_resource_name(&config.instance_name) {
            return Err(Error::InvalidConfig(format!(
                "instance name {:?} must be lowercase letters, digits or dashes, start with a letter and be at most 58 characters",
                config.instance_name
            )));
        }

        Ok(Self {
            instance_name: config.instance_name.clone(),
            zone: config.zone.clone(),
            machine_type: config.machine_type.clone(),
            project: config.project.clone(),
            user_name: config.user_name.clone(),
            image: config.image.clone(),
            daemon_port: config.daemon_port,
            private_key_path: config.store_path.join("id_rsa"),
            public_key_path: config.store_path.join("id_rsa.pub"),
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Boot disk name, derived from the instance name.
    pub fn disk_name(&self) -> String {
        format!("{}-disk", self.instance_name)
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn machine_type(&self) -> &str {
        &self.machine_type
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn daemon_port(&self) -> u16 {
        self.daemon_port
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    pub fn public_key_path(&self) -> &Path {
        &self.public_key_path
    }
}

// Disk names append "-disk", so instance names keep 5 characters of the 63 limit free.
fn is_valid_resource_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some((&first, rest)) = bytes.split_first() else {
        return false;
    };
    bytes.len() <= 58
        && first.is_ascii_lowercase()
        && rest
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.last() != Some(&b'-')
}

/// Coarse lifecycle state derived from the disk and the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    None,
    Stopped,
    Starting,
    Running,
}

impl HostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
