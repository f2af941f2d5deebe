use crate::types::DEFAULT_DAEMON_PORT;

/// Remote command lists run over ssh after the host becomes reachable.
///
/// `configure` runs once per instance creation; `update` runs after it and
/// again on every upgrade. Commands run in order and the first failure stops
/// the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionScript {
    pub configure: Vec<String>,
    pub update: Vec<String>,
}

impl ProvisionScript {
    /// Docker daemon setup listening on `0.0.0.0:<daemon_port>`.
    pub fn docker(daemon_port: u16) -> Self {
        Self {
            configure: vec![
                format!(
                    r#"sudo sed -i 's/DOCKER_OPTS=.*/DOCKER_OPTS="-H 0.0.0.0:{daemon_port}"/g' /etc/default/docker"#
                ),
                "sudo service docker restart".into(),
            ],
            update: vec![
                "sudo service docker stop".into(),
                "sleep 10".into(),
                "sudo wget https://get.docker.com/builds/Linux/x86_64/docker-latest -O /usr/bin/docker && sudo chmod +x /usr/bin/docker".into(),
                "sudo service docker start".into(),
            ],
        }
    }
}

impl Default for ProvisionScript {
    fn default() -> Self {
        Self::docker(DEFAULT_DAEMON_PORT)
    }
}
