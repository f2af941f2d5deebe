//! Typed Rust client for the Compute Engine v1 API.
//!
//! Covers the zonal subset needed to run a single host:
//! disks (get, insert, delete), instances (get, insert, delete, setMetadata)
//! and zone operations (get).

mod types;

pub use types::*;

const BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compute api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("compute api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl Error {
    /// Whether the provider answered "no such resource".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
    }

    /// Whether the provider rejected a write because its fingerprint was stale.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == reqwest::StatusCode::PRECONDITION_FAILED)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the Compute Engine REST API, scoped to one project and zone.
#[derive(Clone)]
pub struct ComputeClient {
    token: String,
    project: String,
    zone: String,
    base_url: String,
    http: reqwest::Client,
}

impl ComputeClient {
    pub fn new(
        token: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            project: project.into(),
            zone: zone.into(),
            base_url: BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API root (emulators, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Self-link prefix for zonal resources (machine types, disks).
    pub fn zone_url(&self) -> String {
        format!("{}/projects/{}/zones/{}", self.base_url, self.project, self.zone)
    }

    /// Self-link prefix for global resources (networks, images).
    pub fn global_url(&self) -> String {
        format!("{}/projects/{}/global", self.base_url, self.project)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.zone_url())
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    // ── Disks ────────────────────────────────────────────────────────

    pub async fn get_disk(&self, name: &str) -> Result<Disk> {
        let resp = self
            .http
            .get(self.url(&format!("/disks/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get disk")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// Create a persistent disk seeded from `source_image`.
    pub async fn insert_disk(&self, disk: &Disk, source_image: &str) -> Result<Operation> {
        let resp = self
            .http
            .post(self.url("/disks"))
            .header("Authorization", self.auth())
            .query(&[("sourceImage", source_image)])
            .json(disk)
            .send()
            .await?;

        Self::check(resp, "insert disk")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_disk(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .delete(self.url(&format!("/disks/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "delete disk")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Instances ────────────────────────────────────────────────────

    pub async fn get_instance(&self, name: &str) -> Result<Instance> {
        let resp = self
            .http
            .get(self.url(&format!("/instances/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn insert_instance(&self, instance: &Instance) -> Result<Operation> {
        let resp = self
            .http
            .post(self.url("/instances"))
            .header("Authorization", self.auth())
            .json(instance)
            .send()
            .await?;

        Self::check(resp, "insert instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_instance(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .delete(self.url(&format!("/instances/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "delete instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// Replace the instance metadata. `metadata.fingerprint` must match the
    /// value last read from the instance or the provider answers 412.
    pub async fn set_metadata(&self, instance: &str, metadata: &Metadata) -> Result<Operation> {
        let resp = self
            .http
            .post(self.url(&format!("/instances/{instance}/setMetadata")))
            .header("Authorization", self.auth())
            .json(metadata)
            .send()
            .await?;

        Self::check(resp, "set metadata")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Operations ───────────────────────────────────────────────────

    pub async fn get_zone_operation(&self, name: &str) -> Result<Operation> {
        let resp = self
            .http
            .get(self.url(&format!("/operations/{name}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "get zone operation")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }
}
