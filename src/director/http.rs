use std::path::PathBuf;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::models::null_default;
use super::{
    DeploymentHandle, Director, DirectorInfo, Error, ReleaseInfo, Result, StemcellInfo, VmInfo,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Static credentials presented to the director on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Auth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}

/// A [`Director`] backed by the director's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpDirector {
    base: Url,
    client: reqwest::Client,
    auth: Auth,
    task_timeout: Duration,
    task_poll_interval: Duration,
}

#[derive(Debug)]
pub struct HttpDirectorBuilder {
    url: String,
    auth: Auth,
    ca_cert: Option<PathBuf>,
    timeout: Duration,
    task_timeout: Duration,
    task_poll_interval: Duration,
}

impl HttpDirectorBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: Auth::None,
            ca_cert: None,
            timeout: DEFAULT_TIMEOUT,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            task_poll_interval: DEFAULT_TASK_POLL_INTERVAL,
        }
    }

    pub fn set_auth(&mut self, auth: Auth) -> &mut Self {
        self.auth = auth;
        self
    }

    /// Trusts the PEM encoded CA certificate at `path` in addition to the system roots.
    pub fn set_ca_cert(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Sets the deadline of a single HTTP request.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long to wait for a director task (e.g. the instance listing) to finish.
    pub fn set_task_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.task_timeout = timeout;
        self
    }

    pub fn set_task_poll_interval(&mut self, interval: Duration) -> &mut Self {
        self.task_poll_interval = interval;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the url does not parse or is not `http(s)`.
    /// - [`Error::ReadCaCert`] if the CA certificate cannot be read.
    /// - [`Error::Client`] if the certificate is invalid or the TLS backend fails.
    pub fn build(self) -> Result<HttpDirector> {
        let mut base = Url::parse(&self.url).map_err(|source| Error::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                url: self.url,
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut client = reqwest::Client::builder().timeout(self.timeout);
        if let Some(path) = self.ca_cert {
            let pem = std::fs::read(&path).map_err(|source| Error::ReadCaCert {
                path: path.clone(),
                source,
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(Error::Client)?;
            client = client.add_root_certificate(cert);
        }

        Ok(HttpDirector {
            base,
            client: client.build().map_err(Error::Client)?,
            auth: self.auth,
            task_timeout: self.task_timeout,
            task_poll_interval: self.task_poll_interval,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentEntry {
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    releases: Vec<NameVersion>,
    #[serde(default, deserialize_with = "null_default")]
    stemcells: Vec<NameVersion>,
}

#[derive(Debug, Deserialize)]
struct NameVersion {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseVersionEntry {
    #[serde(default, deserialize_with = "null_default")]
    jobs: Vec<Named>,
    #[serde(default, deserialize_with = "null_default")]
    packages: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct StemcellEntry {
    name: String,
    version: String,
    #[serde(default, deserialize_with = "null_default")]
    operating_system: String,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    id: u64,
    state: String,
}

impl TaskEntry {
    fn is_finished(&self) -> bool {
        !matches!(self.state.as_str(), "queued" | "processing" | "cancelling")
    }
}

impl HttpDirector {
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // http(s) urls always have path segments; checked in `build`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = self.endpoint(segments);
        log::trace!("GET {url}");
        let request = self.client.get(url.clone()).query(query);
        let request = match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Bearer(token) => request.bearer_auth(token),
        };
        let response = request.send().await.map_err(|source| Error::Request {
            url: url.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }

    async fn get_bytes(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let response = self.get(segments, query).await?;
        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|source| Error::Request { url, source })?;
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.get_bytes(segments, query).await?;
        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            url: self.endpoint(segments).to_string(),
            source,
        })
    }

    async fn deployment_entry(&self, name: &str) -> Result<DeploymentEntry> {
        let entries: Vec<DeploymentEntry> = self.get_json(&["deployments"], &[]).await?;
        entries
            .into_iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Error::DeploymentNotFound(name.to_owned()))
    }

    async fn wait_for_task(&self, mut task: TaskEntry) -> Result<u64> {
        let started = tokio::time::Instant::now();
        loop {
            if task.is_finished() {
                if task.state == "done" {
                    return Ok(task.id);
                }
                return Err(Error::TaskFailed {
                    id: task.id,
                    state: task.state,
                });
            }
            if started.elapsed() >= self.task_timeout {
                return Err(Error::TaskTimeout {
                    id: task.id,
                    timeout: self.task_timeout,
                });
            }
            tokio::time::sleep(self.task_poll_interval).await;
            task = self.get_json(&["tasks", &task.id.to_string()], &[]).await?;
            log::trace!("director task {} is `{}`", task.id, task.state);
        }
    }
}

impl Director for HttpDirector {
    async fn info(&self) -> Result<DirectorInfo> {
        self.get_json(&["info"], &[]).await
    }

    async fn deployments(&self) -> Result<Vec<DeploymentHandle>> {
        let entries: Vec<DeploymentEntry> = self.get_json(&["deployments"], &[]).await?;
        Ok(entries
            .into_iter()
            .map(|entry| DeploymentHandle::new(entry.name))
            .collect())
    }

    async fn find_deployment(&self, name: &str) -> Result<DeploymentHandle> {
        match self.get(&["deployments", name], &[]).await {
            Ok(_) => Ok(DeploymentHandle::new(name)),
            Err(Error::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(Error::DeploymentNotFound(name.to_owned()))
            }
            Err(err) => Err(err),
        }
    }

    /// Runs the full instance listing as a director task and decodes its
    /// newline delimited result.
    async fn instance_infos(&self, deployment: &DeploymentHandle) -> Result<Vec<VmInfo>> {
        let task: TaskEntry = self
            .get_json(
                &["deployments", &deployment.name, "instances"],
                &[("format", "full")],
            )
            .await?;
        let id = self.wait_for_task(task).await?;
        let id = id.to_string();
        let segments = ["tasks", id.as_str(), "output"];
        let output = self.get_bytes(&segments, &[("type", "result")]).await?;

        output
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(|line| {
                serde_json::from_slice(line).map_err(|source| Error::Decode {
                    url: self.endpoint(&segments).to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn releases(&self, deployment: &DeploymentHandle) -> Result<Vec<ReleaseInfo>> {
        let entry = self.deployment_entry(&deployment.name).await?;
        let mut releases = Vec::with_capacity(entry.releases.len());
        for release in entry.releases {
            let details: ReleaseVersionEntry = self
                .get_json(
                    &["releases", &release.name],
                    &[("version", release.version.as_str())],
                )
                .await?;
            releases.push(ReleaseInfo {
                name: release.name,
                version: release.version,
                job_names: details.jobs.into_iter().map(|job| job.name).collect(),
                package_names: details.packages.into_iter().map(|pkg| pkg.name).collect(),
            });
        }
        Ok(releases)
    }

    async fn stemcells(&self, deployment: &DeploymentHandle) -> Result<Vec<StemcellInfo>> {
        let entry = self.deployment_entry(&deployment.name).await?;
        if entry.stemcells.is_empty() {
            return Ok(Vec::new());
        }
        let uploaded: Vec<StemcellEntry> = self.get_json(&["stemcells"], &[]).await?;
        Ok(entry
            .stemcells
            .into_iter()
            .map(|stemcell| {
                let os_name = uploaded
                    .iter()
                    .find(|u| u.name == stemcell.name && u.version == stemcell.version)
                    .map(|u| u.operating_system.clone())
                    .unwrap_or_default();
                StemcellInfo {
                    name: stemcell.name,
                    version: stemcell.version,
                    os_name,
                }
            })
            .collect())
    }
}
