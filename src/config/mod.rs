//! Exporter configuration, read from `BOSH_EXPORTER_*` environment variables.
use std::path::PathBuf;
use std::time::Duration;

use crate::director::Auth;

mod error;

pub use error::{Error, Result};

const PREFIX: &str = "BOSH_EXPORTER_";

const DIRECTOR_URL: &str = "BOSH_EXPORTER_DIRECTOR_URL";
const DIRECTOR_USERNAME: &str = "BOSH_EXPORTER_DIRECTOR_USERNAME";
const DIRECTOR_PASSWORD: &str = "BOSH_EXPORTER_DIRECTOR_PASSWORD";
const DIRECTOR_TOKEN: &str = "BOSH_EXPORTER_DIRECTOR_TOKEN";
const DIRECTOR_CA_CERT: &str = "BOSH_EXPORTER_DIRECTOR_CA_CERT";
const DIRECTOR_TIMEOUT_SECS: &str = "BOSH_EXPORTER_DIRECTOR_TIMEOUT_SECS";
const DIRECTOR_TASK_TIMEOUT_SECS: &str = "BOSH_EXPORTER_DIRECTOR_TASK_TIMEOUT_SECS";
const FILTER_DEPLOYMENTS: &str = "BOSH_EXPORTER_FILTER_DEPLOYMENTS";
const FILTER_AZS: &str = "BOSH_EXPORTER_FILTER_AZS";
const FILTER_COLLECTORS: &str = "BOSH_EXPORTER_FILTER_COLLECTORS";
const FILTER_CIDRS: &str = "BOSH_EXPORTER_FILTER_CIDRS";
const FILTER_PROCESS_NAME: &str = "BOSH_EXPORTER_FILTER_PROCESS_NAME";
const METRICS_NAMESPACE: &str = "BOSH_EXPORTER_METRICS_NAMESPACE";
const METRICS_ENVIRONMENT: &str = "BOSH_EXPORTER_METRICS_ENVIRONMENT";
const SD_FILENAME: &str = "BOSH_EXPORTER_SD_FILENAME";
const LISTEN_ADDRESS: &str = "BOSH_EXPORTER_LISTEN_ADDRESS";
const METRICS_PATH: &str = "BOSH_EXPORTER_METRICS_PATH";
const MAX_CONCURRENT_FETCHES: &str = "BOSH_EXPORTER_MAX_CONCURRENT_FETCHES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorConfig {
    pub url: String,
    pub auth: Auth,
    pub ca_cert: Option<PathBuf>,
    pub timeout: Duration,
    pub task_timeout: Duration,
}

/// Raw filter settings. All lists are trimmed and empty means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub deployments: Vec<String>,
    pub azs: Vec<String>,
    pub collectors: Vec<String>,
    pub cidrs: Vec<String>,
    pub process_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub director: DirectorConfig,
    pub filters: FilterConfig,
    pub namespace: String,
    pub environment: String,
    pub sd_filename: PathBuf,
    pub listen_address: String,
    pub metrics_path: String,
    pub max_concurrent_fetches: Option<usize>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// - [`Error::Missing`] if the director url or the environment is not set.
    /// - [`Error::InvalidNumber`] if a timeout or limit is not a number.
    /// - [`Error::Incomplete`] if only one of username and password is set.
    /// - [`Error::InvalidMetricsPath`] if the metrics path is not absolute or is `/`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let list = |key: &str| split_list(get(key).as_deref().unwrap_or_default());
        let number = |key: &'static str| -> Result<Option<u64>> {
            get(key)
                .map(|value| {
                    value
                        .parse()
                        .map_err(|source| Error::InvalidNumber { key, value, source })
                })
                .transpose()
        };

        let auth = match (get(DIRECTOR_TOKEN), get(DIRECTOR_USERNAME), get(DIRECTOR_PASSWORD)) {
            (Some(token), _, _) => Auth::Bearer(token),
            (None, Some(username), Some(password)) => Auth::Basic { username, password },
            (None, Some(_), None) => {
                return Err(Error::Incomplete(DIRECTOR_USERNAME, DIRECTOR_PASSWORD));
            }
            (None, None, Some(_)) => {
                return Err(Error::Incomplete(DIRECTOR_PASSWORD, DIRECTOR_USERNAME));
            }
            (None, None, None) => Auth::None,
        };

        let director = DirectorConfig {
            url: get(DIRECTOR_URL).ok_or(Error::Missing(DIRECTOR_URL))?,
            auth,
            ca_cert: get(DIRECTOR_CA_CERT).map(PathBuf::from),
            timeout: Duration::from_secs(number(DIRECTOR_TIMEOUT_SECS)?.unwrap_or(30)),
            task_timeout: Duration::from_secs(number(DIRECTOR_TASK_TIMEOUT_SECS)?.unwrap_or(300)),
        };

        let cidrs = match get(FILTER_CIDRS) {
            Some(cidrs) => split_list(&cidrs),
            None => vec!["0.0.0.0/0".to_owned()],
        };
        let filters = FilterConfig {
            deployments: list(FILTER_DEPLOYMENTS),
            azs: list(FILTER_AZS),
            collectors: list(FILTER_COLLECTORS),
            cidrs,
            process_names: get(FILTER_PROCESS_NAME).into_iter().collect(),
        };

        let metrics_path = get(METRICS_PATH).unwrap_or_else(|| "/metrics".to_owned());
        if !metrics_path.starts_with('/') || metrics_path == "/" {
            return Err(Error::InvalidMetricsPath(metrics_path));
        }

        let max_concurrent_fetches = number(MAX_CONCURRENT_FETCHES)?
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(Self {
            director,
            filters,
            namespace: get(METRICS_NAMESPACE).unwrap_or_else(|| "bosh".to_owned()),
            environment: get(METRICS_ENVIRONMENT).ok_or(Error::Missing(METRICS_ENVIRONMENT))?,
            sd_filename: get(SD_FILENAME)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("bosh_target_groups.json")),
            listen_address: get(LISTEN_ADDRESS).unwrap_or_else(|| "0.0.0.0:9190".to_owned()),
            metrics_path,
            max_concurrent_fetches,
        })
    }
}

/// Splits a comma separated list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Names of all variables read by [`Config::from_env`] that are set, for logging.
pub fn configured_keys() -> Vec<String> {
    std::env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with(PREFIX))
        .collect()
}
