#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid director url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to read CA certificate `{path}`: {source}")]
    ReadCaCert {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build director client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to `{url}` failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to `{url}` returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to decode response from `{url}`: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("deployment `{0}` not found")]
    DeploymentNotFound(String),
    #[error("director task {id} finished in state `{state}`")]
    TaskFailed { id: u64, state: String },
    #[error("director task {id} did not finish within {timeout:?}")]
    TaskTimeout {
        id: u64,
        timeout: std::time::Duration,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
