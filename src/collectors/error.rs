use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create metric `{name}`: {source}")]
    Metric {
        name: String,
        #[source]
        source: prometheus::Error,
    },
    #[error("failed to encode target groups: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Publish(#[from] fsutil::AtomicWriteError),
}

pub type Result<T> = std::result::Result<T, Error>;
