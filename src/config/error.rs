use std::num::ParseIntError;

/// Errors that may occur while reading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `{0}` must be set")]
    Missing(&'static str),
    #[error("invalid value `{value}` for `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("`{0}` must be set together with `{1}`")]
    Incomplete(&'static str, &'static str),
    #[error("metrics path `{0}` must start with `/` and not be the landing page")]
    InvalidMetricsPath(String),
}

pub type Result<T> = std::result::Result<T, Error>;
