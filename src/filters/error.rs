#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid CIDR `{cidr}`: {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },
    #[error("invalid process name pattern `{pattern}`: {source}")]
    InvalidProcessPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("collector `{0}` is not supported")]
    UnsupportedCollector(String),
}

pub type Result<T> = std::result::Result<T, Error>;
