use crate::director;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list deployments: {0}")]
    ListDeployments(#[source] director::Error),
    #[error("failed to find deployment `{name}`: {source}")]
    FindDeployment {
        name: String,
        #[source]
        source: director::Error,
    },
    #[error("failed to fetch instances of deployment `{name}`: {source}")]
    Instances {
        name: String,
        #[source]
        source: director::Error,
    },
    #[error("failed to fetch releases of deployment `{name}`: {source}")]
    Releases {
        name: String,
        #[source]
        source: director::Error,
    },
    #[error("failed to fetch stemcells of deployment `{name}`: {source}")]
    Stemcells {
        name: String,
        #[source]
        source: director::Error,
    },
    #[error("fetch task of deployment `{name}` panicked")]
    TaskPanicked { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
