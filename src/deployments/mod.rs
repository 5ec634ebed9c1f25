//! Deployment snapshots and the fetcher that builds them once per scrape.
//!
//! A scrape starts with [`Fetcher::fetch`], which asks the director for the
//! selected deployments concurrently and normalizes the answers into
//! [`DeploymentSnapshot`]s. The result is wrapped in a [`Snapshot`] and shared
//! read-only with every collector of the scrape.
mod error;
mod fetcher;
mod model;

pub use error::{Error, Result};
pub use fetcher::{FetchOutcome, Fetcher, SkippedDeployment};
pub use model::{
    Cpu, DeploymentSnapshot, Disk, Disks, Instance, Memory, Process, Release, Stemcell, Vitals,
};

/// The topology captured by one scrape.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    deployments: Vec<DeploymentSnapshot>,
    complete: bool,
}

impl Snapshot {
    /// A snapshot of every deployment the director returned.
    pub fn new(deployments: Vec<DeploymentSnapshot>) -> Self {
        Self {
            deployments,
            complete: true,
        }
    }

    /// An empty snapshot standing in for a scrape whose deployment listing failed.
    pub fn incomplete() -> Self {
        Self {
            deployments: Vec::new(),
            complete: false,
        }
    }

    pub fn deployments(&self) -> &[DeploymentSnapshot] {
        &self.deployments
    }

    /// Returns `false` if the deployments could not be enumerated at all.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
