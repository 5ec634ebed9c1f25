//! Access to the BOSH director, the control plane this exporter polls.
//!
//! The [`Director`] trait is the seam between the snapshot pipeline and the
//! director transport. [`HttpDirector`] talks to a real director over its
//! JSON API; tests script responses with `testing::FakeDirector`.
use std::future::Future;

mod error;
mod http;
mod models;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use http::{Auth, HttpDirector, HttpDirectorBuilder};
pub use models::{
    CpuInfo, DeploymentHandle, DirectorInfo, DiskInfo, DisksInfo, LoadInfo, MemInfo,
    ProcessCpuInfo, ProcessInfo, ProcessMemInfo, ReleaseInfo, StemcellInfo, UptimeInfo,
    VitalsInfo, VmInfo,
};

/// Operations the exporter needs from the control plane.
///
/// Each call either succeeds with source records or fails with an [`Error`];
/// implementations enforce their own deadlines.
pub trait Director: Send + Sync + 'static {
    /// Returns name, uuid and version of the director.
    fn info(&self) -> impl Future<Output = Result<DirectorInfo>> + Send;

    /// Lists every deployment known to the director.
    fn deployments(&self) -> impl Future<Output = Result<Vec<DeploymentHandle>>> + Send;

    /// Resolves a single deployment by name.
    fn find_deployment(&self, name: &str)
    -> impl Future<Output = Result<DeploymentHandle>> + Send;

    fn instance_infos(
        &self,
        deployment: &DeploymentHandle,
    ) -> impl Future<Output = Result<Vec<VmInfo>>> + Send;

    fn releases(
        &self,
        deployment: &DeploymentHandle,
    ) -> impl Future<Output = Result<Vec<ReleaseInfo>>> + Send;

    fn stemcells(
        &self,
        deployment: &DeploymentHandle,
    ) -> impl Future<Output = Result<Vec<StemcellInfo>>> + Send;
}
