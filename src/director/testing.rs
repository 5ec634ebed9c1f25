//! Scripted [`Director`] for tests.
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    DeploymentHandle, Director, DirectorInfo, Error, ReleaseInfo, Result, StemcellInfo, VmInfo,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDeployment {
    pub instances: Vec<VmInfo>,
    pub releases: Vec<ReleaseInfo>,
    pub stemcells: Vec<StemcellInfo>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeDirector {
    pub deployments: BTreeMap<String, FakeDeployment>,
    pub fail_listing: AtomicBool,
    pub failing_instances: HashSet<String>,
    pub failing_releases: HashSet<String>,
    pub failing_stemcells: HashSet<String>,
}

fn failure(what: &str, name: &str) -> Error {
    Error::TaskFailed {
        id: 0,
        state: format!("{what} of `{name}` failed"),
    }
}

impl FakeDirector {
    pub fn with_deployment(mut self, name: &str, deployment: FakeDeployment) -> Self {
        self.deployments.insert(name.to_owned(), deployment);
        self
    }

    fn lookup(&self, name: &str) -> Result<&FakeDeployment> {
        self.deployments
            .get(name)
            .ok_or_else(|| Error::DeploymentNotFound(name.to_owned()))
    }
}

impl Director for FakeDirector {
    async fn info(&self) -> Result<DirectorInfo> {
        Ok(DirectorInfo {
            name: "fake-director".to_owned(),
            uuid: "fake-uuid".to_owned(),
            version: "281.0.0".to_owned(),
        })
    }

    async fn deployments(&self) -> Result<Vec<DeploymentHandle>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(failure("listing", "deployments"));
        }
        Ok(self.deployments.keys().map(DeploymentHandle::new).collect())
    }

    async fn find_deployment(&self, name: &str) -> Result<DeploymentHandle> {
        self.lookup(name).map(|_| DeploymentHandle::new(name))
    }

    async fn instance_infos(&self, deployment: &DeploymentHandle) -> Result<Vec<VmInfo>> {
        if self.failing_instances.contains(&deployment.name) {
            return Err(failure("instances", &deployment.name));
        }
        Ok(self.lookup(&deployment.name)?.instances.clone())
    }

    async fn releases(&self, deployment: &DeploymentHandle) -> Result<Vec<ReleaseInfo>> {
        if self.failing_releases.contains(&deployment.name) {
            return Err(failure("releases", &deployment.name));
        }
        Ok(self.lookup(&deployment.name)?.releases.clone())
    }

    async fn stemcells(&self, deployment: &DeploymentHandle) -> Result<Vec<StemcellInfo>> {
        if self.failing_stemcells.contains(&deployment.name) {
            return Err(failure("stemcells", &deployment.name));
        }
        Ok(self.lookup(&deployment.name)?.stemcells.clone())
    }
}

/// A running VM with one running process per entry of `processes`.
pub(crate) fn vm(vm_id: &str, job: &str, ips: &[&str], az: &str, processes: &[&str]) -> VmInfo {
    VmInfo {
        agent_id: format!("agent-{vm_id}"),
        vm_id: vm_id.to_owned(),
        job_name: job.to_owned(),
        id: format!("{job}-{vm_id}"),
        index: Some(0),
        ips: ips.iter().map(|ip| (*ip).to_owned()).collect(),
        az: az.to_owned(),
        vm_type: "default".to_owned(),
        job_state: "running".to_owned(),
        processes: processes
            .iter()
            .map(|name| super::ProcessInfo {
                name: (*name).to_owned(),
                state: "running".to_owned(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub(crate) fn release(name: &str, version: &str, jobs: &[&str]) -> ReleaseInfo {
    ReleaseInfo {
        name: name.to_owned(),
        version: version.to_owned(),
        job_names: jobs.iter().map(|job| (*job).to_owned()).collect(),
        package_names: Vec::new(),
    }
}
