use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::director::{self, DeploymentHandle, Director, ProcessInfo, VmInfo};
use crate::filters::DeploymentsFilter;

use super::model::{Cpu, Disk, Disks, Memory};
use super::{DeploymentSnapshot, Error, Instance, Process, Release, Result, Stemcell, Vitals};

/// A deployment left out of a scrape, with the reason.
#[derive(Debug)]
pub struct SkippedDeployment {
    pub name: String,
    pub error: Error,
}

/// Result of a fetch: the deployments that could be read and those that could not.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub deployments: Vec<DeploymentSnapshot>,
    pub skipped: Vec<SkippedDeployment>,
}

/// Builds [`DeploymentSnapshot`]s for the deployments selected by a [`DeploymentsFilter`].
#[derive(Debug)]
pub struct Fetcher<D> {
    director: Arc<D>,
    filter: DeploymentsFilter,
    limit: Option<Arc<Semaphore>>,
}

impl<D: Director> Fetcher<D> {
    pub fn new(director: Arc<D>, filter: DeploymentsFilter) -> Self {
        Self {
            director,
            filter,
            limit: None,
        }
    }

    /// Caps how many deployments are fetched at the same time.
    ///
    /// By default every selected deployment gets its own task right away.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Fetches every selected deployment concurrently.
    ///
    /// A deployment whose lookup or any of whose sub-fetches fails is logged
    /// and reported in [`FetchOutcome::skipped`]; it never fails the fetch.
    /// Snapshots come back in completion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListDeployments`] if the deployments cannot be enumerated.
    pub async fn fetch(&self) -> Result<FetchOutcome> {
        let selection = self
            .filter
            .select(self.director.as_ref())
            .await
            .map_err(Error::ListDeployments)?;

        let mut outcome = FetchOutcome {
            deployments: Vec::with_capacity(selection.deployments.len()),
            skipped: selection
                .missing
                .into_iter()
                .map(|(name, source)| SkippedDeployment {
                    error: Error::FindDeployment {
                        name: name.clone(),
                        source,
                    },
                    name,
                })
                .collect(),
        };

        let mut tasks = JoinSet::new();
        let mut pending = HashSet::with_capacity(selection.deployments.len());
        for deployment in selection.deployments {
            let director = Arc::clone(&self.director);
            let limit = self.limit.clone();
            pending.insert(deployment.name.clone());
            tasks.spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let result = fetch_deployment(director.as_ref(), &deployment).await;
                (deployment.name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(snapshot))) => {
                    log::trace!(
                        "fetched deployment `{name}` with {} instances",
                        snapshot.instances.len()
                    );
                    pending.remove(&name);
                    outcome.deployments.push(snapshot);
                }
                Ok((name, Err(error))) => {
                    log::error!("{}", crate::error::chain(&error));
                    pending.remove(&name);
                    outcome.skipped.push(SkippedDeployment { name, error });
                }
                Err(err) => log::error!("deployment fetch task failed: {err}"),
            }
        }
        // Whatever is left belongs to tasks that panicked.
        for name in pending {
            outcome.skipped.push(SkippedDeployment {
                error: Error::TaskPanicked { name: name.clone() },
                name,
            });
        }

        log::debug!(
            "fetched {} deployments, skipped {}",
            outcome.deployments.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }
}

async fn fetch_deployment<D: Director>(
    director: &D,
    deployment: &DeploymentHandle,
) -> Result<DeploymentSnapshot> {
    let name = deployment.name.clone();
    let instances = director
        .instance_infos(deployment)
        .await
        .map_err(|source| Error::Instances {
            name: name.clone(),
            source,
        })?;
    let releases = director
        .releases(deployment)
        .await
        .map_err(|source| Error::Releases {
            name: name.clone(),
            source,
        })?;
    let stemcells = director
        .stemcells(deployment)
        .await
        .map_err(|source| Error::Stemcells {
            name: name.clone(),
            source,
        })?;

    Ok(DeploymentSnapshot {
        name,
        instances: instances.into_iter().filter_map(normalize_instance).collect(),
        releases: releases.into_iter().map(normalize_release).collect(),
        stemcells: stemcells.into_iter().map(normalize_stemcell).collect(),
    })
}

/// Instances without a VM are not materialized.
fn normalize_instance(vm: VmInfo) -> Option<Instance> {
    if vm.vm_id.is_empty() {
        return None;
    }
    let healthy = vm.is_running();
    let vitals = vm.vitals;

    Some(Instance {
        agent_id: vm.agent_id,
        vm_id: vm.vm_id,
        name: vm.job_name,
        id: vm.id,
        index: vm.index.map(|index| index.to_string()).unwrap_or_default(),
        bootstrap: vm.bootstrap,
        ips: vm.ips,
        az: vm.az,
        vm_type: vm.vm_type,
        resource_pool: vm.resource_pool,
        resurrection_paused: vm.resurrection_paused,
        healthy,
        processes: vm.processes.into_iter().map(normalize_process).collect(),
        vitals: Vitals {
            cpu: Cpu {
                sys: vitals.cpu.sys,
                user: vitals.cpu.user,
                wait: vitals.cpu.wait,
            },
            mem: Memory {
                kb: vitals.mem.kb,
                percent: vitals.mem.percent,
            },
            swap: Memory {
                kb: vitals.swap.kb,
                percent: vitals.swap.percent,
            },
            load: vitals.load.0,
            disk: Disks {
                system: normalize_disk(vitals.disk.system),
                ephemeral: normalize_disk(vitals.disk.ephemeral),
                persistent: normalize_disk(vitals.disk.persistent),
            },
            uptime: vitals.uptime.secs,
        },
    })
}

fn normalize_disk(disk: director::DiskInfo) -> Disk {
    Disk {
        inode_percent: disk.inode_percent,
        percent: disk.percent,
    }
}

fn normalize_process(process: ProcessInfo) -> Process {
    Process {
        healthy: process.is_running(),
        name: process.name,
        uptime: process.uptime.secs,
        cpu_total: process.cpu.total,
        mem_kb: process.mem.kb,
        mem_percent: process.mem.percent,
    }
}

fn normalize_release(release: director::ReleaseInfo) -> Release {
    Release {
        name: release.name,
        version: release.version,
        job_names: release.job_names,
        package_names: release.package_names,
    }
}

fn normalize_stemcell(stemcell: director::StemcellInfo) -> Stemcell {
    Stemcell {
        name: stemcell.name,
        version: stemcell.version,
        os_name: stemcell.os_name,
    }
}
