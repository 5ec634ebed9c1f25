use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge};
use serde::{Deserialize, Serialize};

use crate::deployments::{DeploymentSnapshot, Snapshot};
use crate::error;
use crate::filters::{AzFilter, CidrFilter, ProcessFilter, SERVICE_DISCOVERY_COLLECTOR};
use crate::fsutil;

use super::{Error, MetricSet, MetricsContext, Result, ScrapeMetrics, SnapshotCollector};

pub const DEPLOYMENT_LABEL: &str = "__meta_bosh_deployment";
pub const DEPLOYMENT_RELEASES_LABEL: &str = "__meta_bosh_deployment_releases";
pub const PROCESS_NAME_LABEL: &str = "__meta_bosh_job_process_name";
pub const PROCESS_RELEASE_LABEL: &str = "__meta_bosh_job_process_release";

/// One entry of a Prometheus file-based service discovery file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

/// Addresses of one process across the instances of a deployment.
#[derive(Debug, Default)]
struct LabelGroup {
    targets: Vec<String>,
    process_release: String,
    deployment_releases: Vec<String>,
}

/// Publishes one target group per deployment and process to a file.
///
/// Each instance contributes the address picked by the CIDR filter, provided
/// its AZ is enabled, to the group of every process it runs that passes the
/// process filter.
///
/// The release of a process is the release shipping a job named like the
/// process. Processes named differently from their job get no release, and
/// if several releases ship a job of that name the last one wins.
pub struct ServiceDiscoveryCollector {
    path: PathBuf,
    az_filter: AzFilter,
    cidr_filter: CidrFilter,
    process_filter: ProcessFilter,
    target_groups: Gauge,
    scrape_errors: Counter,
    scrape: ScrapeMetrics,
    metrics: MetricSet,
    lock: Mutex<()>,
}

impl ServiceDiscoveryCollector {
    pub fn new(
        context: &MetricsContext,
        path: impl Into<PathBuf>,
        az_filter: AzFilter,
        cidr_filter: CidrFilter,
        process_filter: ProcessFilter,
    ) -> Result<Self> {
        let mut metrics = MetricSet::default();
        let target_groups = metrics.add(context.gauge(
            "service_discovery",
            "target_groups",
            "Number of target groups in the last published service discovery file.",
        )?);
        let scrape_errors = metrics.add(context.counter(
            "service_discovery",
            "scrape_errors_total",
            "Total number of times the service discovery file could not be published.",
        )?);
        let scrape = ScrapeMetrics::new(
            context,
            &mut metrics,
            "last_service_discovery_scrape",
            "BOSH Service Discovery",
        )?;

        Ok(Self {
            path: path.into(),
            az_filter,
            cidr_filter,
            process_filter,
            target_groups,
            scrape_errors,
            scrape,
            metrics,
            lock: Mutex::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn label_groups<'a>(
        &self,
        deployments: &'a [DeploymentSnapshot],
    ) -> BTreeMap<(&'a str, &'a str), LabelGroup> {
        let mut groups = BTreeMap::new();
        for deployment in deployments {
            for instance in &deployment.instances {
                if !self.az_filter.enabled(&instance.az) {
                    continue;
                }
                let Some(ip) = self.cidr_filter.select(&instance.ips) else {
                    continue;
                };

                for process in &instance.processes {
                    if !self.process_filter.enabled(&process.name) {
                        continue;
                    }
                    let group = groups
                        .entry((deployment.name.as_str(), process.name.as_str()))
                        .or_insert_with(|| {
                            let mut group = LabelGroup::default();
                            for release in &deployment.releases {
                                group.deployment_releases.push(release.to_string());
                                if release.has_job(&process.name) {
                                    group.process_release = release.to_string();
                                }
                            }
                            group
                        });
                    group.targets.push(ip.to_owned());
                }
            }
        }
        groups
    }

    /// Derives the target groups of `deployments`, ordered by deployment and process.
    pub fn target_groups(&self, deployments: &[DeploymentSnapshot]) -> Vec<TargetGroup> {
        self.label_groups(deployments)
            .into_iter()
            .map(|((deployment, process), group)| TargetGroup {
                targets: group.targets,
                labels: BTreeMap::from([
                    (DEPLOYMENT_LABEL.to_owned(), deployment.to_owned()),
                    (
                        DEPLOYMENT_RELEASES_LABEL.to_owned(),
                        group.deployment_releases.join(","),
                    ),
                    (PROCESS_NAME_LABEL.to_owned(), process.to_owned()),
                    (PROCESS_RELEASE_LABEL.to_owned(), group.process_release),
                ]),
            })
            .collect()
    }

    /// Writes the target groups of `deployments` to the discovery file.
    ///
    /// Returns the number of target groups written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] or [`Error::Publish`]; the previous file is left untouched.
    pub fn publish(&self, deployments: &[DeploymentSnapshot]) -> Result<usize> {
        let groups = self.target_groups(deployments);
        let contents = serde_json::to_vec_pretty(&groups).map_err(Error::Encode)?;
        fsutil::write_file_atomically(&self.path, &contents)?;
        log::debug!(
            "published {} target groups to `{}`",
            groups.len(),
            self.path.display()
        );
        Ok(groups.len())
    }
}

impl SnapshotCollector for ServiceDiscoveryCollector {
    fn name(&self) -> &'static str {
        SERVICE_DISCOVERY_COLLECTOR
    }

    fn describe(&self) -> Vec<Desc> {
        self.metrics.describe()
    }

    /// Skips publishing when the deployments could not be listed, so the
    /// file keeps the last known targets instead of being emptied.
    ///
    /// A failed publish is logged and counted; the scrape metrics are
    /// exported either way.
    fn collect(&self, snapshot: &Snapshot) -> Result<Vec<MetricFamily>> {
        let _guard = super::lock_scrape(&self.lock);
        let started = Instant::now();

        if !snapshot.is_complete() {
            log::warn!(
                "deployments could not be listed, keeping `{}`",
                self.path.display()
            );
            self.scrape_errors.inc();
        } else {
            match self.publish(snapshot.deployments()) {
                Ok(count) => self.target_groups.set(count as f64),
                Err(err) => {
                    log::error!("{}", error::chain(&err));
                    self.scrape_errors.inc();
                }
            }
        }
        self.scrape.finish(started);

        Ok(self.metrics.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::tests::{context, family, gauge_value};
    use crate::deployments::{Instance, Process, Release};

    fn instance(ips: &[&str], az: &str, processes: &[&str]) -> Instance {
        Instance {
            vm_id: "vm".to_owned(),
            ips: ips.iter().map(|ip| (*ip).to_owned()).collect(),
            az: az.to_owned(),
            processes: processes
                .iter()
                .map(|name| Process {
                    name: (*name).to_owned(),
                    healthy: true,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn release(name: &str, version: &str, jobs: &[&str]) -> Release {
        Release {
            name: name.to_owned(),
            version: version.to_owned(),
            job_names: jobs.iter().map(|job| (*job).to_owned()).collect(),
            package_names: Vec::new(),
        }
    }

    fn d1(instances: Vec<Instance>) -> Vec<DeploymentSnapshot> {
        vec![DeploymentSnapshot {
            name: "d1".to_owned(),
            instances,
            releases: vec![release("r1", "1.0", &["p1"])],
            stemcells: Vec::new(),
        }]
    }

    fn collector(path: &Path, azs: &[&str], processes: &[&str]) -> ServiceDiscoveryCollector {
        ServiceDiscoveryCollector::new(
            &context(),
            path,
            AzFilter::new(azs),
            CidrFilter::new(["0.0.0.0/0"]).unwrap(),
            ProcessFilter::new(processes).unwrap(),
        )
        .unwrap()
    }

    fn read_groups(path: &Path) -> Vec<TargetGroup> {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_publish_single_target_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let collector = collector(&path, &[], &[]);

        let count = collector
            .publish(&d1(vec![instance(&["1.2.3.4"], "z1", &["p1"])]))
            .unwrap();
        assert_eq!(count, 1);

        let groups = read_groups(&path);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].targets, ["1.2.3.4"]);
        assert_eq!(groups[0].labels[DEPLOYMENT_LABEL], "d1");
        assert_eq!(groups[0].labels[PROCESS_NAME_LABEL], "p1");
        assert_eq!(groups[0].labels[PROCESS_RELEASE_LABEL], "r1/1.0");
        assert_eq!(groups[0].labels[DEPLOYMENT_RELEASES_LABEL], "r1/1.0");
    }

    #[test]
    fn test_publish_excludes_disabled_az() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let collector = collector(&path, &["other-az"], &[]);

        collector
            .publish(&d1(vec![instance(&["1.2.3.4"], "z1", &["p1"])]))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_target_groups_skip_instances_without_ips() {
        let collector = collector(Path::new("unused.json"), &[], &[]);
        let groups = collector.target_groups(&d1(vec![instance(&[], "z1", &["p1"])]));
        assert!(groups.is_empty());
    }

    #[test]
    fn test_target_groups_keep_duplicates_in_discovery_order() {
        let collector = collector(Path::new("unused.json"), &[], &[]);
        let groups = collector.target_groups(&d1(vec![
            instance(&["10.0.0.2"], "z1", &["p1", "p2"]),
            instance(&["10.0.0.1"], "z2", &["p1"]),
            instance(&["10.0.0.2"], "z1", &["p1"]),
        ]));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].labels[PROCESS_NAME_LABEL], "p1");
        assert_eq!(groups[0].targets, ["10.0.0.2", "10.0.0.1", "10.0.0.2"]);
        assert_eq!(groups[1].labels[PROCESS_NAME_LABEL], "p2");
        assert_eq!(groups[1].targets, ["10.0.0.2"]);
        assert_eq!(groups[1].labels[PROCESS_RELEASE_LABEL], "");
        assert_eq!(groups[1].labels[DEPLOYMENT_RELEASES_LABEL], "r1/1.0");
    }

    #[test]
    fn test_target_groups_apply_process_filter_and_join_releases() {
        let collector = collector(Path::new("unused.json"), &[], &["^p2$"]);
        let mut deployments = d1(vec![instance(&["10.0.0.1"], "z1", &["p1", "p2"])]);
        deployments[0].releases.push(release("r2", "2.1", &["p2"]));

        let groups = collector.target_groups(&deployments);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].labels[PROCESS_NAME_LABEL], "p2");
        assert_eq!(groups[0].labels[PROCESS_RELEASE_LABEL], "r2/2.1");
        assert_eq!(groups[0].labels[DEPLOYMENT_RELEASES_LABEL], "r1/1.0,r2/2.1");
    }

    #[test]
    fn test_publish_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let collector = collector(&path, &[], &[]);
        let mut deployments = d1(vec![
            instance(&["10.0.0.1"], "z1", &["p1", "p2"]),
            instance(&["10.0.0.2"], "z2", &["p3"]),
        ]);
        deployments.push(DeploymentSnapshot {
            name: "d0".to_owned(),
            instances: vec![instance(&["10.1.0.1"], "z1", &["p1"])],
            ..Default::default()
        });

        collector.publish(&deployments).unwrap();
        let first = std::fs::read(&path).unwrap();
        collector.publish(&deployments).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_empty_target_groups_encode_as_empty_array() {
        let encoded = serde_json::to_string_pretty(&Vec::<TargetGroup>::new()).unwrap();
        assert_eq!(encoded, "[]");
        let decoded: Vec<TargetGroup> = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_collect_keeps_file_when_snapshot_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let collector = collector(&path, &[], &[]);
        collector
            .publish(&d1(vec![instance(&["1.2.3.4"], "z1", &["p1"])]))
            .unwrap();

        let families = collector.collect(&Snapshot::incomplete()).unwrap();
        assert_eq!(read_groups(&path).len(), 1);
        assert!(family(&families, "bosh_last_service_discovery_scrape_timestamp").is_some());
        assert_eq!(collector.scrape_errors.get(), 1.0);
    }

    #[test]
    fn test_collect_reports_publish_errors() {
        let path = Path::new("/definitely/does/not/exist/targets.json");
        let collector = collector(path, &[], &[]);
        assert!(matches!(collector.publish(&[]), Err(Error::Publish(_))));

        for _ in 0..2 {
            let families = collector.collect(&Snapshot::new(Vec::new())).unwrap();
            assert!(family(&families, "bosh_last_service_discovery_scrape_timestamp").is_some());
        }
        assert_eq!(collector.scrape_errors.get(), 2.0);
    }

    #[test]
    fn test_collect_exports_target_group_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let collector = collector(&path, &[], &[]);

        let snapshot = Snapshot::new(d1(vec![instance(&["1.2.3.4"], "z1", &["p1", "p2"])]));
        let families = collector.collect(&snapshot).unwrap();
        assert_eq!(
            gauge_value(&families, "bosh_service_discovery_target_groups", &[]),
            Some(2.0)
        );
        assert_eq!(read_groups(&path).len(), 2);
    }
}
