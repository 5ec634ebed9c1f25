use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use prometheus::GaugeVec;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;

use crate::deployments::Snapshot;
use crate::filters::DEPLOYMENTS_COLLECTOR;

use super::{MetricSet, MetricsContext, Result, ScrapeMetrics, SnapshotCollector};

const SUBSYSTEM: &str = "deployment";

/// Exports the releases, stemcells and instance counts of every deployment.
pub struct DeploymentsCollector {
    release_info: GaugeVec,
    release_job_info: GaugeVec,
    release_package_info: GaugeVec,
    stemcell_info: GaugeVec,
    instances: GaugeVec,
    scrape: ScrapeMetrics,
    metrics: MetricSet,
    lock: Mutex<()>,
}

impl DeploymentsCollector {
    pub fn new(context: &MetricsContext) -> Result<Self> {
        let mut metrics = MetricSet::default();
        let release_info = metrics.add(context.gauge_vec(
            SUBSYSTEM,
            "release_info",
            "Labeled BOSH Deployment Release Info with a constant '1' value.",
            &["deployment", "bosh_release_name", "bosh_release_version"],
        )?);
        let release_job_info = metrics.add(context.gauge_vec(
            SUBSYSTEM,
            "release_job_info",
            "Labeled BOSH Deployment Release Job Info with a constant '1' value.",
            &[
                "deployment",
                "bosh_release_name",
                "bosh_release_version",
                "bosh_release_job_name",
            ],
        )?);
        let release_package_info = metrics.add(context.gauge_vec(
            SUBSYSTEM,
            "release_package_info",
            "Labeled BOSH Deployment Release Package Info with a constant '1' value.",
            &[
                "deployment",
                "bosh_release_name",
                "bosh_release_version",
                "bosh_release_package_name",
            ],
        )?);
        let stemcell_info = metrics.add(context.gauge_vec(
            SUBSYSTEM,
            "stemcell_info",
            "Labeled BOSH Deployment Stemcell Info with a constant '1' value.",
            &[
                "deployment",
                "bosh_stemcell_name",
                "bosh_stemcell_version",
                "bosh_stemcell_os_name",
            ],
        )?);
        let instances = metrics.add(context.gauge_vec(
            SUBSYSTEM,
            "instances",
            "Number of instances in this deployment.",
            &["deployment", "bosh_vm_type"],
        )?);
        let scrape = ScrapeMetrics::new(
            context,
            &mut metrics,
            "last_deployments_scrape",
            "BOSH Deployments",
        )?;

        Ok(Self {
            release_info,
            release_job_info,
            release_package_info,
            stemcell_info,
            instances,
            scrape,
            metrics,
            lock: Mutex::default(),
        })
    }

    fn reset(&self) {
        self.release_info.reset();
        self.release_job_info.reset();
        self.release_package_info.reset();
        self.stemcell_info.reset();
        self.instances.reset();
    }
}

impl SnapshotCollector for DeploymentsCollector {
    fn name(&self) -> &'static str {
        DEPLOYMENTS_COLLECTOR
    }

    fn describe(&self) -> Vec<Desc> {
        self.metrics.describe()
    }

    fn collect(&self, snapshot: &Snapshot) -> Result<Vec<MetricFamily>> {
        let _guard = super::lock_scrape(&self.lock);
        let started = Instant::now();
        self.reset();

        for deployment in snapshot.deployments() {
            let name = deployment.name.as_str();
            for release in &deployment.releases {
                let (release_name, version) = (release.name.as_str(), release.version.as_str());
                self.release_info
                    .with_label_values(&[name, release_name, version])
                    .set(1.0);
                for job in &release.job_names {
                    self.release_job_info
                        .with_label_values(&[name, release_name, version, job.as_str()])
                        .set(1.0);
                }
                for package in &release.package_names {
                    self.release_package_info
                        .with_label_values(&[name, release_name, version, package.as_str()])
                        .set(1.0);
                }
            }

            for stemcell in &deployment.stemcells {
                self.stemcell_info
                    .with_label_values(&[
                        name,
                        stemcell.name.as_str(),
                        stemcell.version.as_str(),
                        stemcell.os_name.as_str(),
                    ])
                    .set(1.0);
            }

            let mut by_vm_type = BTreeMap::<&str, f64>::new();
            for instance in &deployment.instances {
                *by_vm_type.entry(instance.vm_type.as_str()).or_default() += 1.0;
            }
            for (vm_type, count) in by_vm_type {
                self.instances.with_label_values(&[name, vm_type]).set(count);
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
    use crate::deployments::{DeploymentSnapshot, Instance, Release, Stemcell};

    fn snapshot() -> Snapshot {
        let instance = |vm_type: &str| Instance {
            vm_id: "vm".to_owned(),
            vm_type: vm_type.to_owned(),
            ..Default::default()
        };
        Snapshot::new(vec![DeploymentSnapshot {
            name: "cf".to_owned(),
            instances: vec![instance("small"), instance("large"), instance("small")],
            releases: vec![Release {
                name: "routing".to_owned(),
                version: "0.300.0".to_owned(),
                job_names: vec!["gorouter".to_owned()],
                package_names: vec!["golang".to_owned()],
            }],
            stemcells: vec![Stemcell {
                name: "bosh-warden".to_owned(),
                version: "1.404".to_owned(),
                os_name: "ubuntu-jammy".to_owned(),
            }],
        }])
    }

    #[test]
    fn test_collect_exports_deployment_topology() {
        let collector = DeploymentsCollector::new(&context()).unwrap();
        let families = collector.collect(&snapshot()).unwrap();

        assert_eq!(
            gauge_value(
                &families,
                "bosh_deployment_release_info",
                &[
                    ("deployment", "cf"),
                    ("bosh_release_name", "routing"),
                    ("bosh_release_version", "0.300.0"),
                ]
            ),
            Some(1.0)
        );
        assert_eq!(
            gauge_value(
                &families,
                "bosh_deployment_release_job_info",
                &[("bosh_release_job_name", "gorouter")]
            ),
            Some(1.0)
        );
        assert_eq!(
            gauge_value(
                &families,
                "bosh_deployment_release_package_info",
                &[("bosh_release_package_name", "golang")]
            ),
            Some(1.0)
        );
        assert_eq!(
            gauge_value(
                &families,
                "bosh_deployment_stemcell_info",
                &[("bosh_stemcell_os_name", "ubuntu-jammy")]
            ),
            Some(1.0)
        );
        assert_eq!(
            gauge_value(
                &families,
                "bosh_deployment_instances",
                &[("bosh_vm_type", "small")]
            ),
            Some(2.0)
        );
        assert_eq!(
            gauge_value(
                &families,
                "bosh_deployment_instances",
                &[("bosh_vm_type", "large")]
            ),
            Some(1.0)
        );
        assert!(family(&families, "bosh_last_deployments_scrape_timestamp").is_some());
    }

    #[test]
    fn test_collect_forgets_removed_deployments() {
        let collector = DeploymentsCollector::new(&context()).unwrap();
        collector.collect(&snapshot()).unwrap();

        let families = collector.collect(&Snapshot::incomplete()).unwrap();
        assert!(family(&families, "bosh_deployment_release_info").is_none());
        assert!(family(&families, "bosh_last_deployments_scrape_duration_seconds").is_some());
    }
}
