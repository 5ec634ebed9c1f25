use std::sync::Mutex;
use std::time::Instant;

use prometheus::GaugeVec;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;

use crate::deployments::{Disk, Instance, Process, Snapshot};
use crate::filters::JOBS_COLLECTOR;

use super::{MetricSet, MetricsContext, Result, ScrapeMetrics, SnapshotCollector, reported};

const SUBSYSTEM: &str = "job";

const JOB_LABELS: [&str; 6] = [
    "deployment",
    "bosh_job_name",
    "bosh_job_id",
    "bosh_job_index",
    "bosh_job_az",
    "bosh_job_ip",
];

const PROCESS_LABELS: [&str; 7] = [
    "deployment",
    "bosh_job_name",
    "bosh_job_id",
    "bosh_job_index",
    "bosh_job_az",
    "bosh_job_ip",
    "bosh_job_process_name",
];

struct DiskGauges {
    inode_percent: GaugeVec,
    percent: GaugeVec,
}

/// Exports health and vitals of every instance and of the processes it runs.
///
/// Vitals the agent did not report are left out rather than exported as zero.
pub struct JobsCollector {
    healthy: GaugeVec,
    resurrection_paused: GaugeVec,
    load_avg01: GaugeVec,
    load_avg05: GaugeVec,
    load_avg15: GaugeVec,
    cpu_sys: GaugeVec,
    cpu_user: GaugeVec,
    cpu_wait: GaugeVec,
    mem_kb: GaugeVec,
    mem_percent: GaugeVec,
    swap_kb: GaugeVec,
    swap_percent: GaugeVec,
    system_disk: DiskGauges,
    ephemeral_disk: DiskGauges,
    persistent_disk: DiskGauges,
    uptime_seconds: GaugeVec,
    process_healthy: GaugeVec,
    process_uptime_seconds: GaugeVec,
    process_cpu_total: GaugeVec,
    process_mem_kb: GaugeVec,
    process_mem_percent: GaugeVec,
    scrape: ScrapeMetrics,
    metrics: MetricSet,
    lock: Mutex<()>,
}

impl JobsCollector {
    pub fn new(context: &MetricsContext) -> Result<Self> {
        let mut metrics = MetricSet::default();
        let mut job = |name: &str, help: &str| -> Result<GaugeVec> {
            Ok(metrics.add(context.gauge_vec(SUBSYSTEM, name, help, &JOB_LABELS)?))
        };

        let healthy = job("healthy", "BOSH Job Healthy (1 for healthy, 0 for unhealthy).")?;
        let resurrection_paused = job(
            "resurrection_paused",
            "BOSH Job Resurrection Paused (1 for paused, 0 for active).",
        )?;
        let load_avg01 = job("load_avg01", "BOSH Job Load avg over 1 minute.")?;
        let load_avg05 = job("load_avg05", "BOSH Job Load avg over 5 minutes.")?;
        let load_avg15 = job("load_avg15", "BOSH Job Load avg over 15 minutes.")?;
        let cpu_sys = job("cpu_sys", "BOSH Job CPU System.")?;
        let cpu_user = job("cpu_user", "BOSH Job CPU User.")?;
        let cpu_wait = job("cpu_wait", "BOSH Job CPU Wait.")?;
        let mem_kb = job("mem_kb", "BOSH Job Memory KB.")?;
        let mem_percent = job("mem_percent", "BOSH Job Memory Percent.")?;
        let swap_kb = job("swap_kb", "BOSH Job Swap KB.")?;
        let swap_percent = job("swap_percent", "BOSH Job Swap Percent.")?;
        let system_disk = DiskGauges {
            inode_percent: job(
                "system_disk_inode_percent",
                "BOSH Job System Disk Inode Percent.",
            )?,
            percent: job("system_disk_percent", "BOSH Job System Disk Percent.")?,
        };
        let ephemeral_disk = DiskGauges {
            inode_percent: job(
                "ephemeral_disk_inode_percent",
                "BOSH Job Ephemeral Disk Inode Percent.",
            )?,
            percent: job("ephemeral_disk_percent", "BOSH Job Ephemeral Disk Percent.")?,
        };
        let persistent_disk = DiskGauges {
            inode_percent: job(
                "persistent_disk_inode_percent",
                "BOSH Job Persistent Disk Inode Percent.",
            )?,
            percent: job("persistent_disk_percent", "BOSH Job Persistent Disk Percent.")?,
        };
        let uptime_seconds = job("uptime_seconds", "BOSH Job Uptime in seconds.")?;

        let mut process = |name: &str, help: &str| -> Result<GaugeVec> {
            Ok(metrics.add(context.gauge_vec(SUBSYSTEM, name, help, &PROCESS_LABELS)?))
        };
        let process_healthy = process(
            "process_healthy",
            "BOSH Job Process Healthy (1 for healthy, 0 for unhealthy).",
        )?;
        let process_uptime_seconds =
            process("process_uptime_seconds", "BOSH Job Process Uptime in seconds.")?;
        let process_cpu_total = process("process_cpu_total", "BOSH Job Process CPU Total.")?;
        let process_mem_kb = process("process_mem_kb", "BOSH Job Process Memory KB.")?;
        let process_mem_percent =
            process("process_mem_percent", "BOSH Job Process Memory Percent.")?;

        let scrape = ScrapeMetrics::new(context, &mut metrics, "last_jobs_scrape", "BOSH Jobs")?;

        Ok(Self {
            healthy,
            resurrection_paused,
            load_avg01,
            load_avg05,
            load_avg15,
            cpu_sys,
            cpu_user,
            cpu_wait,
            mem_kb,
            mem_percent,
            swap_kb,
            swap_percent,
            system_disk,
            ephemeral_disk,
            persistent_disk,
            uptime_seconds,
            process_healthy,
            process_uptime_seconds,
            process_cpu_total,
            process_mem_kb,
            process_mem_percent,
            scrape,
            metrics,
            lock: Mutex::default(),
        })
    }

    fn reset(&self) {
        let vecs = [
            &self.healthy,
            &self.resurrection_paused,
            &self.load_avg01,
            &self.load_avg05,
            &self.load_avg15,
            &self.cpu_sys,
            &self.cpu_user,
            &self.cpu_wait,
            &self.mem_kb,
            &self.mem_percent,
            &self.swap_kb,
            &self.swap_percent,
            &self.system_disk.inode_percent,
            &self.system_disk.percent,
            &self.ephemeral_disk.inode_percent,
            &self.ephemeral_disk.percent,
            &self.persistent_disk.inode_percent,
            &self.persistent_disk.percent,
            &self.uptime_seconds,
            &self.process_healthy,
            &self.process_uptime_seconds,
            &self.process_cpu_total,
            &self.process_mem_kb,
            &self.process_mem_percent,
        ];
        for vec in vecs {
            vec.reset();
        }
    }

    fn collect_instance(&self, deployment: &str, instance: &Instance) {
        let ip = instance.ips.first().map(String::as_str).unwrap_or_default();
        let labels = [
            deployment,
            instance.name.as_str(),
            instance.id.as_str(),
            instance.index.as_str(),
            instance.az.as_str(),
            ip,
        ];
        let set = |vec: &GaugeVec, value: Option<f64>| {
            if let Some(value) = value {
                vec.with_label_values(&labels).set(value);
            }
        };
        let set_disk = |gauges: &DiskGauges, disk: &Disk| {
            set(&gauges.inode_percent, reported(&disk.inode_percent));
            set(&gauges.percent, reported(&disk.percent));
        };
        let vitals = &instance.vitals;
        let load = |i: usize| vitals.load.get(i).and_then(|raw| reported(raw));

        set(&self.healthy, Some(bool_value(instance.healthy)));
        set(
            &self.resurrection_paused,
            Some(bool_value(instance.resurrection_paused)),
        );
        set(&self.load_avg01, load(0));
        set(&self.load_avg05, load(1));
        set(&self.load_avg15, load(2));
        set(&self.cpu_sys, reported(&vitals.cpu.sys));
        set(&self.cpu_user, reported(&vitals.cpu.user));
        set(&self.cpu_wait, reported(&vitals.cpu.wait));
        set(&self.mem_kb, reported(&vitals.mem.kb));
        set(&self.mem_percent, reported(&vitals.mem.percent));
        set(&self.swap_kb, reported(&vitals.swap.kb));
        set(&self.swap_percent, reported(&vitals.swap.percent));
        set_disk(&self.system_disk, &vitals.disk.system);
        set_disk(&self.ephemeral_disk, &vitals.disk.ephemeral);
        set_disk(&self.persistent_disk, &vitals.disk.persistent);
        set(&self.uptime_seconds, vitals.uptime.map(|secs| secs as f64));

        for process in &instance.processes {
            self.collect_process(&labels, process);
        }
    }

    fn collect_process(&self, job_labels: &[&str; 6], process: &Process) {
        let mut labels = [""; 7];
        labels[..6].copy_from_slice(job_labels);
        labels[6] = process.name.as_str();
        let set = |vec: &GaugeVec, value: Option<f64>| {
            if let Some(value) = value {
                vec.with_label_values(&labels).set(value);
            }
        };

        set(&self.process_healthy, Some(bool_value(process.healthy)));
        set(
            &self.process_uptime_seconds,
            process.uptime.map(|secs| secs as f64),
        );
        set(&self.process_cpu_total, process.cpu_total);
        set(&self.process_mem_kb, process.mem_kb.map(|kb| kb as f64));
        set(&self.process_mem_percent, process.mem_percent);
    }
}

fn bool_value(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

impl SnapshotCollector for JobsCollector {
    fn name(&self) -> &'static str {
        JOBS_COLLECTOR
    }

    fn describe(&self) -> Vec<Desc> {
        self.metrics.describe()
    }

    fn collect(&self, snapshot: &Snapshot) -> Result<Vec<MetricFamily>> {
        let _guard = super::lock_scrape(&self.lock);
        let started = Instant::now();
        self.reset();

        for deployment in snapshot.deployments() {
            for instance in &deployment.instances {
                self.collect_instance(&deployment.name, instance);
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
    use crate::deployments::{Cpu, DeploymentSnapshot, Vitals};

    fn instance() -> Instance {
        Instance {
            vm_id: "vm-1".to_owned(),
            name: "router".to_owned(),
            id: "abc".to_owned(),
            index: "0".to_owned(),
            az: "z1".to_owned(),
            ips: vec!["10.0.0.1".to_owned(), "10.0.1.1".to_owned()],
            healthy: true,
            processes: vec![
                Process {
                    name: "gorouter".to_owned(),
                    uptime: Some(120),
                    healthy: true,
                    cpu_total: Some(2.5),
                    mem_kb: Some(4096),
                    mem_percent: None,
                },
                Process {
                    name: "metron".to_owned(),
                    healthy: false,
                    ..Default::default()
                },
            ],
            vitals: Vitals {
                cpu: Cpu {
                    sys: "1.5".to_owned(),
                    user: "".to_owned(),
                    wait: "0.0".to_owned(),
                },
                load: vec!["0.5".to_owned(), "0.25".to_owned()],
                uptime: Some(3600),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn collect() -> Vec<MetricFamily> {
        let snapshot = Snapshot::new(vec![DeploymentSnapshot {
            name: "cf".to_owned(),
            instances: vec![instance()],
            ..Default::default()
        }]);
        JobsCollector::new(&context())
            .unwrap()
            .collect(&snapshot)
            .unwrap()
    }

    #[test]
    fn test_collect_exports_instance_health_with_first_ip() {
        let families = collect();
        let labels = [
            ("deployment", "cf"),
            ("bosh_job_name", "router"),
            ("bosh_job_id", "abc"),
            ("bosh_job_index", "0"),
            ("bosh_job_az", "z1"),
            ("bosh_job_ip", "10.0.0.1"),
        ];
        assert_eq!(gauge_value(&families, "bosh_job_healthy", &labels), Some(1.0));
        assert_eq!(
            gauge_value(&families, "bosh_job_resurrection_paused", &labels),
            Some(0.0)
        );
        assert_eq!(
            gauge_value(&families, "bosh_job_uptime_seconds", &labels),
            Some(3600.0)
        );
    }

    #[test]
    fn test_collect_skips_unreported_vitals() {
        let families = collect();
        assert_eq!(gauge_value(&families, "bosh_job_cpu_sys", &[]), Some(1.5));
        assert_eq!(gauge_value(&families, "bosh_job_cpu_wait", &[]), Some(0.0));
        assert!(family(&families, "bosh_job_cpu_user").is_none());
        assert_eq!(gauge_value(&families, "bosh_job_load_avg01", &[]), Some(0.5));
        assert_eq!(gauge_value(&families, "bosh_job_load_avg05", &[]), Some(0.25));
        assert!(family(&families, "bosh_job_load_avg15").is_none());
        assert!(family(&families, "bosh_job_mem_kb").is_none());
        assert!(family(&families, "bosh_job_system_disk_percent").is_none());
    }

    #[test]
    fn test_collect_exports_processes() {
        let families = collect();
        let gorouter = [("bosh_job_process_name", "gorouter")];
        let metron = [("bosh_job_process_name", "metron")];
        assert_eq!(
            gauge_value(&families, "bosh_job_process_healthy", &gorouter),
            Some(1.0)
        );
        assert_eq!(
            gauge_value(&families, "bosh_job_process_healthy", &metron),
            Some(0.0)
        );
        assert_eq!(
            gauge_value(&families, "bosh_job_process_uptime_seconds", &gorouter),
            Some(120.0)
        );
        assert_eq!(
            gauge_value(&families, "bosh_job_process_cpu_total", &gorouter),
            Some(2.5)
        );
        assert_eq!(
            gauge_value(&families, "bosh_job_process_mem_kb", &gorouter),
            Some(4096.0)
        );
        assert!(gauge_value(&families, "bosh_job_process_uptime_seconds", &metron).is_none());
        assert!(family(&families, "bosh_job_process_mem_percent").is_none());
    }

    #[test]
    fn test_collect_on_empty_snapshot() {
        let collector = JobsCollector::new(&context()).unwrap();
        let families = collector.collect(&Snapshot::incomplete()).unwrap();
        assert!(family(&families, "bosh_job_healthy").is_none());
        assert!(family(&families, "bosh_last_jobs_scrape_timestamp").is_some());
    }
}
