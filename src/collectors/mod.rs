//! Collectors turning a scrape [`Snapshot`] into metrics and discovery targets.
//!
//! [`BoshCollector`] runs one fetch per scrape and hands the snapshot to every
//! enabled [`SnapshotCollector`] at the same time:
//!
//! - [`DeploymentsCollector`] exports releases, stemcells and instance counts.
//! - [`JobsCollector`] exports instance vitals and process health.
//! - [`ServiceDiscoveryCollector`] publishes Prometheus file-based service
//!   discovery targets.
//!
//! Each collector owns its metrics. They are created once from a
//! [`MetricsContext`] and reset at the start of every collect.
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge, GaugeVec, Opts};

use crate::deployments::Snapshot;

mod bosh;
mod deployments;
mod error;
mod jobs;
mod service_discovery;

pub use bosh::BoshCollector;
pub use deployments::DeploymentsCollector;
pub use error::{Error, Result};
pub use jobs::JobsCollector;
pub use service_discovery::{ServiceDiscoveryCollector, TargetGroup};

/// A consumer of the snapshot taken by a scrape.
pub trait SnapshotCollector: Send + Sync {
    /// Name used by the collector filter.
    fn name(&self) -> &'static str;

    /// Descriptors of every metric this collector may export.
    fn describe(&self) -> Vec<Desc>;

    /// Derives the metrics of one scrape from `snapshot`.
    fn collect(&self, snapshot: &Snapshot) -> Result<Vec<MetricFamily>>;
}

/// Identity shared by all exported metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsContext {
    pub namespace: String,
    pub environment: String,
    pub bosh_name: String,
    pub bosh_uuid: String,
}

impl MetricsContext {
    fn opts(&self, subsystem: &str, name: &str, help: &str) -> Opts {
        Opts::new(name, help)
            .namespace(self.namespace.clone())
            .subsystem(subsystem)
            .const_label("environment", self.environment.clone())
            .const_label("bosh_name", self.bosh_name.clone())
            .const_label("bosh_uuid", self.bosh_uuid.clone())
    }

    fn full_name(&self, subsystem: &str, name: &str) -> String {
        [self.namespace.as_str(), subsystem, name]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    fn gauge(&self, subsystem: &str, name: &str, help: &str) -> Result<Gauge> {
        Gauge::with_opts(self.opts(subsystem, name, help)).map_err(|source| Error::Metric {
            name: self.full_name(subsystem, name),
            source,
        })
    }

    fn gauge_vec(
        &self,
        subsystem: &str,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<GaugeVec> {
        GaugeVec::new(self.opts(subsystem, name, help), labels).map_err(|source| Error::Metric {
            name: self.full_name(subsystem, name),
            source,
        })
    }

    fn counter(&self, subsystem: &str, name: &str, help: &str) -> Result<Counter> {
        Counter::with_opts(self.opts(subsystem, name, help)).map_err(|source| Error::Metric {
            name: self.full_name(subsystem, name),
            source,
        })
    }
}

/// The metrics owned by one collector.
#[derive(Default)]
struct MetricSet {
    members: Vec<Box<dyn Collector>>,
}

impl MetricSet {
    /// Adds `metric` to the set and hands back a handle to it.
    fn add<C: Collector + Clone + 'static>(&mut self, metric: C) -> C {
        self.members.push(Box::new(metric.clone()));
        metric
    }

    fn describe(&self) -> Vec<Desc> {
        self.members
            .iter()
            .flat_map(|metric| metric.desc().into_iter().cloned())
            .collect()
    }

    /// Current values, leaving out vectors without any child.
    fn gather(&self) -> Vec<MetricFamily> {
        self.members
            .iter()
            .flat_map(|metric| metric.collect())
            .filter(|family| !family.get_metric().is_empty())
            .collect()
    }
}

/// `<stem>_timestamp` and `<stem>_duration_seconds` of a collector.
struct ScrapeMetrics {
    timestamp: Gauge,
    duration: Gauge,
}

impl ScrapeMetrics {
    fn new(
        context: &MetricsContext,
        metrics: &mut MetricSet,
        stem: &str,
        what: &str,
    ) -> Result<Self> {
        let timestamp = context.gauge(
            "",
            &format!("{stem}_timestamp"),
            &format!("Number of seconds since 1970 since last scrape of {what} metrics."),
        )?;
        let duration = context.gauge(
            "",
            &format!("{stem}_duration_seconds"),
            &format!("Duration of the last scrape of {what} metrics."),
        )?;
        Ok(Self {
            timestamp: metrics.add(timestamp),
            duration: metrics.add(duration),
        })
    }

    fn finish(&self, started: Instant) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        self.timestamp.set(now);
        self.duration.set(started.elapsed().as_secs_f64());
    }
}

/// Serializes collects of one collector, so overlapping scrapes never
/// interleave a reset with another scrape's values.
fn lock_scrape(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parses a value reported as a string, `None` if it was not reported.
fn reported(raw: &str) -> Option<f64> {
    raw.trim().parse().ok()
}
