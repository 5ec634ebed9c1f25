use std::sync::Arc;
use std::time::Instant;

use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge};
use tokio::task::JoinSet;

use crate::deployments::{Fetcher, Snapshot};
use crate::director::Director;
use crate::error;
use crate::filters::CollectorFilter;

use super::{MetricSet, MetricsContext, Result, ScrapeMetrics, SnapshotCollector};

/// Takes one snapshot per scrape and fans it out to the enabled collectors.
pub struct BoshCollector<D> {
    fetcher: Fetcher<D>,
    collectors: Vec<Arc<dyn SnapshotCollector>>,
    scrapes_total: Counter,
    scrape_errors_total: Counter,
    last_scrape_error: Gauge,
    skipped_deployments: Gauge,
    scrape: ScrapeMetrics,
    metrics: MetricSet,
}

impl<D: Director> BoshCollector<D> {
    /// Keeps the collectors enabled by `filter`; the selection is fixed from here on.
    pub fn new(
        context: &MetricsContext,
        fetcher: Fetcher<D>,
        collectors: Vec<Arc<dyn SnapshotCollector>>,
        filter: &CollectorFilter,
    ) -> Result<Self> {
        let collectors: Vec<_> = collectors
            .into_iter()
            .filter(|collector| filter.enabled(collector.name()))
            .collect();

        let mut metrics = MetricSet::default();
        let scrapes_total = metrics.add(context.counter(
            "",
            "scrapes_total",
            "Total number of scrapes for BOSH metrics.",
        )?);
        let scrape_errors_total = metrics.add(context.counter(
            "",
            "scrape_errors_total",
            "Total number of scrapes errors for BOSH metrics.",
        )?);
        let last_scrape_error = metrics.add(context.gauge(
            "",
            "last_scrape_error",
            "Whether the last scrape of BOSH metrics resulted in an error (1 for error, 0 for success).",
        )?);
        let skipped_deployments = metrics.add(context.gauge(
            "",
            "last_scrape_skipped_deployments",
            "Number of deployments left out of the last scrape because they could not be fetched.",
        )?);
        let scrape = ScrapeMetrics::new(context, &mut metrics, "last_scrape", "BOSH")?;

        Ok(Self {
            fetcher,
            collectors,
            scrapes_total,
            scrape_errors_total,
            last_scrape_error,
            skipped_deployments,
            scrape,
            metrics,
        })
    }

    /// Names of the enabled collectors.
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Descriptors of every metric that may be exported.
    ///
    /// Collectors are asked concurrently; each one's descriptors keep their
    /// order but the collectors may come back in any order.
    pub async fn describe(&self) -> Vec<Desc> {
        let mut tasks = JoinSet::new();
        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            tasks.spawn_blocking(move || collector.describe());
        }

        let mut descs = self.metrics.describe();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(mut collector_descs) => descs.append(&mut collector_descs),
                Err(err) => log::error!("describe task failed: {err}"),
            }
        }
        descs
    }

    /// Runs one scrape.
    ///
    /// A collector that fails is logged and contributes nothing to this
    /// scrape; it never affects the others.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let started = Instant::now();
        self.scrapes_total.inc();

        let snapshot = match self.fetcher.fetch().await {
            Ok(outcome) => {
                self.last_scrape_error.set(0.0);
                self.skipped_deployments.set(outcome.skipped.len() as f64);
                Snapshot::new(outcome.deployments)
            }
            Err(err) => {
                log::error!("{}", error::chain(&err));
                self.scrape_errors_total.inc();
                self.last_scrape_error.set(1.0);
                self.skipped_deployments.set(0.0);
                Snapshot::incomplete()
            }
        };
        let snapshot = Arc::new(snapshot);

        let mut tasks = JoinSet::new();
        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let snapshot = Arc::clone(&snapshot);
            tasks.spawn_blocking(move || (collector.name(), collector.collect(&snapshot)));
        }

        let mut families = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(mut collected))) => families.append(&mut collected),
                Ok((name, Err(err))) => {
                    log::error!("collector `{name}` failed: {}", error::chain(&err));
                }
                Err(err) => log::error!("collector task failed: {err}"),
            }
        }

        self.scrape.finish(started);
        families.extend(self.metrics.gather());
        families
    }
}
