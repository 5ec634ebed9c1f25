//! BOSH Exporter: exports the topology and health of BOSH deployments as
//! Prometheus metrics and Prometheus file-based service discovery targets.
//!
//! Every scrape takes one snapshot of the selected deployments from the
//! director and hands it to the enabled collectors, which derive their
//! metrics (and the service discovery file) from that same snapshot.
use std::sync::Arc;

use collectors::{
    BoshCollector, DeploymentsCollector, JobsCollector, MetricsContext, ServiceDiscoveryCollector,
    SnapshotCollector,
};
use deployments::Fetcher;
use director::{Director, HttpDirectorBuilder};
use filters::{AzFilter, CidrFilter, CollectorFilter, DeploymentsFilter, ProcessFilter};

pub mod api;
pub mod collectors;
pub mod config;
pub mod deployments;
pub mod director;
pub mod error;
pub mod filters;
pub mod fsutil;

/// Runs the BOSH Exporter.
///
/// Reads the configuration from the environment, connects to the director
/// and serves metrics until the server stops.
///
/// # Errors
///
/// Possible errors include:
/// - Missing or invalid environment variables (e.g., `BOSH_EXPORTER_DIRECTOR_URL`).
/// - An invalid filter, such as a malformed CIDR or process name pattern.
/// - Failure to reach the director for its name and uuid.
/// - Failure to bind the listen address.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Configured variables: {:?}", config::configured_keys());

    let mut builder = HttpDirectorBuilder::new(config.director.url.as_str());
    builder
        .set_auth(config.director.auth.clone())
        .set_timeout(config.director.timeout)
        .set_task_timeout(config.director.task_timeout);
    if let Some(ca_cert) = &config.director.ca_cert {
        builder.set_ca_cert(ca_cert);
    }
    let director = Arc::new(builder.build()?);

    let info = director.info().await?;
    log::info!(
        "Connected to director `{}` ({}), version {}",
        info.name,
        info.uuid,
        info.version
    );

    let filters = &config.filters;
    let collector_filter = CollectorFilter::new(&filters.collectors)?;
    let context = MetricsContext {
        namespace: config.namespace.clone(),
        environment: config.environment.clone(),
        bosh_name: info.name,
        bosh_uuid: info.uuid,
    };
    let service_discovery = ServiceDiscoveryCollector::new(
        &context,
        config.sd_filename.clone(),
        AzFilter::new(&filters.azs),
        CidrFilter::new(&filters.cidrs)?,
        ProcessFilter::new(&filters.process_names)?,
    )?;
    log::info!(
        "Publishing service discovery targets to `{}`",
        service_discovery.path().display()
    );
    let collectors: Vec<Arc<dyn SnapshotCollector>> = vec![
        Arc::new(DeploymentsCollector::new(&context)?),
        Arc::new(JobsCollector::new(&context)?),
        Arc::new(service_discovery),
    ];

    let mut fetcher = Fetcher::new(director, DeploymentsFilter::new(&filters.deployments));
    if let Some(limit) = config.max_concurrent_fetches {
        fetcher = fetcher.with_concurrency_limit(limit);
    }
    let collector = BoshCollector::new(&context, fetcher, collectors, &collector_filter)?;
    log::info!(
        "Enabled collectors: {}",
        collector.collector_names().join(", ")
    );
    log::debug!(
        "Exporting {} metric descriptors",
        collector.describe().await.len()
    );

    api::APIServer::new(Arc::new(collector), &config.metrics_path)
        .listen(config.listen_address.as_str())
        .await?;
    Ok(())
}
