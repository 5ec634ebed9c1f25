/// Entry point for the BOSH Exporter.
///
/// Exports BOSH deployment, job and process metrics for Prometheus and keeps a
/// file-based service discovery file up to date on every scrape.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., missing environment variables,
/// an invalid filter, or an unreachable director).
///
/// # Examples
///
/// ```bash
/// BOSH_EXPORTER_DIRECTOR_URL=https://10.0.0.6:25555 \
/// BOSH_EXPORTER_METRICS_ENVIRONMENT=prod \
/// RUST_LOG=info cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    bosh_exporter::run().await
}
