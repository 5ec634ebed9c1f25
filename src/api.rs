use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, TextEncoder};
use tokio::net::ToSocketAddrs;

use crate::collectors::BoshCollector;
use crate::director::Director;
use crate::error::ResultOkLogExt;

async fn metrics<D: Director>(collector: State<Arc<BoshCollector<D>>>) -> Response {
    let families = collector.collect().await;

    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if encoder
        .encode(&families, &mut body)
        .ok_log("failed to encode metrics")
        .is_none()
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        body,
    )
        .into_response()
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        r#"<html>
<head><title>BOSH Exporter</title></head>
<body>
<h1>BOSH Exporter</h1>
<p><a href="{metrics_path}">Metrics</a></p>
</body>
</html>
"#
    )
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    /// Serves the scrape endpoint on `metrics_path` and a landing page on `/`.
    pub fn new<D: Director>(collector: Arc<BoshCollector<D>>, metrics_path: &str) -> Self {
        let page = Html(landing_page(metrics_path));
        let index = move || {
            let page = page.clone();
            async move { page }
        };
        let router = axum::Router::new()
            .route(metrics_path, get(metrics::<D>))
            .with_state(collector)
            .route("/", get(index));
        Self { router }
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}
