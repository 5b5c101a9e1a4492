/// Prometheus scrape endpoint
use crate::{metrics, AppContext};
use axum::{http::header, response::IntoResponse, routing::get, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/metrics", get(scrape))
}

async fn scrape() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather(),
    )
}
