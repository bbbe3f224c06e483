//! `/metrics` endpoint in the Prometheus text exposition format

use std::net::SocketAddr;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{TEXT_FORMAT, TextEncoder};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    result::{ExporterError, Result},
    sink::ExporterMetrics,
};

pub fn router(metrics: ExporterMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<ExporterMetrics>) -> Response {
    match TextEncoder::new().encode_to_string(&metrics.gather()) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        },
    }
}

/// Bind `address` and serve until the listener fails
pub async fn serve(address: SocketAddr, metrics: ExporterMetrics) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| ExporterError::server(address, e))?;
    info!(%address, "Serving metrics");

    axum::serve(listener, router(metrics))
        .await
        .map_err(|e| ExporterError::server(address, e))
}
