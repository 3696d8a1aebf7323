//! Prometheus metrics HTTP server.
//!
//! Exposes decoder statistics in Prometheus text format and the most
//! recently acquired fix as JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::fix::FixRecord;
use crate::stats::DecoderStats;

#[derive(Clone)]
struct AppState {
    stats: Arc<DecoderStats>,
    latest: watch::Receiver<FixRecord>,
}

/// Start the metrics HTTP server.
///
/// Serves `/metrics`, `/health` and `/fix`. Returns an error if the server
/// fails to bind to the port.
pub async fn start_metrics_server(
    port: u16,
    stats: Arc<DecoderStats>,
    latest: watch::Receiver<FixRecord>,
) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/fix", get(fix_handler))
        .with_state(AppState { stats, latest });

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&state.stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

/// Latest acquired fix; empty until the first acquisition succeeds.
async fn fix_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.latest.borrow().clone();
    Json(snapshot)
}

fn push_counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}

/// Format statistics as Prometheus text format.
fn format_prometheus_metrics(stats: &DecoderStats) -> String {
    let summary = stats.summary();
    let mut output = String::with_capacity(2048);

    output.push_str("# HELP nmea_uptime_seconds Time since the decoder started\n");
    output.push_str("# TYPE nmea_uptime_seconds gauge\n");
    output.push_str(&format!("nmea_uptime_seconds {:.3}\n", summary.elapsed_secs));

    push_counter(
        &mut output,
        "nmea_bytes_read_total",
        "Bytes read from the byte source",
        summary.bytes_read,
    );

    output.push_str("# HELP nmea_sentences_total Sentences classified, by type\n");
    output.push_str("# TYPE nmea_sentences_total counter\n");
    let mut types: Vec<_> = summary.sentences_by_type.iter().collect();
    types.sort();
    for (kind, count) in types {
        output.push_str(&format!("nmea_sentences_total{{type=\"{}\"}} {}\n", kind, count));
    }
    if summary.sentences_by_type.is_empty() {
        output.push_str(&format!("nmea_sentences_total {}\n", summary.sentences));
    }

    push_counter(
        &mut output,
        "nmea_discarded_frames_total",
        "Lines discarded as garbled",
        summary.discarded_frames,
    );
    push_counter(
        &mut output,
        "nmea_transport_errors_total",
        "Failed reads from the byte source",
        summary.transport_errors,
    );
    push_counter(
        &mut output,
        "nmea_fixes_total",
        "Acquisitions that produced a usable fix",
        summary.fixes,
    );
    push_counter(
        &mut output,
        "nmea_failed_acquisitions_total",
        "Acquisitions that ended in an error",
        summary.failed_acquisitions,
    );

    if let Some(p) = &summary.length_percentiles {
        output.push_str("# HELP nmea_sentence_length_bytes Sentence length distribution\n");
        output.push_str("# TYPE nmea_sentence_length_bytes summary\n");
        output.push_str(&format!(
            "nmea_sentence_length_bytes{{quantile=\"0.5\"}} {}\n",
            p.p50
        ));
        output.push_str(&format!(
            "nmea_sentence_length_bytes{{quantile=\"0.9\"}} {}\n",
            p.p90
        ));
        output.push_str(&format!(
            "nmea_sentence_length_bytes{{quantile=\"0.99\"}} {}\n",
            p.p99
        ));
    }

    output
}
