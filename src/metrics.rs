use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::info;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Called once at startup, before any
/// counter is touched.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("pipeline.cycle_ms".to_string()),
            &[0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0],
        )
        .expect("failed to set buckets for pipeline.cycle_ms")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Process-level gauges updated every few seconds
pub async fn process_metrics_task() {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
                for line in status.lines() {
                    if line.starts_with("VmRSS:") {
                        if let Some(kb_str) = line.split_whitespace().nth(1)
                            && let Ok(kb) = kb_str.parse::<f64>()
                        {
                            metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
                        }
                        break;
                    }
                }
            }
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Zero-initialize the counters so dashboards show series before the first
/// event occurs.
pub fn initialize_pipeline_metrics() {
    metrics::counter!("poller.fetch_success_total", "source" => "1090").absolute(0);
    metrics::counter!("poller.fetch_failed_total", "source" => "1090").absolute(0);
    metrics::counter!("pipeline.sightings_stored_total").absolute(0);
    metrics::counter!("pipeline.sessions_opened_total").absolute(0);
    metrics::counter!("sessions.cache_swept_total").absolute(0);
    metrics::gauge!("sessions.open").set(0.0);

    metrics::counter!("safety.events_emitted_total").absolute(0);
    metrics::counter!("safety.events_stored_total").absolute(0);
    metrics::counter!("safety.events_expired_total").absolute(0);
    metrics::gauge!("safety.tracked_aircraft").set(0.0);
    metrics::gauge!("safety.active_events").set(0.0);

    metrics::counter!("alerts.fired_total").absolute(0);
    metrics::counter!("alerts.history_stored_total").absolute(0);
    metrics::gauge!("alerts.compiled_rules").set(0.0);

    metrics::counter!("acars.messages_total", "source" => "acars").absolute(0);
    metrics::counter!("acars.messages_total", "source" => "vdlm2").absolute(0);
    metrics::counter!("acars.errors_total", "source" => "acars").absolute(0);
    metrics::counter!("acars.duplicates_total", "source" => "acars").absolute(0);
    metrics::counter!("acars.messages_stored_total").absolute(0);

    metrics::counter!("notifications.sent_total").absolute(0);
    metrics::counter!("notifications.suppressed_total").absolute(0);
    metrics::gauge!("fanout.subscribers").set(0.0);
}

/// Serve /metrics (and a trivial /healthz) on the configured port.
pub async fn start_metrics_server(port: u16) {
    let handle = init_metrics();
    METRICS_HANDLE
        .set(handle)
        .expect("Metrics handle already initialized");

    tokio::spawn(process_metrics_task());

    let app = Router::new()
        .route(
            "/metrics",
            get(|| async {
                let handle = METRICS_HANDLE.get().expect("Metrics handle not initialized");
                handle.render()
            }),
        )
        .route("/healthz", get(|| async { "ok" }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind metrics server");

    axum::serve(listener, app).await.expect("Metrics server failed");
}
