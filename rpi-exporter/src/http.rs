//! HTTP server for the Prometheus metrics endpoint.

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::RwLock;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::collector::SharedCollector;
use crate::render::{CONTENT_TYPE, format_value, render_text};

/// Counters about the exporter itself. Kept outside the collector.
#[derive(Debug, Clone, Default)]
pub struct ExporterStats {
    /// Scrapes served since startup.
    pub scrapes_total: u64,
    /// Duration of the most recent scrape.
    pub last_scrape_duration: Duration,
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
    stats: Arc<RwLock<ExporterStats>>,
}

/// Create the HTTP router.
fn create_router(
    collector: SharedCollector,
    stats: Arc<RwLock<ExporterStats>>,
    metrics_path: &str,
) -> Router {
    let state = AppState { collector, stats };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint. Runs one scrape per request.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let scrape = state.collector.scrape().await;
    let mut body = render_text(&scrape.metrics);
    let elapsed = started.elapsed();

    let stats = {
        let mut stats = state.stats.write();
        stats.scrapes_total += 1;
        stats.last_scrape_duration = elapsed;
        stats.clone()
    };

    render_exporter_stats(&mut body, state.collector.descriptors().namespace(), &stats);

    debug!(
        metrics = scrape.metrics.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Served scrape"
    );

    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response()
}

/// Append the exporter's own counters.
fn render_exporter_stats(output: &mut String, namespace: &str, stats: &ExporterStats) {
    let prefix = if namespace.is_empty() {
        "exporter".to_string()
    } else {
        format!("{}_exporter", namespace)
    };

    writeln!(output, "# HELP {}_scrapes_total Scrapes served by the exporter", prefix).ok();
    writeln!(output, "# TYPE {}_scrapes_total counter", prefix).ok();
    writeln!(output, "{}_scrapes_total {}", prefix, stats.scrapes_total).ok();

    writeln!(
        output,
        "# HELP {}_last_scrape_duration_seconds Duration of the most recent scrape",
        prefix
    )
    .ok();
    writeln!(output, "# TYPE {}_last_scrape_duration_seconds gauge", prefix).ok();
    writeln!(
        output,
        "{}_last_scrape_duration_seconds {}",
        prefix,
        format_value(stats.last_scrape_duration.as_secs_f64())
    )
    .ok();
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    let stats = state.stats.read();

    // Ready once at least one scrape has been served
    if stats.scrapes_total > 0 {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no scrape served yet\n",
        )
            .into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    stats: Arc<RwLock<ExporterStats>>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(collector: SharedCollector, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            collector,
            stats: Arc::new(RwLock::new(ExporterStats::default())),
            listen_addr,
            metrics_path,
        }
    }

    /// Shared handle to the exporter counters.
    pub fn stats(&self) -> Arc<RwLock<ExporterStats>> {
        self.stats.clone()
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.collector, self.stats, &self.metrics_path);

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScrapeCollector;
    use crate::config::CollectorConfig;
    use crate::error::FetchError;
    use crate::source::{CommandRunner, HardwareSource};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct StaticRunner(&'static [u8]);

    #[async_trait]
    impl CommandRunner for StaticRunner {
        async fn run(
            &self,
            _program: &str,
            _args: &[String],
            _timeout: Duration,
        ) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.to_vec())
        }
    }

    fn make_router(path: &str) -> Router {
        let collector = ScrapeCollector::new(&CollectorConfig::default()).with_hardware(
            HardwareSource::new(
                Arc::new(StaticRunner(b"throttled=0x50005\n")),
                "vcgencmd",
                vec!["get_throttled".to_string()],
                Duration::from_secs(1),
            ),
        );
        create_router(
            Arc::new(collector),
            Arc::new(RwLock::new(ExporterStats::default())),
            path,
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let router = make_router("/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = body_string(response).await;
        assert!(body.contains("rpi_throttled 1\n"));
        assert!(body.contains("rpi_hardware_up 1\n"));
        assert!(body.contains("rpi_exporter_scrapes_total 1\n"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = make_router("/metrics");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint_not_ready() {
        let router = make_router("/metrics");

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // Not ready because nothing was scraped yet
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ready_endpoint_after_scrape() {
        let router = make_router("/metrics");

        let response = router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = make_router("/probe/metrics");

        // Custom path should work
        let response = router
            .clone()
            .oneshot(Request::get("/probe/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Default path should 404
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_fails_when_address_in_use() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let collector = Arc::new(ScrapeCollector::new(&CollectorConfig::default()));
        let server = HttpServer::new(collector, addr, "/metrics".to_string());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = tokio::time::timeout(Duration::from_secs(2), server.run(shutdown_rx)).await;

        let err = result.expect("bind failure must end run").unwrap_err();
        assert!(err.to_string().contains("Failed to bind"));
    }

    #[test]
    fn test_render_exporter_stats() {
        let mut output = String::new();
        let stats = ExporterStats {
            scrapes_total: 3,
            last_scrape_duration: Duration::from_millis(250),
        };

        render_exporter_stats(&mut output, "rpi", &stats);

        assert!(output.contains("# TYPE rpi_exporter_scrapes_total counter\n"));
        assert!(output.contains("rpi_exporter_scrapes_total 3\n"));
        assert!(output.contains("rpi_exporter_last_scrape_duration_seconds 0.25\n"));
    }
}
