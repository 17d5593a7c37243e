use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use mautic_core::exposition::TEXT_CONTENT_TYPE;
use mautic_core::{ExporterError, MetricsSource};
#[cfg(feature = "metrics")]
use mautic_core::metrics::PrometheusHandle;
use tracing::{debug, error};

/// Path the Prometheus server scrapes.
pub const METRICS_PATH: &str = "/metrics";

/// Axum state wrapper for a metrics source.
#[derive(Clone)]
pub struct ExporterState {
    pub source: Arc<dyn MetricsSource>,
    /// Handle of the exporter's own recorder, rendered after the database metrics.
    #[cfg(feature = "metrics")]
    pub recorder: Option<PrometheusHandle>,
}

impl ExporterState {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self {
            source,
            #[cfg(feature = "metrics")]
            recorder: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_recorder(mut self, recorder: PrometheusHandle) -> Self {
        self.recorder = Some(recorder);
        self
    }
}

impl FromRef<ExporterState> for Arc<dyn MetricsSource> {
    fn from_ref(state: &ExporterState) -> Self {
        state.source.clone()
    }
}

/// Routes `/` to a landing page and [`METRICS_PATH`] to one collection cycle.
pub fn router(state: ExporterState) -> Router {
    debug!(
        families = state.source.describe().len(),
        "serving metric families"
    );
    Router::new()
        .route("/", get(landing))
        .route(METRICS_PATH, get(scrape))
        .with_state(state)
}

/// Links to the metrics path and lists every family the source exposes.
async fn landing(State(source): State<Arc<dyn MetricsSource>>) -> Html<String> {
    let families: String = source
        .describe()
        .iter()
        .map(|desc| format!("<li><code>{}</code> {}</li>\n", desc.fq_name, desc.help))
        .collect();
    Html(format!(
        "<html>\n<head><title>Mautic Exporter</title></head>\n<body>\n<h1>Mautic Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n<ul>\n{families}</ul>\n</body>\n</html>\n",
        path = METRICS_PATH,
        families = families,
    ))
}

async fn scrape(State(state): State<ExporterState>) -> Response {
    let body = match state.source.collect().await.and_then(|s| s.encode()) {
        Ok(body) => body,
        Err(err) => return failure(err),
    };

    #[cfg(feature = "metrics")]
    let body = match &state.recorder {
        Some(recorder) => body + &recorder.render(),
        None => body,
    };

    ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
}

/// 503 when the database side of the cycle failed, 500 for exporter faults.
fn failure(err: ExporterError) -> Response {
    error!(error = %err, "scrape failed");
    let status = if err.is_cycle_failure() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        format!("An error has occurred while serving metrics:\n\n{}\n", err),
    )
        .into_response()
}
