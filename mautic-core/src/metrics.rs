use metrics_exporter_prometheus::PrometheusBuilder;
pub use metrics_exporter_prometheus::PrometheusHandle;

use crate::error::{ExporterError, ExporterResult};

/// Install the Prometheus recorder for the exporter's own metrics and return the handle for rendering.
pub fn install_prometheus_recorder() -> ExporterResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| ExporterError::Recorder(err.to_string()))?;
    Ok(handle)
}
