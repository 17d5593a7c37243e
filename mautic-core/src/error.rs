use std::time::Duration;

/// Exporter error type with actionable variants.
#[derive(Debug)]
pub enum ExporterError {
    /// Startup configuration is missing or invalid.
    Config(String),
    /// The database could not be reached at the start of a cycle.
    Connect(sqlx::Error),
    /// A catalog query failed to execute or its result could not be scanned.
    Query {
        /// Short name of the catalog metric whose query failed.
        metric: &'static str,
        source: sqlx::Error,
    },
    /// The collection cycle did not finish within the configured limit.
    Timeout(Duration),
    /// Metric descriptor construction or text encoding failed.
    Metric(prometheus::Error),
    /// The self-instrumentation recorder could not be installed.
    Recorder(String),
}

impl std::fmt::Display for ExporterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(message) => write!(f, "configuration error: {}", message),
            Self::Connect(err) => write!(f, "database connection failed: {}", err),
            Self::Query { metric, source } => {
                write!(f, "query for metric '{}' failed: {}", metric, source)
            }
            Self::Timeout(limit) => {
                write!(f, "collection cycle exceeded {:.3}s", limit.as_secs_f64())
            }
            Self::Metric(err) => write!(f, "metric error: {}", err),
            Self::Recorder(message) => write!(f, "metrics recorder error: {}", message),
        }
    }
}

impl std::error::Error for ExporterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(err) => Some(err),
            Self::Query { source, .. } => Some(source),
            Self::Metric(err) => Some(err),
            Self::Config(_) | Self::Timeout(_) | Self::Recorder(_) => None,
        }
    }
}

impl From<prometheus::Error> for ExporterError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metric(err)
    }
}

/// Result alias for exporter operations.
pub type ExporterResult<T> = Result<T, ExporterError>;

impl ExporterError {
    /// Returns true for failures that belong to a single collection cycle.
    ///
    /// Cycle failures are reported to the scrape caller; everything else is a
    /// startup problem.
    pub fn is_cycle_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Query { .. } | Self::Timeout(_)
        )
    }
}
