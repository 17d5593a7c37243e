use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use prometheus::core::{Collector as _, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::{GaugeVec, Opts};
use sqlx::{ConnectOptions, Connection, Database, IntoArguments};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{self, CatalogEntry, MetricShape, QueryContext};
use crate::dialect::SqlDialect;
use crate::error::{ExporterError, ExporterResult};
use crate::exposition::Snapshot;

/// Default upper bound for one collection cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection options for backend `DB`.
pub type ConnectOptionsOf<DB> = <<DB as Database>::Connection as Connection>::Options;

/// Per-deployment values bound into the collector at construction.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Database (schema) name, used by the auto-increment lookup.
    pub schema: String,
    pub table_prefix: String,
    /// Upper bound for one cycle; `None` waits for the driver.
    pub timeout: Option<Duration>,
}

impl CollectorSettings {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table_prefix: String::new(),
            timeout: Some(DEFAULT_CYCLE_TIMEOUT),
        }
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Exposition-side state of one catalog entry.
enum Family {
    /// Scalar entries are emitted as fresh const samples every cycle.
    Scalar(Desc),
    /// Vector entries keep their label set between cycles and are reset before each update.
    Vector(GaugeVec),
}

impl Family {
    fn build(entry: &CatalogEntry) -> ExporterResult<Self> {
        let metric = &entry.metric;
        match metric.shape {
            MetricShape::Counter | MetricShape::Gauge => Ok(Self::Scalar(Desc::new(
                metric.fq_name(),
                metric.help.to_owned(),
                Vec::new(),
                HashMap::new(),
            )?)),
            MetricShape::GaugeVec { label } => Ok(Self::Vector(GaugeVec::new(
                Opts::new(metric.fq_name(), metric.help),
                &[label],
            )?)),
        }
    }

    fn descs(&self) -> Vec<&Desc> {
        match self {
            Self::Scalar(desc) => vec![desc],
            Self::Vector(vec) => vec.desc(),
        }
    }
}

/// Runs the query catalog against one database and shapes the results into metric families.
///
/// Cycles are serialized: a scrape that arrives while another is collecting waits for it,
/// so the reset-then-repopulate step of vector metrics is never observed half done.
pub struct Collector<DB: SqlDialect> {
    options: ConnectOptionsOf<DB>,
    settings: CollectorSettings,
    entries: Vec<(&'static CatalogEntry, Family)>,
    cycle: Mutex<()>,
    _db: PhantomData<fn() -> DB>,
}

impl<DB: SqlDialect> std::fmt::Debug for Collector<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Connection options carry the password.
        f.debug_struct("Collector")
            .field("backend", &DB::backend_name())
            .field("settings", &self.settings)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<DB: SqlDialect> Collector<DB> {
    /// Builds the collector and every metric descriptor of the catalog.
    pub fn new(options: ConnectOptionsOf<DB>, settings: CollectorSettings) -> ExporterResult<Self> {
        let entries = catalog::catalog()
            .iter()
            .map(|entry| Family::build(entry).map(|family| (entry, family)))
            .collect::<ExporterResult<Vec<_>>>()?;

        Ok(Self {
            options,
            settings,
            entries,
            cycle: Mutex::new(()),
            _db: PhantomData,
        })
    }

    /// Descriptors of every catalog metric, in catalog order.
    ///
    /// Pure: no I/O, independent of earlier collections.
    pub fn describe(&self) -> Vec<&Desc> {
        self.entries
            .iter()
            .flat_map(|(_, family)| family.descs())
            .collect()
    }
}

impl<DB> Collector<DB>
where
    DB: SqlDialect,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
    for<'c> &'c mut <DB as Database>::Connection: sqlx::Executor<'c, Database = DB>,
{
    /// Runs one collection cycle.
    ///
    /// Any connection, query or scan failure aborts the cycle and nothing is returned for
    /// it. The connection is closed before returning, and dropped if the cycle times out.
    pub async fn collect(&self) -> ExporterResult<Snapshot> {
        let start = Instant::now();
        // The limit covers waiting for an overlapping cycle as well.
        let cycle = async {
            let _cycle = self.cycle.lock().await;
            self.run_cycle().await
        };

        let outcome = match self.settings.timeout {
            Some(limit) => match tokio::time::timeout(limit, cycle).await {
                Ok(result) => result,
                Err(_) => Err(ExporterError::Timeout(limit)),
            },
            None => cycle.await,
        };

        let elapsed = start.elapsed();
        record_scrape_metrics(elapsed, outcome.is_ok());
        match &outcome {
            Ok(snapshot) => info!(
                backend = DB::backend_name(),
                samples = snapshot.sample_count(),
                elapsed_ms = elapsed.as_millis() as u64,
                "collection cycle finished"
            ),
            Err(err) => warn!(
                backend = DB::backend_name(),
                error = %err,
                elapsed_ms = elapsed.as_millis() as u64,
                "collection cycle failed"
            ),
        }
        outcome
    }

    async fn run_cycle(&self) -> ExporterResult<Snapshot> {
        let mut conn = self
            .options
            .connect()
            .await
            .map_err(ExporterError::Connect)?;

        let result = self.query_all(&mut conn).await;

        if let Err(err) = conn.close().await {
            warn!(error = %err, "closing database connection failed");
        }
        result
    }

    async fn query_all(&self, conn: &mut DB::Connection) -> ExporterResult<Snapshot> {
        let ctx = QueryContext {
            schema: &self.settings.schema,
            table_prefix: &self.settings.table_prefix,
        };
        let mut families = Vec::with_capacity(self.entries.len());

        for (entry, family) in &self.entries {
            let metric = entry.metric.name;
            let fail = |source: sqlx::Error| ExporterError::Query { metric, source };
            let sql = entry.query.render::<DB>(&ctx);
            let start = Instant::now();

            let rows = match family {
                Family::Scalar(desc) => {
                    let row = sqlx::query::<DB>(&sql)
                        .fetch_one(&mut *conn)
                        .await
                        .map_err(fail)?;
                    let value = DB::decode_number(&row, 0).map_err(fail)?;
                    families.push(const_family(desc, entry.metric.shape, value));
                    1
                }
                Family::Vector(vec) => {
                    let rows = sqlx::query::<DB>(&sql)
                        .fetch_all(&mut *conn)
                        .await
                        .map_err(fail)?;
                    vec.reset();
                    for row in &rows {
                        let label = DB::decode_label(row, 0).map_err(fail)?;
                        let value = DB::decode_number(row, 1).map_err(fail)?;
                        vec.with_label_values(&[label.as_str()]).set(value);
                    }
                    families.extend(vec.collect().into_iter().map(sort_by_label));
                    rows.len()
                }
            };

            let elapsed = start.elapsed();
            record_query_metrics(metric, elapsed);
            debug!(
                metric,
                rows,
                elapsed_us = elapsed.as_micros() as u64,
                sql = %sql,
                "catalog query"
            );
        }

        Ok(Snapshot::new(families))
    }
}

/// Object-safe view of a collector, used by the HTTP layer.
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    /// Descriptors of every metric this source can produce.
    fn describe(&self) -> Vec<&Desc>;
    /// Runs one collection cycle.
    async fn collect(&self) -> ExporterResult<Snapshot>;
}

macro_rules! impl_metrics_source {
    ($db:ty) => {
        #[async_trait::async_trait]
        impl MetricsSource for Collector<$db> {
            fn describe(&self) -> Vec<&Desc> {
                Collector::describe(self)
            }

            async fn collect(&self) -> ExporterResult<Snapshot> {
                Collector::collect(self).await
            }
        }
    };
}

#[cfg(feature = "mysql")]
impl_metrics_source!(sqlx::MySql);
#[cfg(feature = "sqlite")]
impl_metrics_source!(sqlx::Sqlite);

/// Builds a single-sample family, the equivalent of a const metric.
fn const_family(desc: &Desc, shape: MetricShape, value: f64) -> MetricFamily {
    let mut metric = proto::Metric::default();
    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());

    if shape == MetricShape::Counter {
        let mut counter = proto::Counter::default();
        counter.set_value(value);
        metric.set_counter(counter);
        family.set_field_type(MetricType::COUNTER);
    } else {
        let mut gauge = proto::Gauge::default();
        gauge.set_value(value);
        metric.set_gauge(gauge);
        family.set_field_type(MetricType::GAUGE);
    }

    family.mut_metric().push(metric);
    family
}

fn sort_by_label(mut family: MetricFamily) -> MetricFamily {
    family
        .mut_metric()
        .sort_by_key(|m| m.get_label().first().map(|l| l.get_value().to_owned()));
    family
}

#[cfg(feature = "metrics")]
fn record_scrape_metrics(elapsed: Duration, success: bool) {
    let result = if success { "success" } else { "error" };
    metrics::histogram!("mautic_exporter_scrape_duration_seconds").record(elapsed.as_secs_f64());
    metrics::counter!("mautic_exporter_scrapes_total", "result" => result).increment(1);
    metrics::gauge!("mautic_exporter_last_scrape_success").set(if success { 1.0 } else { 0.0 });
}

#[cfg(not(feature = "metrics"))]
fn record_scrape_metrics(_elapsed: Duration, _success: bool) {}

#[cfg(feature = "metrics")]
fn record_query_metrics(metric: &'static str, elapsed: Duration) {
    metrics::histogram!("mautic_exporter_query_duration_seconds", "metric" => metric)
        .record(elapsed.as_secs_f64());
}

#[cfg(not(feature = "metrics"))]
fn record_query_metrics(_metric: &'static str, _elapsed: Duration) {}
