//! The fixed set of metrics this exporter publishes and the query behind each one.
//!
//! Metric names are an external contract shared with dashboards and alert rules; do not
//! rename entries. Table names carry a `{prefix}` token that is replaced at execution
//! time, so the same catalog serves any table prefix.

use crate::dialect::SqlDialect;

/// Namespace prepended to every catalog metric name.
pub const NAMESPACE: &str = "mautic";

/// Label name shared by all vector metrics.
pub const VECTOR_LABEL: &str = "type";

/// Token replaced by the configured table prefix.
pub const PREFIX_TOKEN: &str = "{prefix}";

/// How a query result maps onto exposed samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricShape {
    /// One row, one column, exposed as a counter.
    Counter,
    /// One row, one column, exposed as a gauge.
    Gauge,
    /// Zero or more `(label, value)` rows, one gauge sample per label value.
    GaugeVec {
        /// Name of the label carrying column 0.
        label: &'static str,
    },
}

impl MetricShape {
    /// Returns true for single-sample shapes.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::GaugeVec { .. })
    }
}

/// Immutable descriptor of one exposed metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    /// Name without the namespace, e.g. `leads_total`.
    pub name: &'static str,
    pub help: &'static str,
    pub shape: MetricShape,
}

impl MetricDefinition {
    /// Fully qualified name, e.g. `mautic_leads_total`.
    pub fn fq_name(&self) -> String {
        format!("{}_{}", NAMESPACE, self.name)
    }
}

/// Values substituted into a template when it is rendered.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    /// Database (schema) name, used by the auto-increment lookup.
    pub schema: &'a str,
    pub table_prefix: &'a str,
}

/// SQL text bound to one metric definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTemplate {
    /// Portable SQL containing [`PREFIX_TOKEN`] before each table name.
    Sql(&'static str),
    /// Next auto-increment identifier of a prefixed table.
    NextId {
        /// Table name without prefix.
        table: &'static str,
    },
}

impl QueryTemplate {
    /// Renders the template for backend `DB`.
    pub fn render<DB: SqlDialect>(&self, ctx: &QueryContext<'_>) -> String {
        match self {
            Self::Sql(template) => template.replace(PREFIX_TOKEN, ctx.table_prefix),
            Self::NextId { table } => {
                let table = format!("{}{}", ctx.table_prefix, table);
                DB::next_id_sql(ctx.schema, &table)
            }
        }
    }
}

/// One catalog row: what is exposed and how it is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub metric: MetricDefinition,
    pub query: QueryTemplate,
}

const fn counter(name: &'static str, help: &'static str, query: QueryTemplate) -> CatalogEntry {
    CatalogEntry {
        metric: MetricDefinition {
            name,
            help,
            shape: MetricShape::Counter,
        },
        query,
    }
}

const fn gauge(name: &'static str, help: &'static str, query: QueryTemplate) -> CatalogEntry {
    CatalogEntry {
        metric: MetricDefinition {
            name,
            help,
            shape: MetricShape::Gauge,
        },
        query,
    }
}

const fn gauge_vec(name: &'static str, help: &'static str, query: QueryTemplate) -> CatalogEntry {
    CatalogEntry {
        metric: MetricDefinition {
            name,
            help,
            shape: MetricShape::GaugeVec {
                label: VECTOR_LABEL,
            },
        },
        query,
    }
}

static CATALOG: [CatalogEntry; 15] = [
    counter(
        "emails_sent_total",
        "Shows the number of emails sent in Mautic (AUTO_INCREMENT value)",
        QueryTemplate::NextId {
            table: "email_stats",
        },
    ),
    gauge(
        "leads_total",
        "Shows the number of leads in Mautic",
        QueryTemplate::Sql(
            "SELECT COUNT(id) FROM {prefix}leads WHERE date_identified IS NOT NULL",
        ),
    ),
    gauge(
        "anonymous_total",
        "Shows the number of anonymous in Mautic",
        QueryTemplate::Sql("SELECT COUNT(id) FROM {prefix}leads WHERE date_identified IS NULL"),
    ),
    gauge(
        "emails_total",
        "Shows the number of emails in Mautic",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}emails"),
    ),
    gauge(
        "campaigns_total",
        "Shows the number of campaigns in Mautic",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}campaigns"),
    ),
    gauge(
        "segments_total",
        "Shows the number of segments in Mautic",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}lead_lists"),
    ),
    counter(
        "page_hits_total",
        "Shows the number of page hits in Mautic",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}page_hits"),
    ),
    gauge(
        "webhook_total",
        "Shows the number of webhook in Mautic's queue",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}webhook_queue"),
    ),
    gauge_vec(
        "queue_total",
        "Shows the number of message in Mautic's queue",
        QueryTemplate::Sql(
            "SELECT status AS label, COUNT(*) AS value FROM {prefix}message_queue GROUP BY status",
        ),
    ),
    gauge_vec(
        "campaign_events_total",
        "Shows the number of campaign events in Mautic",
        QueryTemplate::Sql(
            "SELECT type AS label, COUNT(*) AS value FROM {prefix}campaign_events GROUP BY type",
        ),
    ),
    counter(
        "lead_event_failed_total",
        "Shows the number of failed events on leads",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}campaign_lead_event_failed_log"),
    ),
    gauge(
        "notifications_total",
        "Shows the number of notifications in Mautic",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}notifications"),
    ),
    counter(
        "page_redirect_total",
        "Shows the number of page redirects in Mautic",
        QueryTemplate::Sql("SELECT COUNT(*) FROM {prefix}page_redirects"),
    ),
    gauge_vec(
        "leads_in_campaign_total",
        "Shows the number of leads in a campaign",
        QueryTemplate::Sql(
            "SELECT campaign_id AS label, COUNT(*) AS value FROM {prefix}campaign_leads WHERE manually_removed = 0 GROUP BY campaign_id",
        ),
    ),
    gauge_vec(
        "leads_in_segment_total",
        "Shows the number of leads in a segment",
        QueryTemplate::Sql(
            "SELECT leadlist_id AS label, COUNT(*) AS value FROM {prefix}lead_lists_leads GROUP BY leadlist_id",
        ),
    ),
];

/// Returns the catalog in execution order.
pub fn catalog() -> &'static [CatalogEntry] {
    &CATALOG
}
