//! # mautic-core
//!
//! Turns the state of a Mautic database into Prometheus metrics.
//!
//! The [`catalog`] lists every exposed metric with the query that computes it. A
//! [`Collector`] runs the whole catalog over one fresh connection per scrape and returns a
//! [`Snapshot`] ready for text exposition.
//!
//! ```rust,no_run
//! use mautic_core::{Collector, ExporterConfig};
//!
//! # async fn example() -> Result<(), mautic_core::ExporterError> {
//! let config = ExporterConfig {
//!     db: "mautic".to_owned(),
//!     user: "exporter".to_owned(),
//!     ..ExporterConfig::default()
//! };
//! config.validate()?;
//!
//! let collector = Collector::<sqlx::MySql>::new(config.mysql_options(), config.collector_settings())?;
//! let snapshot = collector.collect().await?;
//! println!("{}", snapshot.encode()?);
//! # Ok(())
//! # }
//! ```

pub use sqlx;

pub mod catalog;
pub mod collector;
pub mod config;
pub mod dialect;
pub mod error;
pub mod exposition;
#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(feature = "sqlite")]
pub mod test_utils;

pub use catalog::{CatalogEntry, MetricDefinition, MetricShape, QueryTemplate};
pub use collector::{Collector, CollectorSettings, MetricsSource};
pub use config::ExporterConfig;
pub use dialect::SqlDialect;
pub use error::{ExporterError, ExporterResult};
pub use exposition::Snapshot;
