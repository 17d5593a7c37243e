//! SQLite fixture with the Mautic tables the catalog reads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::catalog::PREFIX_TOKEN;
use crate::collector::{Collector, CollectorSettings};
use crate::error::ExporterResult;

static FIXTURE_SEQ: AtomicUsize = AtomicUsize::new(0);

const SCHEMA: &[&str] = &[
    "CREATE TABLE {prefix}email_stats (id INTEGER PRIMARY KEY AUTOINCREMENT, email_id INTEGER)",
    "CREATE TABLE {prefix}leads (id INTEGER PRIMARY KEY AUTOINCREMENT, date_identified TEXT NULL)",
    "CREATE TABLE {prefix}emails (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE {prefix}campaigns (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE {prefix}lead_lists (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE {prefix}page_hits (id INTEGER PRIMARY KEY, url TEXT)",
    "CREATE TABLE {prefix}webhook_queue (id INTEGER PRIMARY KEY, payload TEXT)",
    "CREATE TABLE {prefix}message_queue (id INTEGER PRIMARY KEY, status TEXT NOT NULL)",
    "CREATE TABLE {prefix}campaign_events (id INTEGER PRIMARY KEY, campaign_id INTEGER, type TEXT NOT NULL)",
    "CREATE TABLE {prefix}campaign_lead_event_failed_log (log_id INTEGER PRIMARY KEY, reason TEXT)",
    "CREATE TABLE {prefix}notifications (id INTEGER PRIMARY KEY, header TEXT)",
    "CREATE TABLE {prefix}page_redirects (id INTEGER PRIMARY KEY, url TEXT)",
    "CREATE TABLE {prefix}campaign_leads (campaign_id INTEGER NOT NULL, lead_id INTEGER NOT NULL, manually_removed INTEGER NOT NULL DEFAULT 0)",
    "CREATE TABLE {prefix}lead_lists_leads (leadlist_id INTEGER NOT NULL, lead_id INTEGER NOT NULL)",
    // An empty MySQL table reports AUTO_INCREMENT = 1; sqlite_sequence only gets a row on first insert.
    "INSERT INTO sqlite_sequence (name, seq) VALUES ('{prefix}email_stats', 0)",
];

/// A file-backed SQLite database holding the Mautic schema.
///
/// Every collection cycle opens its own connection, so an in-memory database would
/// vanish between cycles. The file lives in a private temp directory removed on drop.
pub struct FixtureDatabase {
    dir: PathBuf,
    options: SqliteConnectOptions,
    pool: SqlitePool,
    table_prefix: String,
}

impl FixtureDatabase {
    /// Creates the schema with no table prefix.
    pub async fn new() -> Result<Self, sqlx::Error> {
        Self::with_prefix("").await
    }

    /// Creates the schema with every table name prefixed by `table_prefix`.
    pub async fn with_prefix(table_prefix: &str) -> Result<Self, sqlx::Error> {
        let dir = unique_temp_dir();
        std::fs::create_dir_all(&dir)?;
        let options = SqliteConnectOptions::new()
            .filename(dir.join("mautic.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;

        let fixture = Self {
            dir,
            options,
            pool,
            table_prefix: table_prefix.to_owned(),
        };
        for statement in SCHEMA {
            fixture.execute(statement).await?;
        }
        Ok(fixture)
    }

    /// Options pointing at the fixture file.
    pub fn options(&self) -> SqliteConnectOptions {
        self.options.clone()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Executes `sql` after replacing `{prefix}` with the fixture's table prefix.
    pub async fn execute(&self, sql: &str) -> Result<u64, sqlx::Error> {
        let sql = sql.replace(PREFIX_TOKEN, &self.table_prefix);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Executes `sql` `times` times.
    pub async fn repeat(&self, sql: &str, times: usize) -> Result<(), sqlx::Error> {
        for _ in 0..times {
            self.execute(sql).await?;
        }
        Ok(())
    }

    /// Settings matching the fixture (schema `main`, fixture prefix, default timeout).
    pub fn settings(&self) -> CollectorSettings {
        CollectorSettings::new("main").with_table_prefix(self.table_prefix.clone())
    }

    /// A collector reading this fixture.
    pub fn collector(&self) -> ExporterResult<Collector<sqlx::Sqlite>> {
        Collector::new(self.options(), self.settings())
    }

    /// Options for a database file that does not exist and will not be created.
    pub fn unreachable_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(unique_temp_dir().join("missing").join("mautic.db"))
            .create_if_missing(false)
    }
}

impl Drop for FixtureDatabase {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn unique_temp_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = FIXTURE_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "mautic_fixture_{}_{}_{}",
        std::process::id(),
        nanos,
        seq
    ))
}
