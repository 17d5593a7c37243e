use std::net::SocketAddr;
use std::time::Duration;

use crate::collector::{CollectorSettings, DEFAULT_CYCLE_TIMEOUT};
use crate::error::{ExporterError, ExporterResult};

/// Address the exposition endpoint listens on by default.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:9851";

/// Startup configuration of one exporter process.
#[derive(Clone)]
pub struct ExporterConfig {
    pub host: String,
    pub port: u16,
    /// Database name. Required.
    pub db: String,
    /// Database user. Required.
    pub user: String,
    pub pass: String,
    pub table_prefix: String,
    pub listen: SocketAddr,
    /// Per-cycle timeout; `None` disables it.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("table_prefix", &self.table_prefix)
            .field("listen", &self.listen)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3306,
            db: String::new(),
            user: String::new(),
            pass: String::new(),
            table_prefix: String::new(),
            listen: SocketAddr::from(([0, 0, 0, 0], 9851)),
            timeout: Some(DEFAULT_CYCLE_TIMEOUT),
        }
    }
}

impl ExporterConfig {
    /// Checks required values and the table prefix.
    pub fn validate(&self) -> ExporterResult<()> {
        if self.db.trim().is_empty() {
            return Err(ExporterError::Config("flag --db=<name> required".to_owned()));
        }
        if self.user.trim().is_empty() {
            return Err(ExporterError::Config(
                "flag --user=<username> required".to_owned(),
            ));
        }
        validate_table_prefix(&self.table_prefix)?;
        Ok(())
    }

    /// `host:port` of the database server.
    pub fn db_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings::new(self.db.clone())
            .with_table_prefix(self.table_prefix.clone())
            .with_timeout(self.timeout)
    }

    /// Connection options for the MySQL backend.
    #[cfg(feature = "mysql")]
    pub fn mysql_options(&self) -> sqlx::mysql::MySqlConnectOptions {
        let options = sqlx::mysql::MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.db);
        if self.pass.is_empty() {
            options
        } else {
            options.password(&self.pass)
        }
    }
}

/// Rejects prefixes that could escape a table identifier.
///
/// The prefix is spliced verbatim in front of table names, so only the characters MySQL
/// accepts in unquoted identifiers are allowed.
pub fn validate_table_prefix(prefix: &str) -> ExporterResult<()> {
    match prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$'))
    {
        Some(bad) => Err(ExporterError::Config(format!(
            "table prefix '{}' contains invalid character '{}'",
            prefix, bad
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ExporterConfig {
        ExporterConfig {
            db: "mautic".to_owned(),
            user: "exporter".to_owned(),
            ..ExporterConfig::default()
        }
    }

    #[test]
    fn defaults_match_the_documented_flags() {
        let config = ExporterConfig::default();
        assert_eq!(config.db_address(), "127.0.0.1:3306");
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.table_prefix, "");
    }

    #[test]
    fn db_and_user_are_required() {
        assert!(valid().validate().is_ok());

        let missing_db = ExporterConfig {
            db: String::new(),
            ..valid()
        };
        let err = missing_db.validate().expect_err("db required");
        assert!(err.to_string().contains("--db"));

        let missing_user = ExporterConfig {
            user: "  ".to_owned(),
            ..valid()
        };
        let err = missing_user.validate().expect_err("user required");
        assert!(err.to_string().contains("--user"));
    }

    #[test]
    fn prefix_with_sql_is_rejected() {
        let config = ExporterConfig {
            table_prefix: "mt_; DROP TABLE leads; --".to_owned(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ExporterError::Config(_))));
    }

    #[test]
    fn debug_output_hides_password() {
        let config = ExporterConfig {
            pass: "hunter2".to_owned(),
            ..valid()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn settings_carry_schema_prefix_and_timeout() {
        let config = ExporterConfig {
            table_prefix: "mt_".to_owned(),
            timeout: None,
            ..valid()
        };
        let settings = config.collector_settings();
        assert_eq!(settings.schema, "mautic");
        assert_eq!(settings.table_prefix, "mt_");
        assert!(settings.timeout.is_none());
    }
}
