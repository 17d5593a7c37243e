use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mautic_axum::{ExporterState, METRICS_PATH, router};
use mautic_core::metrics::install_prometheus_recorder;
use mautic_core::{Collector, ExporterConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "mautic_exporter")]
#[command(about = "Prometheus exporter for Mautic databases", long_about = None)]
#[command(version)]
struct Cli {
    /// MySQL host
    #[arg(long, env = "MAUTIC_DB_HOST", default_value = "127.0.0.1")]
    host: String,
    /// MySQL port
    #[arg(long, env = "MAUTIC_DB_PORT", default_value_t = 3306)]
    port: u16,
    /// Mautic database name (required)
    #[arg(long, env = "MAUTIC_DB_NAME", default_value = "")]
    db: String,
    /// Database user (required)
    #[arg(long, env = "MAUTIC_DB_USER", default_value = "")]
    user: String,
    /// Database password
    #[arg(long, env = "MAUTIC_DB_PASS", default_value = "", hide_env_values = true)]
    pass: String,
    /// Prefix of every Mautic table
    #[arg(long = "tableprefix", env = "MAUTIC_TABLE_PREFIX", default_value = "")]
    table_prefix: String,
    /// Address of the metrics endpoint
    #[arg(long, env = "MAUTIC_EXPORTER_LISTEN", default_value = mautic_core::config::DEFAULT_LISTEN)]
    listen: SocketAddr,
    /// Per-scrape timeout in seconds, 0 disables it
    #[arg(long, env = "MAUTIC_SCRAPE_TIMEOUT", default_value_t = 10)]
    timeout: u64,
    /// Log filter, e.g. `debug` or `mautic_core=debug` (falls back to RUST_LOG, then `info`)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> ExporterConfig {
        ExporterConfig {
            host: self.host,
            port: self.port,
            db: self.db,
            user: self.user,
            pass: self.pass,
            table_prefix: self.table_prefix,
            listen: self.listen,
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = cli.into_config();
    if let Err(err) = config.validate() {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "exporter stopped");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = log_filter(log_level);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--log-level` wins over `RUST_LOG`; anything unparsable falls back to `info`.
fn log_filter(log_level: Option<&str>) -> EnvFilter {
    match log_level {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn run(config: ExporterConfig) -> Result<(), BoxError> {
    let recorder = install_prometheus_recorder()?;
    let collector = Collector::<mautic_core::sqlx::MySql>::new(
        config.mysql_options(),
        config.collector_settings(),
    )?;
    info!(
        database = %config.db_address(),
        table_prefix = %config.table_prefix,
        timeout = ?config.timeout,
        "collector ready"
    );

    let state = ExporterState::new(Arc::new(collector)).with_recorder(recorder);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!("listening on http://{}{}", listener.local_addr()?, METRICS_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["mautic_exporter"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_onto_the_config() {
        let config = parse(&[
            "--host",
            "db.internal",
            "--port",
            "3307",
            "--db",
            "mautic",
            "--user",
            "exporter",
            "--pass",
            "secret",
            "--tableprefix",
            "mt_",
            "--listen",
            "127.0.0.1:9999",
            "--timeout",
            "3",
        ])
        .into_config();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);
        assert_eq!(config.db, "mautic");
        assert_eq!(config.user, "exporter");
        assert_eq!(config.pass, "secret");
        assert_eq!(config.table_prefix, "mt_");
        assert_eq!(config.listen, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_disables_the_limit() {
        let config = parse(&["--db", "mautic", "--user", "u", "--timeout", "0"]).into_config();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn missing_database_fails_validation() {
        let config = parse(&["--user", "exporter"]).into_config();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("--db"));
    }

    #[test]
    fn log_level_flag_builds_the_filter() {
        assert!(log_filter(Some("mautic_core=trace")).to_string().contains("mautic_core=trace"));
        assert_eq!(log_filter(Some("mautic_core=loud")).to_string(), "info");
    }

    #[test]
    fn bad_port_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["mautic_exporter", "--port", "not-a-port"]).is_err());
    }
}
