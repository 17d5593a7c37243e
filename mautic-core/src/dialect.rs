use sqlx::Database;
#[cfg(any(feature = "mysql", feature = "sqlite"))]
use sqlx::{ColumnIndex, Row, ValueRef};

/// Backend-specific SQL and row coercion used by the collector.
///
/// Catalog templates are plain SQL apart from the auto-increment lookup, which every
/// engine exposes differently. Result columns arrive with whatever integer width or
/// signedness the schema uses, so coercion into `f64` values and text labels also lives
/// here.
pub trait SqlDialect: Database + Sized + Send + Sync {
    /// Short backend name used in logs.
    fn backend_name() -> &'static str;

    /// Returns SQL yielding the next auto-increment identifier of `table` in `schema`.
    fn next_id_sql(schema: &str, table: &str) -> String;

    /// Reads column `index` of `row` as a 64-bit float.
    fn decode_number(row: &Self::Row, index: usize) -> Result<f64, sqlx::Error>;

    /// Reads column `index` of `row` as label text.
    fn decode_label(row: &Self::Row, index: usize) -> Result<String, sqlx::Error>;

    /// Quotes a string literal.
    fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Fails with a decode error when column `index` is NULL.
///
/// Drivers decode NULL into a default value for some target types, which would turn a
/// missing count or label into a sample.
#[cfg(any(feature = "mysql", feature = "sqlite"))]
fn reject_null<R>(row: &R, index: usize) -> Result<(), sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
{
    if row.try_get_raw(index)?.is_null() {
        return Err(sqlx::Error::ColumnDecode {
            index: index.to_string(),
            source: Box::new(sqlx::error::UnexpectedNullError),
        });
    }
    Ok(())
}

#[cfg(feature = "mysql")]
impl SqlDialect for sqlx::MySql {
    fn backend_name() -> &'static str {
        "mysql"
    }

    fn next_id_sql(schema: &str, table: &str) -> String {
        format!(
            "SELECT AUTO_INCREMENT FROM information_schema.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
            Self::quote_literal(schema),
            Self::quote_literal(table)
        )
    }

    fn decode_number(row: &sqlx::mysql::MySqlRow, index: usize) -> Result<f64, sqlx::Error> {
        reject_null(row, index)?;
        // COUNT() is BIGINT, AUTO_INCREMENT is BIGINT UNSIGNED.
        row.try_get::<i64, _>(index)
            .map(|v| v as f64)
            .or_else(|_| row.try_get::<u64, _>(index).map(|v| v as f64))
            .or_else(|_| row.try_get::<f64, _>(index))
    }

    fn decode_label(row: &sqlx::mysql::MySqlRow, index: usize) -> Result<String, sqlx::Error> {
        reject_null(row, index)?;
        row.try_get::<String, _>(index)
            .or_else(|_| row.try_get::<i64, _>(index).map(|v| v.to_string()))
            .or_else(|_| row.try_get::<u64, _>(index).map(|v| v.to_string()))
            .or_else(|_| {
                // binary collations come back as VARBINARY
                row.try_get::<Vec<u8>, _>(index)
                    .map(|v| String::from_utf8_lossy(&v).into_owned())
            })
    }

    fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }
}

#[cfg(feature = "sqlite")]
impl SqlDialect for sqlx::Sqlite {
    fn backend_name() -> &'static str {
        "sqlite"
    }

    fn next_id_sql(_schema: &str, table: &str) -> String {
        // sqlite_sequence stores the last issued id, MySQL reports the next one.
        format!(
            "SELECT seq + 1 FROM sqlite_sequence WHERE name = {}",
            Self::quote_literal(table)
        )
    }

    fn decode_number(row: &sqlx::sqlite::SqliteRow, index: usize) -> Result<f64, sqlx::Error> {
        reject_null(row, index)?;
        row.try_get::<i64, _>(index)
            .map(|v| v as f64)
            .or_else(|_| row.try_get::<f64, _>(index))
    }

    fn decode_label(row: &sqlx::sqlite::SqliteRow, index: usize) -> Result<String, sqlx::Error> {
        reject_null(row, index)?;
        row.try_get::<String, _>(index)
            .or_else(|_| row.try_get::<i64, _>(index).map(|v| v.to_string()))
            .or_else(|_| row.try_get::<f64, _>(index).map(|v| v.to_string()))
    }
}
