//! SQLite driver for local dumps: the credential's `database` is a file path.
//!
//! Host and user are ignored. The file is opened read-only and is never
//! created when missing.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection as _, Executor, Row, Statement};
use tracing::warn;

use super::{Connection, Connector};
use crate::Result;
use crate::error::Db2FileError;
use crate::models::{ResultSet, Value};
use crate::security::Credentials;

/// `SQLITE_CANTOPEN`
const SQLITE_CANTOPEN: &str = "14";

/// Opens SQLite database files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

#[async_trait]
impl Connector for SqliteConnector {
    fn driver(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Connection>> {
        let path = Path::new(credentials.database());
        if !path.is_file() {
            return Err(Db2FileError::database_not_found(
                credentials.database(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such database file"),
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(true)
            .disable_statement_logging();

        let conn = options.connect().await.map_err(|e| {
            let cannot_open = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(SQLITE_CANTOPEN)
            );
            if cannot_open {
                Db2FileError::database_not_found(credentials.database(), e)
            } else {
                Db2FileError::connection_failed(
                    format!("cannot open {}", path.display()),
                    e,
                )
            }
        })?;

        Ok(Box::new(SqliteSession { conn }))
    }
}

struct SqliteSession {
    conn: SqliteConnection,
}

#[async_trait]
impl Connection for SqliteSession {
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        let statement = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(|e| Db2FileError::query_failed(format!("cannot prepare `{sql}`"), e))?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = statement
            .query()
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| Db2FileError::query_failed(format!("cannot execute `{sql}`"), e))?;

        let rows = rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|index| decode_value(row, index, &columns[index]))
                    .collect()
            })
            .collect();

        Ok(ResultSet::new(columns, rows))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| Db2FileError::connection_failed("error while closing database", e))
    }
}

/// Decodes one cell according to its storage class.
fn decode_value(row: &SqliteRow, index: usize, column: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::Integer);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::Float);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::Text);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(Value::Null, Value::Bytes);
    }

    warn!("Unsupported type in column '{column}', writing an empty value");
    Value::Null
}
