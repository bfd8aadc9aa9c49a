//! MySQL driver: one unpooled `MySqlConnection` per extraction.
//!
//! # Security
//! - Statement logging is disabled on the connection
//! - Errors and logs describe the target without the password

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection as _, Executor, Row, Statement};
use tracing::warn;
use url::Url;

use super::{Connection, Connector};
use crate::Result;
use crate::error::Db2FileError;
use crate::models::{ResultSet, Value};
use crate::security::Credentials;

/// MySQL default port
pub const DEFAULT_PORT: u16 = 3306;

/// `ER_DBACCESS_DENIED_ERROR`
const ER_DBACCESS_DENIED: u16 = 1044;
/// `ER_ACCESS_DENIED_ERROR`
const ER_ACCESS_DENIED: u16 = 1045;
/// `ER_BAD_DB_ERROR`
const ER_BAD_DB: u16 = 1049;
/// `ER_ACCESS_DENIED_NO_PASSWORD_ERROR` (auth_socket users)
const ER_ACCESS_DENIED_NO_PASSWORD: u16 = 1698;

/// Opens MySQL connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector {
    port: Option<u16>,
}

impl MySqlConnector {
    /// Connector on the default port.
    pub const fn new() -> Self {
        Self { port: None }
    }

    /// Overrides the server port.
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Port used for connections, [`DEFAULT_PORT`] unless overridden.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Credential-free `mysql://user@host:port/database` description.
pub fn connection_description(credentials: &Credentials, port: u16) -> String {
    let fallback = || format!("mysql://{credentials}");
    let Ok(mut url) = Url::parse("mysql://localhost") else {
        return fallback();
    };
    if url.set_host(Some(credentials.host())).is_err()
        || url.set_username(credentials.user()).is_err()
        || url.set_port(Some(port)).is_err()
    {
        return fallback();
    }
    url.set_path(credentials.database());
    url.to_string()
}

/// Maps a connect error onto the operator-facing taxonomy.
fn classify_connect_error(
    error: sqlx::Error,
    credentials: &Credentials,
    port: u16,
) -> Db2FileError {
    let code = match &error {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    };

    match code {
        Some(ER_ACCESS_DENIED | ER_DBACCESS_DENIED | ER_ACCESS_DENIED_NO_PASSWORD) => {
            Db2FileError::auth_denied(credentials.user(), error)
        }
        Some(ER_BAD_DB) => Db2FileError::database_not_found(credentials.database(), error),
        _ => Db2FileError::connection_failed(
            format!(
                "cannot reach {}",
                connection_description(credentials, port)
            ),
            error,
        ),
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn driver(&self) -> &'static str {
        "mysql"
    }

    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Connection>> {
        let port = self.port();
        let options = MySqlConnectOptions::new()
            .host(credentials.host())
            .port(port)
            .username(credentials.user())
            .password(credentials.password())
            .database(credentials.database())
            .disable_statement_logging();

        let conn = options
            .connect()
            .await
            .map_err(|e| classify_connect_error(e, credentials, port))?;

        Ok(Box::new(MySqlSession { conn }))
    }
}

struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl Connection for MySqlSession {
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
            .map_err(|e| Db2FileError::connection_failed("error while closing connection", e))
    }
}

/// Decodes one cell by trying scalar types in order of likelihood.
fn decode_value(row: &MySqlRow, index: usize, column: &str) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::Integer);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map_or(Value::Null, Value::Unsigned);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::Float);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v.map_or(Value::Null, |f| Value::Float(f64::from(f)));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return v.map_or(Value::Null, Value::DateTime);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return v.map_or(Value::Null, |dt| Value::DateTime(dt.naive_utc()));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return v.map_or(Value::Null, Value::Date);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(index) {
        return v.map_or(Value::Null, Value::Time);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::Text);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(Value::Null, Value::Bytes);
    }
    // DECIMAL and friends travel as text in the binary protocol
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::Text);
    }

    warn!("Unsupported type in column '{column}', writing an empty value");
    Value::Null
}
