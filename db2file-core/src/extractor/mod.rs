//! Single-query table extraction.
//!
//! An [`Extractor`] opens one connection through a [`Connector`], runs
//! `SELECT * FROM <table>`, materializes the whole result and releases the
//! connection. Nothing is pooled or retried.
//!
//! # Lifecycle
//! `Disconnected → Connecting → Connected → QueryExecuting → ResultReady →
//! Disconnected`. Any failure goes straight back to `Disconnected` after the
//! connection (if one was opened) is closed.
//!
//! # Module Structure
//! - `mysql`: MySQL driver (feature `mysql`)
//! - `sqlite`: SQLite driver (feature `sqlite`)

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::Db2FileError;
use crate::models::{QueryMode, QuerySpec, ResultSet, SchemaDescriptor};
use crate::security::Credentials;

/// Longest identifier accepted by MySQL
const MAX_IDENTIFIER_LEN: usize = 64;

/// Opens database connections from resolved credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Driver name used in logs
    fn driver(&self) -> &'static str;

    /// Opens a single connection.
    ///
    /// # Errors
    /// - `AuthDenied` when the server rejects the credentials
    /// - `DatabaseNotFound` when the database does not exist
    /// - `Connection` for everything else, with the cause attached
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Connection>>;
}

/// An open connection, used for exactly one query.
#[async_trait]
pub trait Connection: Send {
    /// Runs `sql` and fetches every row into memory.
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Extractor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    /// No connection held
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Connection open, no query yet
    Connected,
    /// `SELECT *` running
    QueryExecuting,
    /// All rows fetched
    ResultReady,
}

/// Quotes a table name for MySQL-compatible SQL.
///
/// # Errors
/// Rejects empty names, names longer than 64 characters and names containing
/// a backtick or NUL, which could not be quoted safely.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Db2FileError::configuration("Table name cannot be empty"));
    }
    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(Db2FileError::configuration(format!(
            "Table name too long: maximum {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if name.contains('`') || name.contains('\0') {
        return Err(Db2FileError::configuration(
            "Table name contains invalid characters",
        ));
    }
    Ok(format!("`{name}`"))
}

/// Builds the full-table snapshot query.
///
/// ```rust
/// use db2file_core::extractor::build_select_query;
///
/// let sql = build_select_query("temperatureAndStatusPhaseTwo").unwrap();
/// assert_eq!(sql, "SELECT * FROM `temperatureAndStatusPhaseTwo`");
/// ```
pub fn build_select_query(table: &str) -> Result<String> {
    Ok(format!("SELECT * FROM {}", quote_identifier(table)?))
}

/// Runs one full-table query over one connection.
pub struct Extractor<C> {
    connector: C,
    state: ExtractorState,
    transitions: Vec<ExtractorState>,
}

impl<C: Connector> Extractor<C> {
    /// Extractor over `connector`, starting `Disconnected`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: ExtractorState::Disconnected,
            transitions: vec![ExtractorState::Disconnected],
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ExtractorState {
        self.state
    }

    /// Every state entered so far, starting with `Disconnected`.
    pub fn transitions(&self) -> &[ExtractorState] {
        &self.transitions
    }

    fn transition(&mut self, next: ExtractorState) {
        debug!("Extractor {:?} -> {:?}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    /// Opens a connection; on failure the extractor is back to `Disconnected`.
    pub async fn connect(&mut self, credentials: &Credentials) -> Result<Box<dyn Connection>> {
        self.transition(ExtractorState::Connecting);
        info!(
            "Connecting to {} via {}",
            credentials,
            self.connector.driver()
        );

        match self.connector.connect(credentials).await {
            Ok(connection) => {
                self.transition(ExtractorState::Connected);
                Ok(connection)
            }
            Err(e) => {
                self.transition(ExtractorState::Disconnected);
                Err(e)
            }
        }
    }

    async fn release(&mut self, connection: Box<dyn Connection>) {
        if let Err(e) = connection.close().await {
            warn!("Failed to close connection cleanly: {e}");
        }
        self.transition(ExtractorState::Disconnected);
    }

    /// Extracts the whole table named by `query`.
    ///
    /// When `header` is given, its column count must match the result's.
    ///
    /// # Errors
    /// - `NotImplemented` for `Filtered` mode, before any connection attempt
    /// - `Configuration` for a table name that cannot be quoted
    /// - connection errors from [`Connector::connect`]
    /// - `QueryExecution` if the query fails
    /// - `SchemaMismatch` if the header and result disagree
    pub async fn run(
        &mut self,
        credentials: &Credentials,
        query: &QuerySpec,
        header: Option<&SchemaDescriptor>,
    ) -> Result<ResultSet> {
        if query.mode == QueryMode::Filtered {
            return Err(Db2FileError::not_implemented(
                "filtered queries; only full-table retrieval is available",
            ));
        }

        let sql = build_select_query(&query.table)?;
        let mut connection = self.connect(credentials).await?;

        self.transition(ExtractorState::QueryExecuting);
        debug!("Executing: {sql}");
        let result = match connection.fetch_all(&sql).await {
            Ok(result) => result,
            Err(e) => {
                self.release(connection).await;
                return Err(e);
            }
        };

        if let Some(header) = header
            && let Err(e) = header.check_arity(result.column_count())
        {
            self.release(connection).await;
            return Err(e);
        }

        self.transition(ExtractorState::ResultReady);
        info!(
            "Fetched {} rows x {} columns from {}",
            result.row_count(),
            result.column_count(),
            query.table
        );

        self.release(connection).await;
        Ok(result)
    }
}
