//! Core library for db2file.
//!
//! Resolves database credentials from a local cache (prompting once on a
//! miss), runs a single `SELECT *` against one table and writes the result
//! as CSV. The `db2file` binary is a thin command-line layer over
//! [`export::run`].
//!
//! # Security Guarantees
//! - Passwords are zeroized on drop and never logged or put in errors
//! - The cache record is written atomically with owner-only permissions
//! - The default cache encoding is reversible; see [`security`]
//! - All database operations are read-only
//!
//! # Architecture
//! - [`store`]: credential cache behind an injectable storage trait
//! - [`extractor`]: connector trait with MySQL and SQLite drivers
//! - [`sink`]: CSV writer with atomic persist
//! - [`config`]: typed configuration built once at process start

pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod logging;
pub mod models;
pub mod security;
pub mod sink;
pub mod store;

// Re-export commonly used types
pub use config::{ExportConfig, OutputFormat, OutputTarget, SecretBackend};
pub use error::{Db2FileError, Result};
pub use export::{ExportSummary, run};
pub use extractor::{Connection, Connector, Extractor, ExtractorState};
pub use logging::init_logging;
pub use models::{QueryMode, QuerySpec, ResultSet, SchemaDescriptor, TELEMETRY_COLUMNS, Value};
pub use security::{Credentials, EnvironmentPrompt, SecretPrompt, TerminalPrompt};
pub use sink::CsvSink;
pub use store::{
    CachedCredentials, CredentialRequest, CredentialStorage, CredentialStore, FileStorage,
    MemoryStorage,
};

#[cfg(feature = "mysql")]
pub use extractor::mysql::MySqlConnector;
#[cfg(feature = "sqlite")]
pub use extractor::sqlite::SqliteConnector;
