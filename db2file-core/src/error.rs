//! Error types with credential sanitization.
//!
//! Every variant maps to one operator-facing condition and a process exit
//! code. Passwords never appear in any message: connection targets are
//! rendered as credential-free `user@host/database` descriptions.

use thiserror::Error;

/// Main error type for db2file operations.
///
/// # Security
/// Connection strings and passwords are never included in error output.
#[derive(Debug, Error)]
pub enum Db2FileError {
    /// Bad or unsupported configuration, detected before any connection
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The credential cache could not be read or decoded (recovered locally)
    #[error("Credential cache unusable: {context}")]
    CacheIo {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The working directory for the credential cache could not be created
    #[error("Failed to create directory {path}")]
    DirectoryCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The server rejected the supplied credentials
    #[error("Access denied for user '{user}'")]
    AuthDenied {
        user: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The requested database does not exist on the server
    #[error("Database '{database}' not found")]
    DatabaseNotFound {
        database: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other connection failure (credentials sanitized)
    #[error("Database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A recognized but unimplemented operation was requested
    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },

    /// Header column count disagrees with the result's column count
    #[error("Schema mismatch: header declares {expected} columns, result has {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// Query execution failed after the connection was established
    #[error("Query execution failed: {context}")]
    QueryExecution {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Sealing or opening a stored secret failed
    #[error("Secret handling failed: {context}")]
    Secret { context: String },
}

/// Convenience type alias for Results with Db2FileError
pub type Result<T> = std::result::Result<T, Db2FileError>;

impl Db2FileError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a connection error with sanitized context
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an authentication error for `user`
    pub fn auth_denied<E>(user: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::AuthDenied {
            user: user.into(),
            source: Box::new(error),
        }
    }

    /// Creates a missing-database error
    pub fn database_not_found<E>(database: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DatabaseNotFound {
            database: database.into(),
            source: Box::new(error),
        }
    }

    /// Creates a query execution error with context
    pub fn query_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::QueryExecution {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a cache error; callers recover by re-prompting
    pub fn cache_io<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CacheIo {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a not-implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Creates a secret handling error
    pub fn secret(context: impl Into<String>) -> Self {
        Self::Secret {
            context: context.into(),
        }
    }

    /// Wraps an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code reported for this error.
    ///
    /// `0` is reserved for success and `2` matches clap's usage errors so
    /// that every configuration problem exits the same way.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration { .. } => 2,
            Self::DirectoryCreate { .. } => 3,
            Self::AuthDenied { .. } => 4,
            Self::DatabaseNotFound { .. } => 5,
            Self::Connection { .. } => 6,
            Self::NotImplemented { .. } => 7,
            Self::SchemaMismatch { .. } => 8,
            Self::CacheIo { .. }
            | Self::QueryExecution { .. }
            | Self::Io { .. }
            | Self::Serialization { .. }
            | Self::Secret { .. } => 1,
        }
    }
}
