//! Typed run configuration, built once at process start.
//!
//! The binary maps its command line onto [`ExportConfig`] and hands it to
//! [`crate::export::run`]. Nothing here reads global state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::Result;
use crate::error::Db2FileError;
use crate::models::{QueryMode, QuerySpec, SchemaDescriptor};
use crate::security::{ReversibleEncoding, SecretCodec};
use crate::store::CredentialRequest;

/// Default cache directory, relative to the home directory
pub const DEFAULT_CACHE_DIR: &str = ".thebox/";
/// Default cache record file name
pub const DEFAULT_ACCESS_FILE: &str = "mysqlaccess";
/// Default database user
pub const DEFAULT_USER: &str = "thebox";
/// Default database host
pub const DEFAULT_HOST: &str = "localhost";
/// Default database name
pub const DEFAULT_DATABASE: &str = "theBoxData";
/// Default table
pub const DEFAULT_TABLE: &str = "temperatureAndStatusPhaseTwo";
/// Default output file stem
pub const DEFAULT_OUTPUT_NAME: &str = "output";
/// Environment variable holding the cache passphrase for the `encrypted` backend
pub const CACHE_KEY_ENV: &str = "DB2FILE_CACHE_KEY";

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Comma-separated values
    #[default]
    Csv,
}

impl OutputFormat {
    /// File extension including the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => ".csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Db2FileError;

    /// Accepts `.csv` or `csv`, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "csv" => Ok(Self::Csv),
            _ => Err(Db2FileError::configuration(format!(
                "Unsupported output format '{s}': only .csv is available"
            ))),
        }
    }
}

/// Where the result is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// File written on success
    pub path: PathBuf,
    /// Format the file is written in
    pub format: OutputFormat,
}

impl OutputTarget {
    /// Target `<name><extension>`, relative to the working directory unless
    /// `name` is a path.
    pub fn new(name: impl AsRef<Path>, format: OutputFormat) -> Self {
        let mut file = name.as_ref().as_os_str().to_os_string();
        file.push(format.extension());
        Self {
            path: PathBuf::from(file),
            format,
        }
    }
}

impl Default for OutputTarget {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_NAME, OutputFormat::Csv)
    }
}

/// How the cached password is protected at rest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecretBackend {
    /// Reversible base64 encoding (not encryption)
    #[default]
    Encoded,
    /// AES-GCM with a passphrase read from the named environment variable
    Encrypted {
        /// Variable holding the passphrase
        passphrase_env: String,
    },
}

impl SecretBackend {
    /// Parses `encoded` or `encrypted`; the latter reads [`CACHE_KEY_ENV`].
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "encoded" => Ok(Self::Encoded),
            "encrypted" => Ok(Self::Encrypted {
                passphrase_env: CACHE_KEY_ENV.to_string(),
            }),
            other => Err(Db2FileError::configuration(format!(
                "Unknown secret backend '{other}': expected 'encoded' or 'encrypted'"
            ))),
        }
    }

    /// Builds the codec for this backend.
    ///
    /// # Errors
    /// `Configuration` when `encrypted` is requested but the passphrase is
    /// missing or the crate was built without the `encryption` feature.
    pub fn codec(&self) -> Result<Box<dyn SecretCodec>> {
        match self {
            Self::Encoded => Ok(Box::new(ReversibleEncoding)),
            #[cfg(feature = "encryption")]
            Self::Encrypted { passphrase_env } => Ok(Box::new(
                crate::security::PassphraseEncryption::from_env(passphrase_env)?,
            )),
            #[cfg(not(feature = "encryption"))]
            Self::Encrypted { .. } => Err(Db2FileError::configuration(
                "The encrypted secret backend requires the 'encryption' feature",
            )),
        }
    }
}

/// Everything a single export run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Cache directory; relative paths resolve under the home directory
    pub cache_dir: PathBuf,
    /// Cache record file name inside `cache_dir`
    pub access_file: String,
    /// Ignore the cache and prompt for a new password
    pub update_password: bool,
    /// Who to connect as, and where
    pub credentials: CredentialRequest,
    /// Table and retrieval mode
    pub query: QuerySpec,
    /// Header row to emit, if any
    pub header: Option<SchemaDescriptor>,
    /// Output file
    pub output: OutputTarget,
    /// Protection of the cached password
    pub secret_backend: SecretBackend,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            access_file: DEFAULT_ACCESS_FILE.to_string(),
            update_password: false,
            credentials: CredentialRequest::new(DEFAULT_USER, DEFAULT_HOST, DEFAULT_DATABASE),
            query: QuerySpec::all(DEFAULT_TABLE),
            header: None,
            output: OutputTarget::default(),
            secret_backend: SecretBackend::default(),
        }
    }
}

impl ExportConfig {
    /// Rejects configurations that cannot work, before any I/O.
    ///
    /// # Errors
    /// `Configuration` for unusable names, `NotImplemented` for a filtered
    /// query so that no password is prompted for or cached.
    pub fn validate(&self) -> Result<()> {
        if self.access_file.is_empty() {
            return Err(Db2FileError::configuration(
                "Credential file name cannot be empty",
            ));
        }
        if self.access_file.contains(['/', '\\']) {
            return Err(Db2FileError::configuration(format!(
                "Credential file name '{}' must not contain path separators",
                self.access_file
            )));
        }
        if self.credentials.user.is_empty() {
            return Err(Db2FileError::configuration("Database user cannot be empty"));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(Db2FileError::configuration("Output name cannot be empty"));
        }
        crate::extractor::quote_identifier(&self.query.table)?;
        if self.query.mode == QueryMode::Filtered {
            return Err(Db2FileError::not_implemented(
                "filtered queries; only full-table retrieval is available",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_accepts_csv_only() {
        assert_eq!(".csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);

        let err = ".json".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, Db2FileError::Configuration { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(".xlsx".parse::<OutputFormat>().is_err());
        assert!("".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_target_appends_extension() {
        let target = OutputTarget::new("output", OutputFormat::Csv);
        assert_eq!(target.path, PathBuf::from("output.csv"));
        assert_eq!(OutputTarget::default(), target);
    }

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();

        assert_eq!(config.cache_dir, PathBuf::from(".thebox/"));
        assert_eq!(config.access_file, "mysqlaccess");
        assert_eq!(config.credentials.user, "thebox");
        assert_eq!(config.credentials.host, "localhost");
        assert_eq!(config.credentials.database, "theBoxData");
        assert_eq!(config.query.table, "temperatureAndStatusPhaseTwo");
        assert_eq!(config.query.mode, QueryMode::All);
        assert!(config.header.is_none());
        assert!(!config.update_password);
        assert_eq!(config.secret_backend, SecretBackend::Encoded);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let mut config = ExportConfig {
            access_file: "../escape".to_string(),
            ..ExportConfig::default()
        };
        assert!(config.validate().is_err());

        config.access_file = DEFAULT_ACCESS_FILE.to_string();
        config.query = QuerySpec::all("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_filtered_query() {
        let config = ExportConfig {
            query: QuerySpec::filtered(DEFAULT_TABLE),
            ..ExportConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Db2FileError::NotImplemented { .. }));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_secret_backend_parse() {
        assert_eq!(SecretBackend::parse("encoded").unwrap(), SecretBackend::Encoded);
        assert_eq!(
            SecretBackend::parse("Encrypted").unwrap(),
            SecretBackend::Encrypted {
                passphrase_env: CACHE_KEY_ENV.to_string()
            }
        );
        assert!(SecretBackend::parse("rot13").is_err());
        assert_eq!(SecretBackend::Encoded.codec().unwrap().name(), "encoded");
    }

    #[cfg(not(feature = "encryption"))]
    #[test]
    fn test_encrypted_backend_requires_feature() {
        let backend = SecretBackend::parse("encrypted").unwrap();
        assert!(matches!(
            backend.codec().err().unwrap(),
            Db2FileError::Configuration { .. }
        ));
    }
}
