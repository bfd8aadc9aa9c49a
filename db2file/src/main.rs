//! Table-to-CSV export tool.
//!
//! Resolves credentials from the cache under the home directory (prompting
//! once when there is nothing usable), dumps one table with a single
//! `SELECT *` and writes it to `<output-name><output-format>`.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - The password is never logged or echoed
//! - The default cache encoding is reversible and is reported as such

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use db2file_core::{
    Db2FileError, EnvironmentPrompt, ExportConfig, OutputFormat, OutputTarget, QuerySpec, Result,
    SchemaDescriptor, SecretBackend, SecretPrompt, TerminalPrompt,
    config::{
        DEFAULT_ACCESS_FILE, DEFAULT_CACHE_DIR, DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_OUTPUT_NAME,
        DEFAULT_TABLE, DEFAULT_USER,
    },
    init_logging,
    store::CredentialRequest,
};
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "db2file")]
#[command(about = "Dump a database table to a CSV file")]
#[command(version)]
#[command(long_about = "
db2file - snapshot one table to CSV

Connects with credentials cached under the home directory, prompting for
the password once if nothing usable is cached, runs SELECT * against a
single table and writes every row to <output-name><output-format>.

SECURITY NOTES:
- The default 'encoded' cache backend is base64, NOT encryption
- Build with --features encryption and pass --secret-backend encrypted
  (passphrase in DB2FILE_CACHE_KEY) to encrypt the cached password

EXAMPLES:
  db2file
  db2file --header --output-name readings
  db2file --update-password -U operator -H db.internal
  db2file --driver sqlite -D ./thebox.db
")]
struct Cli {
    /// Credential cache file name
    #[arg(long, default_value = DEFAULT_ACCESS_FILE)]
    mysql_access_file: String,

    /// Ignore the cached password and prompt for a new one
    #[arg(long)]
    update_password: bool,

    /// Cache directory; relative paths are resolved under the home directory
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    default_dir: PathBuf,

    /// Database user
    #[arg(short = 'U', long, default_value = DEFAULT_USER)]
    my_user: String,

    /// Database host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    my_host: String,

    /// Database name (a file path with --driver sqlite)
    #[arg(short = 'D', long, default_value = DEFAULT_DATABASE)]
    my_database: String,

    /// Table to export
    #[arg(short = 'T', long, default_value = DEFAULT_TABLE)]
    my_table: String,

    /// Output file name without extension
    #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
    output_name: PathBuf,

    /// Output format; only .csv is supported
    #[arg(long, default_value = ".csv")]
    output_format: OutputFormat,

    /// Export every row of the table (the default)
    #[arg(long, conflicts_with = "filtered")]
    get_all: bool,

    /// Filtered export (not implemented)
    #[arg(long)]
    filtered: bool,

    /// Write the telemetry column names as the first line
    #[arg(long)]
    header: bool,

    /// Server port (MySQL default 3306)
    #[arg(long)]
    port: Option<u16>,

    /// Database driver
    #[arg(long, value_enum, default_value_t = Driver::Mysql)]
    driver: Driver,

    /// How the cached password is stored: encoded (base64) or encrypted
    #[arg(
        long,
        value_name = "BACKEND",
        default_value = "encoded",
        value_parser = SecretBackend::parse
    )]
    secret_backend: SecretBackend,

    /// Read the password from this environment variable instead of prompting
    #[arg(long, value_name = "VAR")]
    password_env: Option<String>,

    /// Increase verbosity
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Driver {
    Mysql,
    Sqlite,
}

impl Cli {
    fn export_config(&self) -> ExportConfig {
        let query = if self.filtered {
            QuerySpec::filtered(&self.my_table)
        } else {
            QuerySpec::all(&self.my_table)
        };

        ExportConfig {
            cache_dir: self.default_dir.clone(),
            access_file: self.mysql_access_file.clone(),
            update_password: self.update_password,
            credentials: CredentialRequest::new(&self.my_user, &self.my_host, &self.my_database),
            query,
            header: self.header.then(SchemaDescriptor::telemetry),
            output: OutputTarget::new(&self.output_name, self.output_format),
            secret_backend: self.secret_backend.clone(),
        }
    }

    fn prompt(&self) -> Box<dyn SecretPrompt> {
        match &self.password_env {
            Some(var) => Box::new(EnvironmentPrompt::new(var)),
            None => Box::new(TerminalPrompt),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("{e}");
        return ExitCode::from(e.exit_code());
    }

    match export(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                debug!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn export(cli: &Cli) -> Result<()> {
    let config = cli.export_config();
    let mut prompt = cli.prompt();

    if cli.get_all {
        debug!("--get-all given; full-table export is already the default");
    }

    let summary = match cli.driver {
        #[cfg(feature = "mysql")]
        Driver::Mysql => {
            let mut connector = db2file_core::MySqlConnector::new();
            if let Some(port) = cli.port {
                connector = connector.with_port(port);
            }
            db2file_core::run(&config, prompt.as_mut(), connector).await?
        }
        #[cfg(feature = "sqlite")]
        Driver::Sqlite => {
            db2file_core::run(&config, prompt.as_mut(), db2file_core::SqliteConnector).await?
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(Db2FileError::configuration(format!(
                "Driver {other:?} is not compiled into this build"
            )));
        }
    };

    info!("✓ Export completed");
    println!("Output: {}", summary.path.display());
    println!("Rows: {}", summary.rows);
    println!("Columns: {}", summary.columns);

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use db2file_core::QueryMode;
    use db2file_core::config::CACHE_KEY_ENV;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults_map_to_default_config() {
        let cli = Cli::try_parse_from(["db2file"]).unwrap();
        assert_eq!(cli.export_config(), ExportConfig::default());
        assert_eq!(cli.driver, Driver::Mysql);
    }

    #[test]
    fn test_cli_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "db2file",
            "-U",
            "operator",
            "-H",
            "db.internal",
            "-D",
            "box2",
            "-T",
            "readings",
            "--output-name",
            "dump",
            "--header",
            "--update-password",
            "--mysql-access-file",
            "access2",
        ])
        .unwrap();
        let config = cli.export_config();

        assert_eq!(
            config.credentials,
            CredentialRequest::new("operator", "db.internal", "box2")
        );
        assert_eq!(config.query, QuerySpec::all("readings"));
        assert_eq!(config.output.path, PathBuf::from("dump.csv"));
        assert_eq!(config.header, Some(SchemaDescriptor::telemetry()));
        assert!(config.update_password);
        assert_eq!(config.access_file, "access2");
    }

    #[test]
    fn test_get_all_and_filtered_modes() {
        let cli = Cli::try_parse_from(["db2file", "--get-all"]).unwrap();
        assert_eq!(cli.export_config().query.mode, QueryMode::All);

        let cli = Cli::try_parse_from(["db2file", "--filtered"]).unwrap();
        assert_eq!(cli.export_config().query.mode, QueryMode::Filtered);

        assert!(Cli::try_parse_from(["db2file", "--get-all", "--filtered"]).is_err());
    }

    #[test]
    fn test_secret_backend_flag() {
        let cli = Cli::try_parse_from(["db2file", "--secret-backend", "encrypted"]).unwrap();
        assert_eq!(
            cli.export_config().secret_backend,
            SecretBackend::Encrypted {
                passphrase_env: CACHE_KEY_ENV.to_string()
            }
        );

        let cli = Cli::try_parse_from(["db2file", "--secret-backend", "ENCODED"]).unwrap();
        assert_eq!(cli.export_config().secret_backend, SecretBackend::Encoded);

        assert!(Cli::try_parse_from(["db2file", "--secret-backend", "rot13"]).is_err());
    }

    #[test]
    fn test_non_csv_output_format_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["db2file", "--output-format", ".json"]).is_err());
        assert!(Cli::try_parse_from(["db2file", "--output-format", "csv"]).is_ok());
    }
}
