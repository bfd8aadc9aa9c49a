//! Top-level export flow: resolve credentials, extract the table, write CSV.

use std::path::PathBuf;

use tracing::info;

use crate::Result;
use crate::config::ExportConfig;
use crate::extractor::{Connector, Extractor};
use crate::security::SecretPrompt;
use crate::sink::CsvSink;
use crate::store::{CredentialStorage, CredentialStore, FileStorage};

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Data rows written, excluding the header
    pub rows: usize,
    /// Columns per row
    pub columns: usize,
    /// File that was written
    pub path: PathBuf,
}

/// Runs one export with the credential cache under the home directory.
pub async fn run<C: Connector>(
    config: &ExportConfig,
    prompt: &mut dyn SecretPrompt,
    connector: C,
) -> Result<ExportSummary> {
    let store = CredentialStore::new(
        FileStorage::under_home(&config.cache_dir),
        config.access_file.clone(),
        config.secret_backend.codec()?,
    );
    run_with_store(config, &store, prompt, connector).await
}

/// Runs one export against an explicit credential store.
///
/// # Errors
/// Configuration problems are reported before the cache is touched; every
/// other failure aborts the run without an output file.
pub async fn run_with_store<S, C>(
    config: &ExportConfig,
    store: &CredentialStore<S>,
    prompt: &mut dyn SecretPrompt,
    connector: C,
) -> Result<ExportSummary>
where
    S: CredentialStorage,
    C: Connector,
{
    config.validate()?;

    let credentials = store.resolve(&config.credentials, config.update_password, prompt)?;

    let mut extractor = Extractor::new(connector);
    let result = extractor
        .run(&credentials, &config.query, config.header.as_ref())
        .await?;

    let sink = CsvSink::new(config.output.clone());
    let rows = sink.write(&result, config.header.as_ref())?;

    info!(
        "Exported {} rows from {} to {}",
        rows,
        config.query.table,
        sink.path().display()
    );

    Ok(ExportSummary {
        rows,
        columns: result.column_count(),
        path: sink.path().to_path_buf(),
    })
}
