//! Credential cache: load a stored record or prompt and persist a new one.
//!
//! The cache lives behind [`CredentialStorage`] so the resolution flow can be
//! exercised without touching the operator's home directory. Resolution is:
//!
//! 1. make sure the storage location exists (fatal if it cannot be created)
//! 2. unless a refresh is forced, load the record for the requested user
//! 3. otherwise prompt once, seal the password and persist the record

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::Db2FileError;
use crate::security::{Credentials, SealedSecret, SecretCodec, SecretPrompt};

/// Current version of the persisted record layout
pub const RECORD_VERSION: u32 = 1;

/// Byte-level storage for cache records, addressed by key.
pub trait CredentialStorage {
    /// Ensures the storage location exists.
    ///
    /// # Errors
    /// Returns `DirectoryCreate` when the location cannot be created.
    fn prepare(&self) -> Result<()>;

    /// Reads the record stored under `key`, `None` if there is none.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the record stored under `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn describe(&self, key: &str) -> String;
}

/// Records stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`, used as given.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolves `dir` under the operator's home directory.
    ///
    /// Absolute paths are used as given. Without a home directory the path is
    /// taken relative to the working directory.
    pub fn under_home(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if dir.is_absolute() {
            return Self::new(dir);
        }
        match dirs::home_dir() {
            Some(home) => Self::new(home.join(dir)),
            None => {
                warn!(
                    "No home directory found; using {} relative to the working directory",
                    dir.display()
                );
                Self::new(dir)
            }
        }
    }

    /// Directory holding the cache records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the record stored under `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CredentialStorage for FileStorage {
    fn prepare(&self) -> Result<()> {
        if self.dir.is_dir() {
            debug!("Directory exists: {}", self.dir.display());
            return Ok(());
        }

        info!("Creating directory {}", self.dir.display());
        std::fs::create_dir_all(&self.dir).map_err(|source| Db2FileError::DirectoryCreate {
            path: self.dir.display().to_string(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700)).map_err(
                |source| Db2FileError::DirectoryCreate {
                    path: self.dir.display().to_string(),
                    source,
                },
            )?;
        }

        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Db2FileError::cache_io(
                format!("cannot read {}", path.display()),
                e,
            )),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);

        // Temp file in the same directory so the rename stays on one filesystem;
        // tempfile creates it with owner-only permissions.
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Db2FileError::io(format!("Failed to stage {}", path.display()), e))?;
        file.write_all(bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| Db2FileError::io(format!("Failed to write {}", path.display()), e))?;
        file.persist(&path).map_err(|e| {
            Db2FileError::io(format!("Failed to replace {}", path.display()), e.error)
        })?;

        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

/// In-memory storage, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `key` with raw bytes.
    pub fn with_record(self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes.into());
        self
    }

    /// Returns a copy of the bytes stored under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl CredentialStorage for MemoryStorage {
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        format!("memory:{key}")
    }
}

/// Persisted form of [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentials {
    /// Record layout version, see [`RECORD_VERSION`]
    pub version: u32,
    /// Database user the record belongs to
    pub user: String,
    /// Host the password was entered for
    pub host: String,
    /// Database the password was entered for
    pub database: String,
    /// Sealed password
    pub secret: SealedSecret,
}

impl CachedCredentials {
    /// Seals `credentials` with `codec`.
    pub fn seal(credentials: &Credentials, codec: &dyn SecretCodec) -> Result<Self> {
        Ok(Self {
            version: RECORD_VERSION,
            user: credentials.user().to_string(),
            host: credentials.host().to_string(),
            database: credentials.database().to_string(),
            secret: codec.seal(credentials.password())?,
        })
    }

    /// Opens the sealed password with `codec`.
    pub fn open(&self, codec: &dyn SecretCodec) -> Result<Credentials> {
        let password = codec.open(&self.secret)?;
        Ok(Credentials::new(
            self.user.clone(),
            password.as_str(),
            self.host.clone(),
            self.database.clone(),
        ))
    }

    /// Pretty JSON encoding of the record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|source| Db2FileError::Serialization {
            context: "credential cache record".to_string(),
            source,
        })
    }

    /// Parses a record written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| Db2FileError::Serialization {
            context: "credential cache record".to_string(),
            source,
        })
    }
}

/// Operator-supplied identity for which credentials are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Database user
    pub user: String,
    /// Database host
    pub host: String,
    /// Database name
    pub database: String,
}

impl CredentialRequest {
    /// Request for `user` on `host`/`database`.
    pub fn new(
        user: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            database: database.into(),
        }
    }
}

/// Resolves credentials from a cache record, prompting on a miss.
pub struct CredentialStore<S> {
    storage: S,
    key: String,
    codec: Box<dyn SecretCodec>,
}

impl<S: CredentialStorage> CredentialStore<S> {
    /// Store over `storage`, reading and writing the record named `key`.
    pub fn new(storage: S, key: impl Into<String>, codec: Box<dyn SecretCodec>) -> Self {
        Self {
            storage,
            key: key.into(),
            codec,
        }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Resolves credentials for `request`.
    ///
    /// The prompt is consulted at most once, and only when the cache cannot
    /// serve the request (no record, forced refresh, different user, corrupt
    /// record, or a secret the codec cannot open).
    ///
    /// # Errors
    /// - `DirectoryCreate` if the storage location cannot be created
    /// - prompt failures and persistence failures are propagated
    pub fn resolve(
        &self,
        request: &CredentialRequest,
        force_refresh: bool,
        prompt: &mut dyn SecretPrompt,
    ) -> Result<Credentials> {
        self.storage.prepare()?;

        if force_refresh {
            info!("Password update requested for '{}'", request.user);
        } else if let Some(credentials) = self.load(request) {
            info!(
                "Using cached credentials from {}",
                self.storage.describe(&self.key)
            );
            return Ok(credentials);
        }

        warn!("No usable credentials cached; please answer the prompt");
        let password = prompt.read_secret(&format!("Password ({}): ", request.user))?;
        let credentials = Credentials::new(
            request.user.clone(),
            password.as_str(),
            request.host.clone(),
            request.database.clone(),
        );

        self.persist(&credentials)?;
        Ok(credentials)
    }

    /// Writes `credentials` to the cache, replacing any previous record.
    pub fn persist(&self, credentials: &Credentials) -> Result<()> {
        let record = CachedCredentials::seal(credentials, self.codec.as_ref())?;
        self.storage.write(&self.key, &record.to_bytes()?)?;
        debug!(
            "Stored credentials for '{}' in {} ({})",
            credentials.user(),
            self.storage.describe(&self.key),
            self.codec.name()
        );
        Ok(())
    }

    /// Loads the cached record, treating every failure as a cache miss.
    fn load(&self, request: &CredentialRequest) -> Option<Credentials> {
        let bytes = match self.storage.read(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No cache record at {}", self.storage.describe(&self.key));
                return None;
            }
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };

        let record = match CachedCredentials::from_bytes(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "{}",
                    Db2FileError::cache_io(
                        format!("corrupt record at {}", self.storage.describe(&self.key)),
                        e
                    )
                );
                return None;
            }
        };

        if record.user != request.user {
            info!(
                "Cached credentials belong to '{}', not '{}'",
                record.user, request.user
            );
            return None;
        }

        if record.host != request.host || record.database != request.database {
            warn!(
                "Cached credentials target {}/{}, not the requested {}/{}; using the cached \
                 target (run with --update-password to replace it)",
                record.host, record.database, request.host, request.database
            );
        }

        match record.open(self.codec.as_ref()) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("Cannot open cached password: {e}");
                None
            }
        }
    }
}
