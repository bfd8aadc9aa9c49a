//! Resolved database credentials with a zeroizing password.
//!
//! # Security
//! - The password lives in a `Zeroizing<String>` and is cleared on drop
//! - `Debug` output never includes the password
//! - `Display` renders a credential-free `user@host/database` target

use zeroize::Zeroizing;

/// Connection credentials for one database identity.
///
/// # Example
///
/// ```rust
/// use db2file_core::security::Credentials;
///
/// let creds = Credentials::new("thebox", "pw", "localhost", "theBoxData");
/// assert_eq!(creds.user(), "thebox");
/// assert!(!format!("{creds:?}").contains("pw\""));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: Zeroizing<String>,
    host: String,
    database: String,
}

impl Credentials {
    /// Creates credentials, moving the password into a zeroizing container.
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: Zeroizing::new(password.into()),
            host: host.into(),
            database: database.into(),
        }
    }

    /// Database user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Exposes the plaintext password to a driver.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Database host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"****")
            .field("host", &self.host)
            .field("database", &self.database)
            .finish()
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}/{}", self.user, self.host, self.database)
    }
}
