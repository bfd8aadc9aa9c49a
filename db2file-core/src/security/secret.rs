//! Pluggable protection for the password stored in the credential cache.
//!
//! The cache record never holds the plaintext password; it holds a
//! [`SealedSecret`] produced by a [`SecretCodec`]. Two codecs exist:
//!
//! - [`ReversibleEncoding`]: base64. This is NOT encryption; anyone who can
//!   read the cache file recovers the password. It is the default and logs a
//!   warning every time it seals a password.
//! - [`PassphraseEncryption`] (feature `encryption`): AES-GCM-256 keyed by an
//!   operator passphrase through Argon2id.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::Result;
use crate::error::Db2FileError;

#[cfg(feature = "encryption")]
use super::encryption::EncryptedSecret;

/// Password as persisted in the cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum SealedSecret {
    /// Base64 of the UTF-8 password
    Encoded {
        /// Base64 text
        value: String,
    },
    /// AES-GCM ciphertext with embedded KDF parameters
    #[cfg(feature = "encryption")]
    Encrypted {
        /// Sealed password and its parameters
        data: EncryptedSecret,
    },
}

/// Seals and opens cached passwords.
pub trait SecretCodec: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Turns a plaintext password into its at-rest form.
    fn seal(&self, plaintext: &str) -> Result<SealedSecret>;

    /// Recovers the plaintext password.
    ///
    /// # Errors
    /// Fails when the secret was sealed by another backend or is corrupt;
    /// the credential store treats that as a cache miss.
    fn open(&self, sealed: &SealedSecret) -> Result<Zeroizing<String>>;
}

/// Base64 encoding of the password. Reversible; provides no confidentiality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReversibleEncoding;

impl SecretCodec for ReversibleEncoding {
    fn name(&self) -> &'static str {
        "encoded"
    }

    fn seal(&self, plaintext: &str) -> Result<SealedSecret> {
        tracing::warn!(
            "Cached password is base64-encoded, not encrypted: anyone who can read the cache \
             file can recover it"
        );
        Ok(SealedSecret::Encoded {
            value: STANDARD.encode(plaintext.as_bytes()),
        })
    }

    fn open(&self, sealed: &SealedSecret) -> Result<Zeroizing<String>> {
        match sealed {
            SealedSecret::Encoded { value } => {
                let bytes = Zeroizing::new(
                    STANDARD
                        .decode(value)
                        .map_err(|e| Db2FileError::secret(format!("Invalid base64: {e}")))?,
                );
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| Db2FileError::secret(format!("Password is not UTF-8: {e}")))?;
                Ok(Zeroizing::new(text.to_string()))
            }
            #[cfg(feature = "encryption")]
            SealedSecret::Encrypted { .. } => Err(Db2FileError::secret(
                "Cached password is encrypted; the encoded backend cannot open it",
            )),
        }
    }
}

/// AES-GCM encryption keyed by an operator passphrase.
///
/// The passphrase is not stored anywhere; the operator supplies it on every
/// run (typically through an environment variable).
#[cfg(feature = "encryption")]
pub struct PassphraseEncryption {
    passphrase: Zeroizing<String>,
}

#[cfg(feature = "encryption")]
impl PassphraseEncryption {
    /// Fails on an empty passphrase.
    pub fn new(passphrase: impl Into<String>) -> Result<Self> {
        let passphrase = Zeroizing::new(passphrase.into());
        if passphrase.is_empty() {
            return Err(Db2FileError::configuration(
                "Cache passphrase cannot be empty",
            ));
        }
        Ok(Self { passphrase })
    }

    /// Reads the passphrase from environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let passphrase = std::env::var(var).map_err(|_| {
            Db2FileError::configuration(format!(
                "Encrypted secret backend requires the {var} environment variable"
            ))
        })?;
        Self::new(passphrase)
    }
}

#[cfg(feature = "encryption")]
impl std::fmt::Debug for PassphraseEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseEncryption").finish_non_exhaustive()
    }
}

#[cfg(feature = "encryption")]
impl SecretCodec for PassphraseEncryption {
    fn name(&self) -> &'static str {
        "encrypted"
    }

    fn seal(&self, plaintext: &str) -> Result<SealedSecret> {
        let data = super::encryption::encrypt_secret(plaintext.as_bytes(), &self.passphrase)?;
        Ok(SealedSecret::Encrypted { data })
    }

    fn open(&self, sealed: &SealedSecret) -> Result<Zeroizing<String>> {
        match sealed {
            SealedSecret::Encrypted { data } => {
                let bytes = super::encryption::decrypt_secret(data, &self.passphrase)?;
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| Db2FileError::secret(format!("Password is not UTF-8: {e}")))?;
                Ok(Zeroizing::new(text.to_string()))
            }
            SealedSecret::Encoded { .. } => Err(Db2FileError::secret(
                "Cached password is only encoded; re-prompting to store it encrypted",
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_roundtrip() {
        let codec = ReversibleEncoding;
        let sealed = codec.seal("pw").unwrap();
        assert_eq!(
            sealed,
            SealedSecret::Encoded {
                value: "cHc=".to_string()
            }
        );
        assert_eq!(codec.open(&sealed).unwrap().as_str(), "pw");
    }

    #[test]
    fn test_encoded_is_not_plaintext() {
        let sealed = ReversibleEncoding.seal("telescope").unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        assert!(!json.contains("telescope"));
        assert!(json.contains("\"scheme\":\"encoded\""));
    }

    #[test]
    fn test_encoded_rejects_invalid_base64() {
        let sealed = SealedSecret::Encoded {
            value: "%%%".to_string(),
        };
        assert!(ReversibleEncoding.open(&sealed).is_err());
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn test_encrypted_backend_roundtrip_and_cross_backend_refusal() {
        let codec = PassphraseEncryption::new("cache-passphrase").unwrap();
        let sealed = codec.seal("pw").unwrap();
        assert!(matches!(sealed, SealedSecret::Encrypted { .. }));
        assert_eq!(codec.open(&sealed).unwrap().as_str(), "pw");

        assert!(ReversibleEncoding.open(&sealed).is_err());
        let encoded = ReversibleEncoding.seal("pw").unwrap();
        assert!(codec.open(&encoded).is_err());
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn test_encrypted_backend_rejects_empty_passphrase() {
        assert!(PassphraseEncryption::new("").is_err());
    }
}
