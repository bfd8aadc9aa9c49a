//! AES-GCM-256 sealing of cached passwords with Argon2id key derivation.
//!
//! Used by [`PassphraseEncryption`](super::PassphraseEncryption). The key is
//! derived from an operator passphrase; losing the passphrase means the cache
//! record can no longer be opened and the operator is prompted again.
//!
//! # Cryptographic Standards
//! - AES-GCM: NIST SP 800-38D (96-bit nonces, 128-bit tags)
//! - Argon2id: RFC 9106

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, rand_core::RngCore},
};
use argon2::{
    Argon2, Params, Version,
    password_hash::{PasswordHasher, SaltString},
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::Db2FileError;

/// Algorithm tag stored alongside every sealed secret
pub const ALGORITHM: &str = "AES-GCM-256";

/// NIST SP 800-38D §8.2.1
const AES_GCM_NONCE_SIZE: usize = 12;

/// NIST SP 800-38D §5.2.1
const AES_GCM_TAG_SIZE: usize = 16;

const AES_KEY_SIZE: usize = 32;

/// RFC 9106 §4 minimum salt length
const ARGON2_SALT_SIZE: usize = 16;

/// 64 MiB, OWASP high-security recommendation
const ARGON2_MEMORY_COST: u32 = 65536;

const ARGON2_TIME_COST: u32 = 3;

const ARGON2_PARALLELISM: u32 = 4;

/// Argon2id parameters embedded in each sealed secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// 16-byte random salt
    pub salt: Vec<u8>,
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl KdfParams {
    /// Creates parameters with a fresh random salt.
    pub fn new() -> Self {
        let mut salt = vec![0u8; ARGON2_SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        Self {
            salt,
            memory_cost: ARGON2_MEMORY_COST,
            time_cost: ARGON2_TIME_COST,
            parallelism: ARGON2_PARALLELISM,
        }
    }

    /// Rejects parameters weaker than the defaults.
    pub fn validate(&self) -> crate::Result<()> {
        if self.salt.len() < ARGON2_SALT_SIZE {
            return Err(Db2FileError::secret(format!(
                "Salt must be at least {ARGON2_SALT_SIZE} bytes"
            )));
        }
        if self.memory_cost < ARGON2_MEMORY_COST {
            return Err(Db2FileError::secret(format!(
                "Memory cost must be at least {ARGON2_MEMORY_COST} KiB"
            )));
        }
        if self.time_cost < ARGON2_TIME_COST {
            return Err(Db2FileError::secret(format!(
                "Time cost must be at least {ARGON2_TIME_COST} iterations"
            )));
        }
        if self.parallelism < 1 {
            return Err(Db2FileError::secret("Parallelism must be at least 1"));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Ciphertext plus everything needed to open it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// Always [`ALGORITHM`]
    pub algorithm: String,
    /// 96-bit GCM nonce
    pub nonce: Vec<u8>,
    /// Ciphertext without the tag
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag
    pub auth_tag: Vec<u8>,
    /// Parameters the key was derived with
    pub kdf_params: KdfParams,
}

fn validate_sealed(sealed: &EncryptedSecret) -> crate::Result<()> {
    if sealed.algorithm != ALGORITHM {
        return Err(Db2FileError::secret(format!(
            "Unsupported encryption algorithm: {}",
            sealed.algorithm
        )));
    }
    if sealed.nonce.len() != AES_GCM_NONCE_SIZE {
        return Err(Db2FileError::secret(format!(
            "Invalid nonce length: expected {AES_GCM_NONCE_SIZE}, got {}",
            sealed.nonce.len()
        )));
    }
    if sealed.auth_tag.len() != AES_GCM_TAG_SIZE {
        return Err(Db2FileError::secret(format!(
            "Invalid authentication tag length: expected {AES_GCM_TAG_SIZE}, got {}",
            sealed.auth_tag.len()
        )));
    }
    sealed.kdf_params.validate()
}

fn derive_key(passphrase: &str, kdf_params: &KdfParams) -> crate::Result<Zeroizing<[u8; 32]>> {
    kdf_params.validate()?;

    let params = Params::new(
        kdf_params.memory_cost,
        kdf_params.time_cost,
        kdf_params.parallelism,
        Some(AES_KEY_SIZE),
    )
    .map_err(|e| Db2FileError::secret(format!("Invalid Argon2 parameters: {e}")))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let salt_string = SaltString::encode_b64(&kdf_params.salt)
        .map_err(|e| Db2FileError::secret(format!("Invalid salt: {e}")))?;

    let password_hash = argon2
        .hash_password(passphrase.as_bytes(), &salt_string)
        .map_err(|e| Db2FileError::secret(format!("Key derivation failed: {e}")))?;

    let hash_bytes = password_hash
        .hash
        .ok_or_else(|| Db2FileError::secret("Key derivation produced no output"))?;

    if hash_bytes.as_bytes().len() != AES_KEY_SIZE {
        return Err(Db2FileError::secret(format!(
            "Key derivation produced {} bytes, expected {AES_KEY_SIZE}",
            hash_bytes.as_bytes().len()
        )));
    }

    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    key.copy_from_slice(hash_bytes.as_bytes());
    Ok(key)
}

/// Encrypts `plaintext` under a key derived from `passphrase`.
///
/// Each call uses a fresh salt and nonce.
pub fn encrypt_secret(plaintext: &[u8], passphrase: &str) -> crate::Result<EncryptedSecret> {
    let kdf_params = KdfParams::new();
    let key = derive_key(passphrase, &kdf_params)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Db2FileError::secret(format!("Encryption failed: {e}")))?;

    // AES-GCM appends the tag to the ciphertext
    if ciphertext.len() < AES_GCM_TAG_SIZE {
        return Err(Db2FileError::secret("Encrypted output shorter than tag"));
    }
    let (payload, auth_tag) = ciphertext.split_at(ciphertext.len() - AES_GCM_TAG_SIZE);

    Ok(EncryptedSecret {
        algorithm: ALGORITHM.to_string(),
        nonce: nonce.to_vec(),
        ciphertext: payload.to_vec(),
        auth_tag: auth_tag.to_vec(),
        kdf_params,
    })
}

/// Decrypts a sealed secret, verifying its authentication tag.
///
/// # Errors
/// Fails on a wrong passphrase, tampered data, or invalid parameters.
pub fn decrypt_secret(
    sealed: &EncryptedSecret,
    passphrase: &str,
) -> crate::Result<Zeroizing<Vec<u8>>> {
    validate_sealed(sealed)?;

    let key = derive_key(passphrase, &sealed.kdf_params)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let nonce = Nonce::from_slice(&sealed.nonce);

    let mut full_ciphertext = sealed.ciphertext.clone();
    full_ciphertext.extend_from_slice(&sealed.auth_tag);

    let plaintext = cipher
        .decrypt(nonce, full_ciphertext.as_slice())
        .map_err(|e| {
            Db2FileError::secret(format!(
                "Decryption failed (wrong passphrase or corrupted data): {e}"
            ))
        })?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_roundtrip() {
        let sealed = encrypt_secret(b"telescope-pw", "passphrase").unwrap();

        assert_eq!(sealed.algorithm, ALGORITHM);
        assert_eq!(sealed.nonce.len(), 12);
        assert_eq!(sealed.auth_tag.len(), 16);
        assert_eq!(sealed.kdf_params.salt.len(), 16);

        let opened = decrypt_secret(&sealed, "passphrase").unwrap();
        assert_eq!(opened.as_slice(), b"telescope-pw");
    }

    #[test]
    fn test_encryption_fresh_nonce_per_call() {
        let first = encrypt_secret(b"pw", "passphrase").unwrap();
        let second = encrypt_secret(b"pw", "passphrase").unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.kdf_params.salt, second.kdf_params.salt);
    }

    #[test]
    fn test_encryption_wrong_passphrase_fails() {
        let sealed = encrypt_secret(b"pw", "right").unwrap();
        let err = decrypt_secret(&sealed, "wrong").unwrap_err();
        assert!(err.to_string().contains("Decryption failed"));
    }

    #[test]
    fn test_encryption_tampered_tag_fails() {
        let mut sealed = encrypt_secret(b"pw", "passphrase").unwrap();
        sealed.auth_tag[0] ^= 1;
        assert!(decrypt_secret(&sealed, "passphrase").is_err());
    }

    #[test]
    fn test_encryption_rejects_unknown_algorithm() {
        let mut sealed = encrypt_secret(b"pw", "passphrase").unwrap();
        sealed.algorithm = "AES-CBC-256".to_string();
        let err = decrypt_secret(&sealed, "passphrase").unwrap_err();
        assert!(err.to_string().contains("Unsupported encryption algorithm"));
    }

    #[test]
    fn test_kdf_params_validation() {
        let mut params = KdfParams::new();
        assert!(params.validate().is_ok());

        params.salt = vec![0u8; 15];
        assert!(params.validate().is_err());
        params.salt = vec![0u8; 16];

        params.memory_cost = 32768;
        assert!(params.validate().is_err());
        params.memory_cost = ARGON2_MEMORY_COST;

        params.parallelism = 0;
        assert!(params.validate().is_err());
    }
}
