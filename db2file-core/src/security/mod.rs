//! Credential protection.
//!
//! # Module Structure
//! - `credentials`: resolved credentials with a zeroizing password
//! - `secret`: at-rest codecs for the cached password
//! - `prompt`: sources for a password that is not cached
//! - `encryption`: AES-GCM with Argon2id key derivation (feature-gated)
//!
//! # Security Guarantees
//! - Passwords are held in `Zeroizing` containers
//! - Passwords are redacted from `Debug` output, logs and errors
//! - The default at-rest codec is reversible and says so in the logs

mod credentials;
mod prompt;
mod secret;

#[cfg(feature = "encryption")]
pub mod encryption;

pub use credentials::Credentials;
pub use prompt::{EnvironmentPrompt, SecretPrompt, TerminalPrompt};
#[cfg(feature = "encryption")]
pub use secret::PassphraseEncryption;
pub use secret::{ReversibleEncoding, SealedSecret, SecretCodec};
