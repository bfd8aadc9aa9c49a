//! Sources for a password that is not yet cached.

use zeroize::Zeroizing;

use crate::Result;
use crate::error::Db2FileError;

/// Supplies a password when the cache cannot.
pub trait SecretPrompt {
    /// Reads one secret; `prompt` names the identity it is for.
    fn read_secret(&mut self, prompt: &str) -> Result<Zeroizing<String>>;
}

/// Interactive, non-echoing terminal prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn read_secret(&mut self, prompt: &str) -> Result<Zeroizing<String>> {
        let password = rpassword::prompt_password(prompt)
            .map_err(|e| Db2FileError::io("Failed to read password", e))?;
        Ok(Zeroizing::new(password))
    }
}

/// Password injected through an environment variable.
#[derive(Debug, Clone)]
pub struct EnvironmentPrompt {
    var: String,
}

impl EnvironmentPrompt {
    /// Prompt reading `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl SecretPrompt for EnvironmentPrompt {
    fn read_secret(&mut self, _prompt: &str) -> Result<Zeroizing<String>> {
        std::env::var(&self.var).map(Zeroizing::new).map_err(|_| {
            Db2FileError::configuration(format!(
                "Password environment variable {} is not set",
                self.var
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_prompt_missing_variable() {
        let mut prompt = EnvironmentPrompt::new("DB2FILE_TEST_PASSWORD_THAT_IS_NEVER_SET");
        let err = prompt.read_secret("Password: ").unwrap_err();
        assert!(matches!(err, Db2FileError::Configuration { .. }));
    }
}
