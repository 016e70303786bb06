//! Error types for key unlocking.
//!
//! Passphrases and secret values are never included in error messages.

use std::path::PathBuf;
use std::time::Duration;

/// Errors produced while resolving secrets or unlocking a single key.
#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    /// An external tool (secret store, ssh-keygen) failed.
    #[error("{target}: {message}")]
    ExternalTool { target: String, message: String },

    #[error("Secret at '{path}' is not valid JSON")]
    SecretFormat { path: String },

    #[error("Key not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Key {key} comment ({comment}) does not match expected host '{expected}'")]
    HostMismatch {
        key: String,
        comment: String,
        expected: String,
    },

    #[error("passphrase prompt did not appear within {}s", .timeout.as_secs())]
    PromptTimeout { timeout: Duration },

    #[error("process exited before prompting for a passphrase: {output}")]
    PromptClosed { output: String },

    #[error("{}", registration_failure_message(.exit_code))]
    RegistrationFailure { exit_code: Option<i32> },

    #[error("pty error: {0}")]
    Pty(String),

    #[error("Unknown key '{name}' (configured keys: {})", .known.join(", "))]
    UnknownKey { name: String, known: Vec<String> },
}

fn registration_failure_message(exit_code: &Option<i32>) -> String {
    match *exit_code {
        Some(code) => format!("agent registration failed: exit {code}"),
        None => "agent registration did not complete (passphrase rejected?)".to_string(),
    }
}

impl UnlockError {
    /// True for failures of the interactive prompt itself, as opposed to the
    /// agent rejecting the key after the passphrase was sent.
    pub fn is_prompt_failure(&self) -> bool {
        matches!(
            self,
            UnlockError::PromptTimeout { .. } | UnlockError::PromptClosed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, UnlockError>;
