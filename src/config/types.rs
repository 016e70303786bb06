use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Secret Store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store command, `gopass` unless overridden.
    pub program: String,
    /// Scope prepended to every lookup (`<environment>/<path>`).
    pub environment: Option<String>,
    /// Memoize successful lookups for the rest of the run.
    pub cache: bool,
    /// Pass `-o` so only the first line of the entry is printed.
    pub raw: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_STORE_PROGRAM.to_string(),
            environment: None,
            cache: true,
            raw: true,
        }
    }
}

// ============================================================================
// External Tools
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub keygen: String,
    pub agent: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            keygen: DEFAULT_KEYGEN_PROGRAM.to_string(),
            agent: DEFAULT_AGENT_PROGRAM.to_string(),
        }
    }
}

// ============================================================================
// Passphrase Prompt
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Regex matched against the agent's terminal output.
    pub pattern: String,
    pub timeout_secs: u64,
    pub exit_timeout_secs: u64,
}

impl PromptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_secs(self.exit_timeout_secs)
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PROMPT_PATTERN.to_string(),
            timeout_secs: DEFAULT_PROMPT_TIMEOUT_SECS,
            exit_timeout_secs: DEFAULT_EXIT_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Key Registry
// ============================================================================

/// One configured key. The map key in [`super::Config::keys`] is the key's
/// file name under `key_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntryConfig {
    /// Store path holding the key's passphrase.
    pub secret_path: String,
    /// Host token expected in the key's comment; empty disables the check
    /// and excludes the key from host auto-selection.
    #[serde(default)]
    pub host: String,
}
