/// Default configuration constants used across the system.

/// Secret store command.
pub const DEFAULT_STORE_PROGRAM: &str = "gopass";

/// Key inspection command.
pub const DEFAULT_KEYGEN_PROGRAM: &str = "ssh-keygen";

/// Agent query / registration command.
pub const DEFAULT_AGENT_PROGRAM: &str = "ssh-add";

/// Prompt printed by `ssh-add` when a key is encrypted.
pub const DEFAULT_PROMPT_PATTERN: &str = "Enter passphrase for.*:";

/// How long to wait for the passphrase prompt.
pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 30;

/// How long to wait for `ssh-add` to exit after the passphrase is sent.
pub const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 30;

/// Config file the original shell tooling kept next to the keys.
pub const HOME_CONFIG_FILE: &str = "ssh_unlock_config.toml";

/// Sentinel comment for keys that could not be inspected.
pub const UNKNOWN_COMMENT: &str = "unknown";
