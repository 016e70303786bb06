//! Key unlock orchestration.
//!
//! For each selected key the unlocker walks a fixed sequence of checks and
//! stops at the first terminal outcome:
//!
//! 1. key file missing → [`KeyOutcome::NotFound`]
//! 2. fingerprint already held by the agent → [`KeyOutcome::AlreadyLoaded`]
//! 3. comment does not name the expected host → [`KeyOutcome::HostMismatch`]
//! 4. passphrase fetched and typed into `ssh-add` → [`KeyOutcome::Unlocked`]
//!    or [`KeyOutcome::Failed`]
//!
//! A failure on one key never stops the remaining keys.

use super::keys::{inspect_key, is_fingerprint_loaded, KeyIdentity};
use super::prompt::{PromptDriver, PromptSpawner};
use super::registry::{KeyEntry, KeyRegistry};
use crate::config::Config;
use crate::error::UnlockError;
use crate::infra::process::CommandRunner;
use crate::infra::secrets::SecretProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Terminal state of one key's unlock attempt.
#[derive(Debug)]
pub enum KeyOutcome {
    NotFound { path: PathBuf },
    AlreadyLoaded,
    HostMismatch { comment: String, expected: String },
    Unlocked,
    Failed(UnlockError),
}

impl KeyOutcome {
    /// Whether this outcome should make the run exit non-zero.
    pub fn is_failure(&self) -> bool {
        matches!(self, KeyOutcome::NotFound { .. } | KeyOutcome::Failed(_))
    }
}

/// Result of one key.
#[derive(Debug)]
pub struct KeyReport {
    pub name: String,
    pub outcome: KeyOutcome,
}

impl fmt::Display for KeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            KeyOutcome::NotFound { path } => write!(f, "❌ Key not found: {}", path.display()),
            KeyOutcome::AlreadyLoaded => write!(f, "✅ Already unlocked: {}", self.name),
            KeyOutcome::HostMismatch { comment, expected } => write!(
                f,
                "⚠️  Key {} comment ({}) does not match expected host '{}'",
                self.name, comment, expected
            ),
            KeyOutcome::Unlocked => write!(f, "✅ Unlocked {}", self.name),
            KeyOutcome::Failed(e) => write!(f, "❌ Failed to unlock {}: {}", self.name, e),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct UnlockReport {
    pub hostname: String,
    pub keys: Vec<KeyReport>,
}

impl UnlockReport {
    /// True when selection matched no keys.
    pub fn nothing_to_do(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn outcome(&self, name: &str) -> Option<&KeyOutcome> {
        self.keys.iter().find(|k| k.name == name).map(|k| &k.outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.keys.iter().any(|k| k.outcome.is_failure())
    }

    /// Process exit status for this report.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for UnlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nothing_to_do() {
            return write!(f, "ℹ️  No keys configured for host '{}'", self.hostname);
        }
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Read-only view of a key, for `status`.
#[derive(Debug)]
pub struct KeyStatus {
    pub name: String,
    pub path: PathBuf,
    pub exists: bool,
    pub loaded: bool,
    pub identity: Option<KeyIdentity>,
    pub host_match: bool,
}

/// Unlocks configured keys into the running agent.
pub struct KeyUnlocker {
    registry: KeyRegistry,
    key_dir: PathBuf,
    keygen: String,
    agent: String,
    runner: Arc<dyn CommandRunner>,
    secrets: SecretProvider,
    prompt: PromptDriver,
}

impl KeyUnlocker {
    pub fn new(
        registry: KeyRegistry,
        key_dir: PathBuf,
        keygen: &str,
        agent: &str,
        runner: Arc<dyn CommandRunner>,
        secrets: SecretProvider,
        prompt: PromptDriver,
    ) -> Self {
        Self {
            registry,
            key_dir,
            keygen: keygen.to_string(),
            agent: agent.to_string(),
            runner,
            secrets,
            prompt,
        }
    }

    /// Build an unlocker from configuration. The same `runner` serves the
    /// secret store and the key tools.
    pub fn from_config(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        spawner: Arc<dyn PromptSpawner>,
    ) -> anyhow::Result<Self> {
        let secrets = SecretProvider::new(Arc::clone(&runner), &config.store);
        let prompt = PromptDriver::new(spawner, &config.tools.agent, &config.prompt)?;
        Ok(Self::new(
            KeyRegistry::from_config(&config.keys),
            config.resolved_key_dir(),
            &config.tools.keygen,
            &config.tools.agent,
            runner,
            secrets,
            prompt,
        ))
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn secrets(&self) -> &SecretProvider {
        &self.secrets
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.key_dir.join(name)
    }

    /// Unlock the named keys, or every key registered for `hostname` when no
    /// names are given.
    ///
    /// Only unknown key names are an error; per-key problems are reported in
    /// the returned [`UnlockReport`].
    pub async fn run<S: AsRef<str>>(
        &self,
        names: Option<&[S]>,
        hostname: &str,
    ) -> Result<UnlockReport, UnlockError> {
        let selected = self.registry.select(names, hostname)?;

        if selected.is_empty() {
            info!("No keys configured for host '{}'", hostname);
        }

        let mut keys = Vec::with_capacity(selected.len());
        for entry in selected {
            let outcome = self.unlock_key(entry).await;
            keys.push(KeyReport {
                name: entry.name.clone(),
                outcome,
            });
        }

        Ok(UnlockReport {
            hostname: hostname.to_string(),
            keys,
        })
    }

    /// Drive a single key to its terminal outcome.
    pub async fn unlock_key(&self, entry: &KeyEntry) -> KeyOutcome {
        let key_path = self.key_path(&entry.name);
        if !key_path.exists() {
            warn!("{}", UnlockError::NotFound(key_path.clone()));
            return KeyOutcome::NotFound { path: key_path };
        }

        let identity = inspect_key(self.runner.as_ref(), &self.keygen, &key_path).await;

        if self.is_loaded(&identity).await {
            info!("Already unlocked: {}", entry.name);
            return KeyOutcome::AlreadyLoaded;
        }

        if !identity.matches_host(&entry.expected_host) {
            let mismatch = UnlockError::HostMismatch {
                key: entry.name.clone(),
                comment: identity.comment.clone(),
                expected: entry.expected_host.clone(),
            };
            warn!("{}", mismatch);
            return KeyOutcome::HostMismatch {
                comment: identity.comment,
                expected: entry.expected_host.clone(),
            };
        }

        match self.register(entry, &key_path).await {
            Ok(()) => {
                info!("Unlocked {}", entry.name);
                KeyOutcome::Unlocked
            }
            Err(e) => {
                error!("Failed to unlock {}: {}", entry.name, e);
                KeyOutcome::Failed(e)
            }
        }
    }

    async fn register(&self, entry: &KeyEntry, key_path: &Path) -> Result<(), UnlockError> {
        let passphrase = self.secrets.get_secret(&entry.secret_path).await?;
        self.prompt.register(key_path, &passphrase).await
    }

    async fn is_loaded(&self, identity: &KeyIdentity) -> bool {
        match &identity.fingerprint {
            Some(fingerprint) => {
                is_fingerprint_loaded(self.runner.as_ref(), &self.agent, fingerprint).await
            }
            None => false,
        }
    }

    /// Inspect every registered key without fetching any secret.
    pub async fn status(&self, hostname: &str) -> Vec<KeyStatus> {
        let mut statuses = Vec::with_capacity(self.registry.entries().len());
        for entry in self.registry.entries() {
            let path = self.key_path(&entry.name);
            if !path.exists() {
                statuses.push(KeyStatus {
                    name: entry.name.clone(),
                    path,
                    exists: false,
                    loaded: false,
                    identity: None,
                    host_match: false,
                });
                continue;
            }

            let identity = inspect_key(self.runner.as_ref(), &self.keygen, &path).await;
            let loaded = self.is_loaded(&identity).await;
            let host_match = !entry.expected_host.is_empty()
                && hostname
                    .to_lowercase()
                    .contains(&entry.expected_host.to_lowercase())
                && identity.matches_host(&entry.expected_host);
            statuses.push(KeyStatus {
                name: entry.name.clone(),
                path,
                exists: true,
                loaded,
                identity: Some(identity),
                host_match,
            });
        }
        statuses
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.exists {
            return write!(f, "{:<24} missing ({})", self.name, self.path.display());
        }
        let comment = self
            .identity
            .as_ref()
            .map(|i| i.comment.as_str())
            .unwrap_or_default();
        write!(
            f,
            "{:<24} {:<10} {:<8} {}",
            self.name,
            if self.loaded { "loaded" } else { "locked" },
            if self.host_match { "this-host" } else { "-" },
            comment
        )
    }
}
