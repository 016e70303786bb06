//! Scripted passphrase entry for `ssh-add`.
//!
//! `ssh-add` only reads a passphrase from its controlling terminal, so the
//! driver runs it under a pseudo-terminal, waits for the prompt, types the
//! passphrase and waits for the exit status. The terminal is reached through
//! [`PromptSpawner`] / [`PromptSession`] so tests can replay a fake process.

use crate::config::PromptConfig;
use crate::error::UnlockError;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Starts interactive processes.
#[async_trait]
pub trait PromptSpawner: Send + Sync {
    async fn spawn(&self, program: &str, args: &[&str]) -> Result<Box<dyn PromptSession>, UnlockError>;
}

/// A running interactive process.
#[async_trait]
pub trait PromptSession: Send {
    /// Wait until the output seen so far matches `pattern`.
    ///
    /// Fails with [`UnlockError::PromptTimeout`] when `timeout` elapses and
    /// [`UnlockError::PromptClosed`] when the process closes its terminal
    /// first. Returns the matched text.
    async fn expect(&mut self, pattern: &Regex, timeout: Duration) -> Result<String, UnlockError>;

    /// Type `line` followed by a newline.
    async fn send_line(&mut self, line: &str) -> Result<(), UnlockError>;

    /// Wait for the process to exit. `Ok(None)` means it was still running
    /// when `timeout` elapsed.
    async fn wait(&mut self, timeout: Duration) -> Result<Option<i32>, UnlockError>;

    /// Kill and reap the process. Safe to call more than once.
    fn terminate(&mut self);
}

/// Drives `<agent> <key_path>` through its passphrase prompt.
pub struct PromptDriver {
    spawner: Arc<dyn PromptSpawner>,
    program: String,
    pattern: Regex,
    prompt_timeout: Duration,
    exit_timeout: Duration,
}

impl PromptDriver {
    pub fn new(
        spawner: Arc<dyn PromptSpawner>,
        program: &str,
        config: &PromptConfig,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            spawner,
            program: program.to_string(),
            pattern: Regex::new(&config.pattern)?,
            prompt_timeout: config.timeout(),
            exit_timeout: config.exit_timeout(),
        })
    }

    /// Register `key_path` with the agent, answering its prompt with
    /// `passphrase`.
    pub async fn register(&self, key_path: &Path, passphrase: &str) -> Result<(), UnlockError> {
        let path = key_path.to_string_lossy();
        let mut session = self.spawner.spawn(&self.program, &[&*path]).await?;
        let result = self.drive(session.as_mut(), passphrase).await;
        if result.is_err() {
            session.terminate();
        }
        result
    }

    async fn drive(&self, session: &mut dyn PromptSession, passphrase: &str) -> Result<(), UnlockError> {
        let prompt = session.expect(&self.pattern, self.prompt_timeout).await?;
        debug!("Agent prompted: {}", prompt.trim());

        session.send_line(passphrase).await?;

        match session.wait(self.exit_timeout).await? {
            Some(0) => Ok(()),
            Some(code) => Err(UnlockError::RegistrationFailure {
                exit_code: Some(code),
            }),
            None => {
                warn!(
                    "{} still running {}s after the passphrase was sent",
                    self.program,
                    self.exit_timeout.as_secs()
                );
                Err(UnlockError::RegistrationFailure { exit_code: None })
            }
        }
    }
}
