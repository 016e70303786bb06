//! Test doubles for the process and pty seams.
//!
//! [`StubRunner`] answers non-interactive commands from a script and records
//! every invocation. [`ScriptedSpawner`] stands in for the pseudo-terminal
//! so prompt handling can be exercised without `ssh-add`.

use crate::error::UnlockError;
use crate::infra::process::{CommandOutput, CommandRunner};
use crate::ssh::prompt::{PromptSession, PromptSpawner};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

struct StubResponse {
    program: String,
    args_contain: Option<String>,
    output: CommandOutput,
}

/// Scripted [`CommandRunner`]. Programs without a scripted response fail to
/// spawn, like a binary missing from `PATH`.
#[derive(Default)]
pub struct StubRunner {
    responses: Vec<StubResponse>,
    calls: Mutex<Vec<String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every invocation of `program`.
    pub fn respond(self, program: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.push(program, None, exit_code, stdout, stderr)
    }

    /// Answer invocations of `program` whose joined arguments contain
    /// `args_contain`. Takes precedence over [`StubRunner::respond`].
    pub fn respond_when(
        self,
        program: &str,
        args_contain: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        self.push(program, Some(args_contain), exit_code, stdout, stderr)
    }

    fn push(
        mut self,
        program: &str,
        args_contain: Option<&str>,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        self.responses.push(StubResponse {
            program: program.to_string(),
            args_contain: args_contain.map(String::from),
            output: CommandOutput {
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        });
        self
    }

    /// Every command line run so far, as `program arg1 arg2`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.split(' ').next() == Some(program))
            .count()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let joined = args.join(" ");
        self.calls.lock().push(format!("{program} {joined}"));

        let matches_program = |r: &&StubResponse| r.program == program;
        let specific = self
            .responses
            .iter()
            .filter(matches_program)
            .find(|r| r.args_contain.as_deref().is_some_and(|a| joined.contains(a)));
        let general = self
            .responses
            .iter()
            .filter(matches_program)
            .find(|r| r.args_contain.is_none());

        specific.or(general).map(|r| r.output.clone()).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{program}: command not found"),
            )
        })
    }
}

/// How a scripted agent process behaves.
#[derive(Debug, Clone)]
pub enum PromptScript {
    /// Prints the prompt, accepts a line, exits with the given code.
    Prompt { prompt: String, exit_code: i32 },
    /// Never prints anything matching the prompt pattern.
    Silent,
    /// Prints some output and exits before prompting.
    ExitsEarly { output: String },
    /// Prints the prompt, then never exits after the passphrase is sent.
    Hangs { prompt: String },
}

/// Everything a [`ScriptedSpawner`] observed.
#[derive(Debug, Default, Clone)]
pub struct PromptRecord {
    pub spawned: Vec<String>,
    pub sent: Vec<String>,
    pub terminated: usize,
}

/// Fake [`PromptSpawner`] that replays a [`PromptScript`].
pub struct ScriptedSpawner {
    script: PromptScript,
    record: Arc<Mutex<PromptRecord>>,
}

impl ScriptedSpawner {
    pub fn new(script: PromptScript) -> Self {
        Self {
            script,
            record: Arc::new(Mutex::new(PromptRecord::default())),
        }
    }

    /// Accepts any passphrase and exits 0.
    pub fn accepting() -> Self {
        Self::new(PromptScript::Prompt {
            prompt: "Enter passphrase for /home/user/.ssh/id_test: ".into(),
            exit_code: 0,
        })
    }

    pub fn record(&self) -> PromptRecord {
        self.record.lock().clone()
    }
}

#[async_trait]
impl PromptSpawner for ScriptedSpawner {
    async fn spawn(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<Box<dyn PromptSession>, UnlockError> {
        self.record
            .lock()
            .spawned
            .push(format!("{program} {}", args.join(" ")));
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            record: Arc::clone(&self.record),
            answered: false,
        }))
    }
}

struct ScriptedSession {
    script: PromptScript,
    record: Arc<Mutex<PromptRecord>>,
    answered: bool,
}

#[async_trait]
impl PromptSession for ScriptedSession {
    async fn expect(&mut self, pattern: &Regex, timeout: Duration) -> Result<String, UnlockError> {
        match &self.script {
            PromptScript::Prompt { prompt, .. } | PromptScript::Hangs { prompt }
                if pattern.is_match(prompt) =>
            {
                Ok(prompt.clone())
            }
            PromptScript::ExitsEarly { output } => Err(UnlockError::PromptClosed {
                output: output.clone(),
            }),
            _ => Err(UnlockError::PromptTimeout { timeout }),
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), UnlockError> {
        self.record.lock().sent.push(line.to_string());
        self.answered = true;
        Ok(())
    }

    async fn wait(&mut self, _timeout: Duration) -> Result<Option<i32>, UnlockError> {
        match &self.script {
            PromptScript::Prompt { exit_code, .. } if self.answered => Ok(Some(*exit_code)),
            PromptScript::ExitsEarly { .. } => Ok(Some(1)),
            _ => Ok(None),
        }
    }

    fn terminate(&mut self) {
        self.record.lock().terminated += 1;
    }
}
