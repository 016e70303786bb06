//! External command invocation.
//!
//! Every non-interactive tool the unlocker talks to (gopass, ssh-keygen,
//! `ssh-add -l`) goes through [`CommandRunner`] so tests can substitute a
//! recording stub for real processes.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use zeroize::Zeroize;

/// Largest command output accepted (1 MiB). Longer stderr is truncated.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best diagnostic text for a failed command: stderr, else stdout, else
    /// the exit status.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs a program to completion and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// No timeout is applied; the external tools are expected to finish or fail
/// on their own.
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args);

        // Don't inherit stdin; gopass may otherwise block on its own prompts.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = cmd.output().await?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: decode_stdout(output.stdout)?,
            stderr: lossy_capped(&output.stderr),
        })
    }
}

/// Stdout carries secrets and parsed listings, so it is returned exactly or
/// not at all.
fn decode_stdout(mut bytes: Vec<u8>) -> std::io::Result<String> {
    if bytes.len() > MAX_OUTPUT_BYTES {
        bytes.zeroize();
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("output exceeds {MAX_OUTPUT_BYTES} bytes"),
        ));
    }
    String::from_utf8(bytes).map_err(|e| {
        e.into_bytes().zeroize();
        std::io::Error::new(std::io::ErrorKind::InvalidData, "output is not valid UTF-8")
    })
}

fn lossy_capped(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_OUTPUT_BYTES);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
