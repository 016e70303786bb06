//! Pseudo-terminal backend for [`PromptSession`].

use super::prompt::{PromptSession, PromptSpawner};
use crate::error::UnlockError;
use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use regex::Regex;
use std::io::{Read, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// How often a running child is polled for its exit status.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawns processes attached to a fresh pseudo-terminal.
#[derive(Debug, Default, Clone)]
pub struct PtySpawner;

impl PtySpawner {
    pub fn new() -> Self {
        Self
    }
}

fn pty_error(context: &str, e: impl std::fmt::Display) -> UnlockError {
    UnlockError::Pty(format!("{context}: {e}"))
}

#[async_trait]
impl PromptSpawner for PtySpawner {
    async fn spawn(&self, program: &str, args: &[&str]) -> Result<Box<dyn PromptSession>, UnlockError> {
        let pair = native_pty_system()
            .openpty(PtySize::default())
            .map_err(|e| pty_error("failed to open pty", e))?;

        // CommandBuilder defaults to $HOME; relative key paths resolve
        // against our own directory.
        let cwd = std::env::current_dir()
            .map_err(|e| pty_error("failed to read working directory", e))?;
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.cwd(cwd);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| pty_error(&format!("failed to spawn {program}"), e))?;
        // Only the child may hold the slave side, so EOF shows up on exit.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| pty_error("failed to read pty", e))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| pty_error("failed to write pty", e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || pump_output(reader, tx));

        debug!("Spawned {} under a pty", program);
        Ok(Box::new(PtySession {
            _master: pair.master,
            writer,
            child: Some(child),
            output: rx,
            buffer: String::new(),
        }))
    }
}

/// Copies terminal output into the channel until the child closes the pty.
fn pump_output(mut reader: Box<dyn Read + Send>, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // Linux reports EIO once the slave side is gone.
            Err(_) => break,
        }
    }
}

struct PtySession {
    _master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Option<Box<dyn Child + Send + Sync>>,
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Output received but not yet consumed by a match.
    buffer: String,
}

#[async_trait]
impl PromptSession for PtySession {
    async fn expect(&mut self, pattern: &Regex, timeout: Duration) -> Result<String, UnlockError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = pattern.find(&self.buffer) {
                let matched = found.as_str().to_string();
                let end = found.end();
                self.buffer.drain(..end);
                return Ok(matched);
            }

            match tokio::time::timeout_at(deadline, self.output.recv()).await {
                Ok(Some(chunk)) => self.buffer.push_str(&String::from_utf8_lossy(&chunk)),
                Ok(None) => {
                    return Err(UnlockError::PromptClosed {
                        output: self.buffer.trim().to_string(),
                    })
                }
                Err(_) => return Err(UnlockError::PromptTimeout { timeout }),
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), UnlockError> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(|e| pty_error("failed to write to pty", e))
    }

    async fn wait(&mut self, timeout: Duration) -> Result<Option<i32>, UnlockError> {
        let deadline = Instant::now() + timeout;
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| UnlockError::Pty("process already reaped".to_string()))?;

        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| pty_error("failed to poll child", e))?
            {
                return Ok(Some(status.exit_code() as i32));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Anything short of a confirmed exit gets killed, or wait() may block.
            if !matches!(child.try_wait(), Ok(Some(_))) {
                debug!("Killing unfinished agent process");
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.terminate();
    }
}
