//! Key inspection and agent membership checks.

use crate::config::UNKNOWN_COMMENT;
use crate::infra::process::CommandRunner;
use std::path::Path;
use tracing::{debug, warn};

/// Identity of a private key as reported by `ssh-keygen -lf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentity {
    pub bits: Option<u32>,
    /// `SHA256:...`, absent when the key could not be inspected.
    pub fingerprint: Option<String>,
    pub comment: String,
    pub key_type: Option<String>,
}

impl KeyIdentity {
    /// Identity for a key that could not be inspected.
    pub fn unknown() -> Self {
        Self {
            bits: None,
            fingerprint: None,
            comment: UNKNOWN_COMMENT.to_string(),
            key_type: None,
        }
    }

    /// Parse one line of `ssh-keygen -lf` output:
    /// `<bits> <fingerprint> <comment> (<type>)`.
    ///
    /// The comment may contain spaces or be empty.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.lines().next()?.trim();
        let (bits, rest) = line.split_once(char::is_whitespace)?;
        let bits: u32 = bits.parse().ok()?;
        let rest = rest.trim_start();
        let (fingerprint, rest) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        if !fingerprint.contains(':') {
            return None;
        }

        let rest = rest.trim();
        let (comment, key_type) = match rest.rfind(" (").or_else(|| rest.starts_with('(').then_some(0)) {
            Some(idx) if rest.ends_with(')') => {
                let open = if idx == 0 { 0 } else { idx + 1 };
                (
                    rest[..idx].trim(),
                    Some(rest[open + 1..rest.len() - 1].to_string()),
                )
            }
            _ => (rest, None),
        };

        Some(Self {
            bits: Some(bits),
            fingerprint: Some(fingerprint.to_string()),
            comment: comment.to_string(),
            key_type,
        })
    }

    /// Case-insensitive check that the comment names `expected_host`.
    /// An empty expectation always matches.
    pub fn matches_host(&self, expected_host: &str) -> bool {
        expected_host.is_empty()
            || self
                .comment
                .to_lowercase()
                .contains(&expected_host.to_lowercase())
    }
}

/// Inspect `key_path` with `<keygen> -lf`.
///
/// Never fails: a key that cannot be inspected yields [`KeyIdentity::unknown`]
/// so it degrades into a reported host mismatch.
pub async fn inspect_key(runner: &dyn CommandRunner, keygen: &str, key_path: &Path) -> KeyIdentity {
    let path = key_path.to_string_lossy();
    match runner.run(keygen, &["-lf", &*path]).await {
        Ok(output) if output.success() => KeyIdentity::parse(&output.stdout).unwrap_or_else(|| {
            warn!("Unrecognised {} output for {}", keygen, path);
            KeyIdentity::unknown()
        }),
        Ok(output) => {
            debug!("{} -lf {} failed: {}", keygen, path, output.diagnostic());
            KeyIdentity::unknown()
        }
        Err(e) => {
            warn!("Failed to run {}: {}", keygen, e);
            KeyIdentity::unknown()
        }
    }
}

/// Whether `fingerprint` is currently held by the agent.
///
/// Always queries `<agent> -l`; registration can change outside this
/// process at any time. The exit status is ignored since `ssh-add -l`
/// exits non-zero when the agent holds no keys.
pub async fn is_fingerprint_loaded(runner: &dyn CommandRunner, agent: &str, fingerprint: &str) -> bool {
    match runner.run(agent, &["-l"]).await {
        Ok(output) => {
            if output.exit_code == Some(2) {
                debug!("{} -l could not reach the agent: {}", agent, output.diagnostic());
            }
            output.stdout.contains(fingerprint)
        }
        Err(e) => {
            warn!("Failed to query agent with {}: {}", agent, e);
            false
        }
    }
}
