//! gopass-backed secret provider.
//!
//! Resolves secret paths by running `<store> show [-o] <path>` and capturing
//! stdout. Lookups are optionally scoped under an environment prefix and
//! memoized for the lifetime of the provider. Nothing is ever written to disk.

use super::types::{normalize_environment, scoped_path};
use crate::config::StoreConfig;
use crate::error::{Result, UnlockError};
use crate::infra::process::CommandRunner;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};
use zeroize::{Zeroize, Zeroizing};

/// Resolves secrets through an external secret-store command.
pub struct SecretProvider {
    runner: Arc<dyn CommandRunner>,
    program: String,
    raw: bool,
    environment: Option<String>,
    /// `None` when caching is disabled.
    cache: Option<Mutex<HashMap<String, Zeroizing<String>>>>,
}

impl std::fmt::Debug for SecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretProvider")
            .field("program", &self.program)
            .field("environment", &self.environment)
            .field("cache_enabled", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl SecretProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &StoreConfig) -> Self {
        Self {
            runner,
            program: config.program.clone(),
            raw: config.raw,
            environment: normalize_environment(config.environment.as_deref()),
            cache: config.cache.then(|| Mutex::new(HashMap::new())),
        }
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// The lookup key sent to the store for `path`.
    pub fn effective_path(&self, path: &str) -> String {
        scoped_path(self.environment.as_deref(), path)
    }

    /// Fetch the plaintext secret at `path`.
    pub async fn get_secret(&self, path: &str) -> Result<Zeroizing<String>> {
        let full_path = self.effective_path(path);

        if let Some(cache) = &self.cache {
            if let Some(secret) = cache.lock().get(&full_path) {
                debug!("Returning cached secret for: {}", full_path);
                return Ok(secret.clone());
            }
        }

        let mut args = vec!["show"];
        if self.raw {
            args.push("-o");
        }
        args.push(&full_path);

        let mut output = match self.runner.run(&self.program, &args).await {
            Ok(output) if output.success() => output,
            Ok(output) => return Err(self.store_failure(&full_path, output.diagnostic())),
            Err(e) => {
                return Err(self.store_failure(
                    &full_path,
                    format!("failed to run '{}': {e}", self.program),
                ))
            }
        };

        let secret = Zeroizing::new(output.stdout.trim().to_string());
        output.stdout.zeroize();

        if let Some(cache) = &self.cache {
            cache.lock().insert(full_path, secret.clone());
        }
        Ok(secret)
    }

    /// Fetch the secret at `path` and decode it as JSON.
    pub async fn get_secret_json(&self, path: &str) -> Result<serde_json::Value> {
        let raw = self.get_secret(path).await?;
        serde_json::from_str(&raw).map_err(|_| {
            error!("Failed to parse secret at '{}' as JSON", path);
            UnlockError::SecretFormat {
                path: path.to_string(),
            }
        })
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
            debug!("Secret cache cleared");
        }
    }

    fn store_failure(&self, full_path: &str, diagnostic: String) -> UnlockError {
        error!("{} failed for '{}': {}", self.program, full_path, diagnostic);
        UnlockError::ExternalTool {
            target: full_path.to_string(),
            message: diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StubRunner;

    fn store(environment: Option<&str>, cache: bool) -> StoreConfig {
        StoreConfig {
            environment: environment.map(String::from),
            cache,
            ..StoreConfig::default()
        }
    }

    #[tokio::test]
    async fn environment_prefixes_lookup_key() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "s3cret\n", ""));
        let provider = SecretProvider::new(runner.clone(), &store(Some("/prod/"), true));

        let secret = provider.get_secret("ssh/work").await.unwrap();
        assert_eq!(secret.as_str(), "s3cret");
        assert_eq!(
            runner.calls(),
            vec!["gopass show -o prod/ssh/work".to_string()]
        );
    }

    #[tokio::test]
    async fn no_environment_uses_path_unchanged() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "x", ""));
        let provider = SecretProvider::new(runner.clone(), &store(None, true));
        provider.get_secret("ssh/work").await.unwrap();
        assert_eq!(runner.calls(), vec!["gopass show -o ssh/work".to_string()]);
    }

    #[tokio::test]
    async fn raw_flag_can_be_disabled() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "x", ""));
        let config = StoreConfig {
            raw: false,
            ..StoreConfig::default()
        };
        let provider = SecretProvider::new(runner.clone(), &config);
        provider.get_secret("ssh/work").await.unwrap();
        assert_eq!(runner.calls(), vec!["gopass show ssh/work".to_string()]);
    }

    #[tokio::test]
    async fn cached_lookup_invokes_store_once() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "value", ""));
        let provider = SecretProvider::new(runner.clone(), &store(None, true));

        provider.get_secret("a").await.unwrap();
        provider.get_secret("a").await.unwrap();
        assert_eq!(runner.call_count("gopass"), 1);
    }

    #[tokio::test]
    async fn uncached_lookup_invokes_store_each_time() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "value", ""));
        let provider = SecretProvider::new(runner.clone(), &store(None, false));

        provider.get_secret("a").await.unwrap();
        provider.get_secret("a").await.unwrap();
        assert_eq!(runner.call_count("gopass"), 2);
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "value", ""));
        let provider = SecretProvider::new(runner.clone(), &store(None, true));

        provider.get_secret("a").await.unwrap();
        provider.clear_cache();
        provider.get_secret("a").await.unwrap();
        assert_eq!(runner.call_count("gopass"), 2);
    }

    #[tokio::test]
    async fn clear_cache_without_cache_is_noop() {
        let runner = Arc::new(StubRunner::new());
        let provider = SecretProvider::new(runner.clone(), &store(None, false));
        provider.clear_cache();
        assert!(!provider.cache_enabled());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn store_failure_carries_path_and_stderr() {
        let runner = Arc::new(StubRunner::new().respond(
            "gopass",
            1,
            "",
            "Error: entry is not in the password store\n",
        ));
        let provider = SecretProvider::new(runner.clone(), &store(Some("dev"), true));

        let err = provider.get_secret("ssh/missing").await.unwrap_err();
        match err {
            UnlockError::ExternalTool { target, message } => {
                assert_eq!(target, "dev/ssh/missing");
                assert_eq!(message, "Error: entry is not in the password store");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Failures are not cached and not retried.
        assert_eq!(runner.call_count("gopass"), 1);
        let _ = provider.get_secret("ssh/missing").await;
        assert_eq!(runner.call_count("gopass"), 2);
    }

    #[tokio::test]
    async fn missing_store_binary_is_external_tool_error() {
        let runner = Arc::new(StubRunner::new());
        let provider = SecretProvider::new(runner, &store(None, true));
        let err = provider.get_secret("a").await.unwrap_err();
        assert!(matches!(err, UnlockError::ExternalTool { .. }));
    }

    #[tokio::test]
    async fn json_secret_is_decoded() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "{\"a\": 1}", ""));
        let provider = SecretProvider::new(runner, &store(None, true));
        let value = provider.get_secret_json("cfg").await.unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn invalid_json_is_format_error() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "not json", ""));
        let provider = SecretProvider::new(runner, &store(None, true));
        let err = provider.get_secret_json("cfg").await.unwrap_err();
        assert!(matches!(err, UnlockError::SecretFormat { ref path } if path == "cfg"));
        assert_eq!(err.to_string(), "Secret at 'cfg' is not valid JSON");
    }

    #[tokio::test]
    async fn json_lookup_reuses_text_cache() {
        let runner = Arc::new(StubRunner::new().respond("gopass", 0, "[1, 2]", ""));
        let provider = SecretProvider::new(runner.clone(), &store(None, true));
        provider.get_secret("list").await.unwrap();
        provider.get_secret_json("list").await.unwrap();
        assert_eq!(runner.call_count("gopass"), 1);
    }
}
