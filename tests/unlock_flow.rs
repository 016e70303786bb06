//! End-to-end unlock flow against scripted tools.

use ssh_unlock::config::{Config, KeyEntryConfig};
use ssh_unlock::error::UnlockError;
use ssh_unlock::ssh::{KeyOutcome, KeyUnlocker};
use ssh_unlock::test_utils::{PromptScript, ScriptedSpawner, StubRunner};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ASKONE_KEY: &str = "256 SHA256:askonefp rick@askone (ED25519)\n";
const NO_IDENTITIES: &str = "The agent has no identities.\n";

fn config_with_keys(dir: &TempDir, environment: Option<&str>) -> Config {
    let mut config = Config {
        key_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    config.store.environment = environment.map(String::from);
    for (name, host) in [("rick_askone", "askone"), ("rick_eos", "eos")] {
        config.keys.insert(
            name.to_string(),
            KeyEntryConfig {
                secret_path: format!("ssh/{name}"),
                host: host.to_string(),
            },
        );
        std::fs::write(dir.path().join(name), "PRIVATE KEY").unwrap();
    }
    config
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn unlocker(config: &Config, runner: &Arc<StubRunner>, spawner: &Arc<ScriptedSpawner>) -> KeyUnlocker {
    KeyUnlocker::from_config(config, runner.clone(), spawner.clone()).unwrap()
}

#[tokio::test]
async fn unlocks_host_key_with_scoped_secret() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_keys(&dir, Some("personal"));
    let runner = Arc::new(
        StubRunner::new()
            .respond("ssh-keygen", 0, ASKONE_KEY, "")
            .respond("ssh-add", 1, NO_IDENTITIES, "")
            .respond("gopass", 0, "s3cret\n", ""),
    );
    let spawner = Arc::new(ScriptedSpawner::accepting());

    let report = unlocker(&config, &runner, &spawner)
        .run::<String>(None, "askone")
        .await
        .unwrap();

    assert_eq!(report.keys.len(), 1);
    assert!(matches!(report.outcome("rick_askone"), Some(KeyOutcome::Unlocked)));
    assert_eq!(report.exit_code(), 0);
    assert_eq!(spawner.record().sent, vec!["s3cret"]);
    assert!(runner
        .calls()
        .contains(&"gopass show -o personal/ssh/rick_askone".to_string()));
    assert!(!report.to_string().contains("s3cret"));
}

#[tokio::test]
async fn prompt_timeout_fails_without_leaking_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_keys(&dir, None);
    let runner = Arc::new(
        StubRunner::new()
            .respond("ssh-keygen", 0, ASKONE_KEY, "")
            .respond("ssh-add", 1, NO_IDENTITIES, "")
            .respond("gopass", 0, "s3cret", ""),
    );
    let spawner = Arc::new(ScriptedSpawner::new(PromptScript::Silent));

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let report = unlocker(&config, &runner, &spawner)
        .run(Some(&["rick_askone"][..]), "anywhere")
        .await
        .unwrap();

    assert!(matches!(
        report.outcome("rick_askone"),
        Some(KeyOutcome::Failed(UnlockError::PromptTimeout { .. }))
    ));
    assert!(spawner.record().sent.is_empty());
    assert_eq!(report.exit_code(), 1);
    assert!(!report.to_string().contains("s3cret"));
    assert!(!format!("{report:?}").contains("s3cret"));

    let logs = logs.contents();
    assert!(logs.contains("Failed to unlock rick_askone"));
    assert!(!logs.contains("s3cret"));
}

#[tokio::test]
async fn loaded_key_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_keys(&dir, None);
    let runner = Arc::new(
        StubRunner::new()
            .respond("ssh-keygen", 0, ASKONE_KEY, "")
            .respond("ssh-add", 0, ASKONE_KEY, ""),
    );
    let spawner = Arc::new(ScriptedSpawner::accepting());

    let report = unlocker(&config, &runner, &spawner)
        .run::<String>(None, "askone")
        .await
        .unwrap();

    assert!(matches!(
        report.outcome("rick_askone"),
        Some(KeyOutcome::AlreadyLoaded)
    ));
    assert_eq!(runner.call_count("gopass"), 0);
    assert!(spawner.record().spawned.is_empty());
}

#[tokio::test]
async fn wrong_comment_blocks_unlock() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_keys(&dir, None);
    let runner = Arc::new(
        StubRunner::new()
            .respond("ssh-keygen", 0, "256 SHA256:fp rick@nexon (ED25519)\n", "")
            .respond("ssh-add", 1, NO_IDENTITIES, ""),
    );
    let spawner = Arc::new(ScriptedSpawner::accepting());

    let report = unlocker(&config, &runner, &spawner)
        .run::<String>(None, "askone")
        .await
        .unwrap();

    assert!(matches!(
        report.outcome("rick_askone"),
        Some(KeyOutcome::HostMismatch { .. })
    ));
    assert_eq!(runner.call_count("gopass"), 0);
    assert!(spawner.record().spawned.is_empty());
    assert!(report.to_string().contains("does not match expected host 'askone'"));
}

#[tokio::test]
async fn unmatched_host_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_keys(&dir, None);
    let runner = Arc::new(StubRunner::new());
    let spawner = Arc::new(ScriptedSpawner::accepting());

    let report = unlocker(&config, &runner, &spawner)
        .run::<String>(None, "mars")
        .await
        .unwrap();

    assert!(report.nothing_to_do());
    assert_eq!(report.exit_code(), 0);
    assert!(runner.calls().is_empty());
    assert!(spawner.record().spawned.is_empty());
}

#[tokio::test]
async fn secret_cache_spans_keys_sharing_a_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_keys(&dir, None);
    for entry in config.keys.values_mut() {
        entry.secret_path = "ssh/shared".into();
        entry.host = "lab".into();
    }
    let runner = Arc::new(
        StubRunner::new()
            .respond("ssh-keygen", 0, "256 SHA256:fp rick@lab (ED25519)\n", "")
            .respond("ssh-add", 1, NO_IDENTITIES, "")
            .respond("gopass", 0, "shared", ""),
    );
    let spawner = Arc::new(ScriptedSpawner::accepting());

    let report = unlocker(&config, &runner, &spawner)
        .run::<String>(None, "lab01")
        .await
        .unwrap();

    assert_eq!(report.keys.len(), 2);
    assert_eq!(runner.call_count("gopass"), 1);
    assert_eq!(spawner.record().sent, vec!["shared", "shared"]);
}
