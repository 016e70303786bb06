//! The key registry and host-based key selection.

use crate::config::KeyEntryConfig;
use crate::error::UnlockError;
use std::collections::BTreeMap;

/// A configured key: file name, passphrase location, expected host token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub name: String,
    pub secret_path: String,
    pub expected_host: String,
}

/// Immutable set of keys this tool knows how to unlock.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    entries: Vec<KeyEntry>,
}

impl KeyRegistry {
    pub fn new(items: impl IntoIterator<Item = KeyEntry>) -> Self {
        let mut entries: Vec<KeyEntry> = Vec::new();
        for entry in items {
            // Later duplicates replace earlier ones so names stay unique.
            match entries.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Self { entries }
    }

    pub fn from_config(keys: &BTreeMap<String, KeyEntryConfig>) -> Self {
        Self::new(keys.iter().map(|(name, key)| KeyEntry {
            name: name.clone(),
            secret_path: key.secret_path.clone(),
            expected_host: key.host.trim().to_string(),
        }))
    }

    pub fn get(&self, name: &str) -> Option<&KeyEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys whose host token appears in `hostname`. Keys without a host
    /// token are only unlocked when named explicitly.
    pub fn for_host(&self, hostname: &str) -> Vec<&KeyEntry> {
        let hostname = hostname.to_lowercase();
        self.entries
            .iter()
            .filter(|e| !e.expected_host.is_empty())
            .filter(|e| hostname.contains(&e.expected_host.to_lowercase()))
            .collect()
    }

    /// Resolve an explicit list of key names, rejecting unknown names and
    /// dropping repeats.
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&KeyEntry>, UnlockError> {
        let mut selected: Vec<&KeyEntry> = Vec::new();
        for name in names {
            let name = name.as_ref();
            let entry = self.get(name).ok_or_else(|| UnlockError::UnknownKey {
                name: name.to_string(),
                known: self.names(),
            })?;
            if !selected.iter().any(|e| e.name == entry.name) {
                selected.push(entry);
            }
        }
        Ok(selected)
    }

    /// Explicit names when given (and non-empty), otherwise host matching.
    pub fn select<S: AsRef<str>>(
        &self,
        names: Option<&[S]>,
        hostname: &str,
    ) -> Result<Vec<&KeyEntry>, UnlockError> {
        match names {
            Some(names) if !names.is_empty() => self.resolve_names(names),
            _ => Ok(self.for_host(hostname)),
        }
    }
}
