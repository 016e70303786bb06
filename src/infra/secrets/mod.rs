//! Secret retrieval from an external password store.
//!
//! [`SecretProvider`] wraps the store command (gopass by default), applies an
//! optional environment scope to every lookup, and caches results in memory
//! for the duration of a run.

pub mod provider;
pub mod types;

pub use provider::SecretProvider;
pub use types::{normalize_environment, scoped_path};
