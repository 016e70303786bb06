//! SSH key inspection, selection and agent registration.

pub mod keys;
pub mod prompt;
pub mod pty;
pub mod registry;
pub mod unlock;

pub use keys::{inspect_key, is_fingerprint_loaded, KeyIdentity};
pub use prompt::{PromptDriver, PromptSession, PromptSpawner};
pub use pty::PtySpawner;
pub use registry::{KeyEntry, KeyRegistry};
pub use unlock::{KeyOutcome, KeyReport, KeyStatus, KeyUnlocker, UnlockReport};
