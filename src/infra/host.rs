use anyhow::{Context, Result};

/// Current hostname, lowercased.
///
/// An explicit override (from config or `SSH_UNLOCK_HOSTNAME`) wins over the
/// system hostname.
pub fn current_hostname(override_name: Option<&str>) -> Result<String> {
    if let Some(name) = override_name.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_lowercase());
    }

    let name = nix::unistd::gethostname().context("Failed to read system hostname")?;
    Ok(name.to_string_lossy().trim().to_lowercase())
}
