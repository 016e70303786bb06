use super::Config;
use anyhow::Result;
use regex::Regex;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn push(errors: &mut Vec<ConfigValidationError>, path: impl Into<String>, message: &str) {
    errors.push(ConfigValidationError {
        path: path.into(),
        message: message.to_string(),
    });
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.store.program.trim().is_empty() {
        push(&mut errors, "store.program", "Store program is required");
    }
    if config.tools.keygen.trim().is_empty() {
        push(&mut errors, "tools.keygen", "Key inspection program is required");
    }
    if config.tools.agent.trim().is_empty() {
        push(&mut errors, "tools.agent", "Agent program is required");
    }

    if let Err(e) = Regex::new(&config.prompt.pattern) {
        errors.push(ConfigValidationError {
            path: "prompt.pattern".to_string(),
            message: format!("Invalid prompt pattern: {e}"),
        });
    }
    if config.prompt.timeout_secs == 0 {
        push(&mut errors, "prompt.timeout_secs", "Timeout must be greater than 0");
    }
    if config.prompt.exit_timeout_secs == 0 {
        push(
            &mut errors,
            "prompt.exit_timeout_secs",
            "Timeout must be greater than 0",
        );
    }

    for (name, key) in &config.keys {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            push(
                &mut errors,
                format!("keys.{name}"),
                "Key name must be a plain file name",
            );
        }
        if key.secret_path.trim().is_empty() {
            push(
                &mut errors,
                format!("keys.{name}.secret_path"),
                "Secret path is required",
            );
        }
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
