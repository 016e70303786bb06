use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ssh-unlock",
    version,
    about = "Unlock SSH keys into the running agent with passphrases from gopass"
)]
pub struct Cli {
    /// Unlock only these keys instead of the ones matching this host
    /// (repeatable, or comma-separated)
    #[arg(short, long, action = ArgAction::Append, value_delimiter = ',', global = true)]
    pub keys: Vec<String>,

    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Secret store environment prefix
    #[arg(short, long, env = "SSH_UNLOCK_ENVIRONMENT", global = true)]
    pub environment: Option<String>,

    /// Hostname used for key selection
    #[arg(long, global = true)]
    pub hostname: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Unlock keys (the default)
    Unlock,
    /// Show each configured key without unlocking anything
    Status,
    Config(ConfigOpts),
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

impl Cli {
    /// Explicitly requested key names, if any.
    pub fn key_names(&self) -> Option<&[String]> {
        (!self.keys.is_empty()).then_some(self.keys.as_slice())
    }
}
