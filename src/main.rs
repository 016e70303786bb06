use clap::Parser;
use ssh_unlock::cli::{Cli, Commands, ConfigAction};
use ssh_unlock::config::{validate_config, validate_config_object, Config};
use ssh_unlock::infra::{current_hostname, SystemCommandRunner};
use ssh_unlock::logging;
use ssh_unlock::ssh::{KeyUnlocker, PtySpawner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Exit status for failures outside any single key: bad configuration,
/// unknown key names, unreadable hostname.
const USAGE_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(USAGE_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    if let Some(Commands::Config(opts)) = &cli.command {
        if let ConfigAction::Init = opts.action {
            let path = cli.config.as_deref().unwrap_or("ssh-unlock.toml");
            Config::write_default(path)?;
            info!("Configuration file created: {}", path);
            return Ok(0);
        }
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(environment) = &cli.environment {
        config.store.environment = Some(environment.clone());
    }
    if let Some(hostname) = &cli.hostname {
        config.hostname = Some(hostname.clone());
    }

    match &cli.command {
        Some(Commands::Config(opts)) => match opts.action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(0);
            }
            ConfigAction::Validate => {
                let errors = validate_config(&config);
                if errors.is_empty() {
                    info!("Configuration is valid ({} keys)", config.keys.len());
                    return Ok(0);
                }
                for e in &errors {
                    println!("{e}");
                }
                return Ok(USAGE_FAILURE);
            }
            ConfigAction::Init => return Ok(0),
        },
        _ => validate_config_object(&config)?,
    }

    let hostname = current_hostname(config.hostname.as_deref())?;
    let unlocker = KeyUnlocker::from_config(
        &config,
        Arc::new(SystemCommandRunner::new()),
        Arc::new(PtySpawner::new()),
    )?;

    if let Some(Commands::Status) = cli.command {
        for status in unlocker.status(&hostname).await {
            println!("{status}");
        }
        return Ok(0);
    }

    info!("Unlocking keys for host '{}'", hostname);
    let report = unlocker.run(cli.key_names(), &hostname).await?;
    println!("{report}");
    Ok(report.exit_code() as u8)
}
