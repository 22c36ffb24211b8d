use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use aitk::cli::{Cli, Commands, ConfigCommands, EnvCommands};
use aitk::commands::{
    handle_check, handle_config_get, handle_config_list, handle_config_path, handle_config_set,
    handle_config_unset, handle_env_diff, handle_env_init, handle_env_list, handle_env_pull,
    handle_env_push, handle_interactive_setup,
};
use aitk::{AitkError, CredentialResolver, Result};

/// Log filter: `AITK_LOG` wins, then `-v`/`-vv`, else warnings only.
fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "aitk=warn",
        1 => "aitk=debug",
        _ => "aitk=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("AITK_LOG").unwrap_or_else(|_| fallback.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let project_dir = cli.global.project_dir()?;
    let resolver = CredentialResolver::for_project(&project_dir);

    match cli.command {
        Commands::Env { command } => match command {
            EnvCommands::Init { force } => handle_env_init(&resolver, force),
            EnvCommands::Push { project } => handle_env_push(&resolver, &project, &project_dir),
            EnvCommands::Pull { project } => handle_env_pull(&resolver, &project, &project_dir),
            EnvCommands::Diff { project, json } => {
                handle_env_diff(&resolver, &project, &project_dir, json)
            }
            EnvCommands::List { project, json } => {
                handle_env_list(&resolver, project.as_deref(), json)
            }
        },
        Commands::Config { command } => match command {
            None => handle_interactive_setup(&resolver),
            Some(ConfigCommands::Get { key, reveal }) => handle_config_get(&resolver, &key, reveal),
            Some(ConfigCommands::Set { key, value }) => handle_config_set(&resolver, &key, &value),
            Some(ConfigCommands::Unset { key }) => handle_config_unset(&resolver, &key),
            Some(ConfigCommands::List) => handle_config_list(&resolver),
            Some(ConfigCommands::Path) => handle_config_path(&resolver),
        },
        Commands::Check { keys } => handle_check(&resolver, &keys),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match &e {
                AitkError::MissingCredentials(_) => eprintln!("{}", e),
                _ => eprintln!("Error: {}", e),
            }
            ExitCode::from(e.exit_code())
        }
    }
}
