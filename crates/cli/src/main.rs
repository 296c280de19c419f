use crate::{
    conn::{ConnectionPinger, PostgresPinger, RemoteFeedPinger},
    env::EnvManager,
    error::CliError,
    shutdown::ExitCode,
};
use clap::Parser;
use commands::Commands;
use engine_config::settings::JobSettings;
use model::execution::params::JobParameters;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "batchsync",
    version,
    about = "Imports a person file into a versioned store and reconciles it with a remote feed"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "batchsync failed");
            ExitCode::Failed
        }
    };
    std::process::exit(code.as_i32());
}

async fn dispatch(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::Run {
            source,
            output,
            restart,
            overrides,
            json,
        } => {
            let mut settings = load_settings(overrides.env_file.as_deref())?;
            overrides.apply(&mut settings);

            let mut params = JobParameters::new(source, output);
            if let Some(run_id) = restart {
                params = params.restart(run_id);
            }

            let cancel = CancellationToken::new();
            shutdown::register_handlers(cancel.clone());

            let result = engine_runtime::run(settings, params, cancel).await?;
            output::print_job(&result, json)?;
            Ok(result.status.into())
        }
        Commands::Progress {
            run,
            env_file,
            state_dir,
            json,
        } => {
            let mut settings = load_settings(env_file.as_deref())?;
            if let Some(dir) = state_dir {
                settings.state_dir = dir;
            }

            let state = engine_runtime::execution::open_state(&settings)?;
            let progress = engine_runtime::execution::progress::inspect(state.as_ref(), run).await?;
            output::print_progress(&progress, json)?;
            Ok(ExitCode::Success)
        }
        Commands::TestConn {
            database_url,
            base_url,
            env_file,
        } => {
            let settings = load_settings(env_file.as_deref())?;

            let mut pingers: Vec<Box<dyn ConnectionPinger>> = Vec::new();
            if let Some(url) = database_url.or(settings.database_url) {
                pingers.push(Box::new(PostgresPinger { url }));
            }
            if let Some(base_url) = base_url.or(settings.remote.base_url) {
                pingers.push(Box::new(RemoteFeedPinger { base_url }));
            }
            if pingers.is_empty() {
                return Err(CliError::Config(
                    "nothing to check: pass --database-url or --base-url".into(),
                ));
            }

            let mut healthy = true;
            for pinger in pingers {
                match pinger.ping().await {
                    Ok(()) => info!(dependency = pinger.target(), "Connection OK"),
                    Err(e) => {
                        error!(dependency = pinger.target(), error = %e, "Connection failed");
                        healthy = false;
                    }
                }
            }
            Ok(if healthy {
                ExitCode::Success
            } else {
                ExitCode::Failed
            })
        }
    }
}

fn load_settings(env_file: Option<&Path>) -> Result<JobSettings, CliError> {
    let mut env = EnvManager::from_process();
    if let Some(path) = env_file {
        env.load_file(path)?;
    }
    for entry in env.describe() {
        debug!(%entry, "Setting from environment");
    }
    Ok(JobSettings::from_env(env.vars())?)
}
