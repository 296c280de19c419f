use clap::{Args, Subcommand};
use engine_config::settings::{JobSettings, WriteFailurePolicy};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Import a delimited file, then reconcile against the remote feed
    Run {
        #[arg(long, help = "Delimited input file (firstName,lastName,email,age)")]
        source: PathBuf,

        #[arg(long, help = "Discrepancy report to write")]
        output: PathBuf,

        #[arg(long, help = "Resume this run id from its checkpoints")]
        restart: Option<u64>,

        #[command(flatten)]
        overrides: SettingsOverrides,

        #[arg(long, help = "Print the run summary as JSON instead of a table")]
        json: bool,
    },
    /// Show checkpoints and recorded results of a run
    Progress {
        #[arg(long, help = "Run id to inspect; defaults to the latest run")]
        run: Option<u64>,

        #[arg(long, help = "Load BATCH_* settings from this file")]
        env_file: Option<PathBuf>,

        #[arg(long, help = "Directory holding checkpoints and the run log")]
        state_dir: Option<PathBuf>,

        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
    /// Check that the version store and remote feed are reachable
    TestConn {
        #[arg(long, help = "PostgreSQL connection URL")]
        database_url: Option<String>,

        #[arg(long, help = "Base URL of the paginated remote feed")]
        base_url: Option<String>,

        #[arg(long, help = "Load BATCH_* settings from this file")]
        env_file: Option<PathBuf>,
    },
}

/// Command-line values that take precedence over `BATCH_*` settings.
#[derive(Args, Debug, Default)]
pub struct SettingsOverrides {
    #[arg(long, help = "Load BATCH_* settings from this file")]
    pub env_file: Option<PathBuf>,

    #[arg(long)]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "Number of chunk workers")]
    pub threads: Option<usize>,

    #[arg(long, help = "Process one chunk at a time")]
    pub no_concurrency: bool,

    #[arg(long)]
    pub skip_limit: Option<u64>,

    #[arg(long, value_parser = parse_policy, help = "fail | skip")]
    pub write_failure: Option<WriteFailurePolicy>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub page_size: Option<u32>,

    #[arg(long, help = "Import only; skip the reconcile step")]
    pub no_reconcile: bool,

    #[arg(long)]
    pub database_url: Option<String>,

    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    #[arg(long, help = "JSON-lines file receiving skipped items")]
    pub skip_log: Option<PathBuf>,
}

impl SettingsOverrides {
    pub fn apply(self, settings: &mut JobSettings) {
        if let Some(v) = self.chunk_size {
            settings.chunk_size = v;
        }
        if let Some(v) = self.threads {
            settings.concurrency.threads = v;
        }
        if self.no_concurrency {
            settings.concurrency.enabled = false;
        }
        if let Some(v) = self.skip_limit {
            settings.skip_limit = v;
        }
        if let Some(v) = self.write_failure {
            settings.write_failure = v;
        }
        if let Some(v) = self.base_url {
            settings.remote.base_url = Some(v);
        }
        if let Some(v) = self.page_size {
            settings.remote.page_size = v;
        }
        if self.no_reconcile {
            settings.reconcile = false;
        }
        if let Some(v) = self.database_url {
            settings.database_url = Some(v);
        }
        if let Some(v) = self.state_dir {
            settings.state_dir = v;
        }
        if let Some(v) = self.skip_log {
            settings.skip_log_path = Some(v);
        }
    }
}

fn parse_policy(s: &str) -> Result<WriteFailurePolicy, String> {
    s.parse()
}
