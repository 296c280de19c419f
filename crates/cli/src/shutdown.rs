use model::execution::result::JobStatus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Cancels `token` on the first SIGINT or SIGTERM. Chunks already running
/// finish and checkpoint; no new chunk starts.
pub fn register_handlers(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to install SIGINT handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => warn!("Received SIGINT, finishing in-flight chunks"),
            _ = terminate => warn!("Received SIGTERM, finishing in-flight chunks"),
        }
        token.cancel();
    });
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failed = 1,
    Stopped = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<JobStatus> for ExitCode {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Completed => ExitCode::Success,
            JobStatus::Failed => ExitCode::Failed,
            JobStatus::Stopped => ExitCode::Stopped,
        }
    }
}
