//! Entrypoint for running CLI commands on a tokio runtime until they finish or
//! the user hits ctrl-c.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use std::{future::Future, time::Duration};

/// How long a command may keep running after ctrl-c before it is dropped.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes CLI commands.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct CliRunner;

impl CliRunner {
    /// Executes the given _async_ command on the tokio runtime until the command
    /// future resolves or ctrl-c is received.
    ///
    /// On ctrl-c the [`CliContext::shutdown`] token is cancelled and the command
    /// is given a short grace period to wind down.
    pub fn run_command_until_exit<F, E>(
        self,
        command: impl FnOnce(CliContext) -> F,
    ) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
        E: From<std::io::Error> + 'static,
    {
        let tokio_runtime = tokio_runtime()?;
        let shutdown = CancellationToken::new();
        let context = CliContext { shutdown: shutdown.clone() };

        tokio_runtime.block_on(run_until_ctrl_c(command(context), shutdown))
    }

    /// Executes a regular future until completion or until ctrl-c is received.
    pub fn run_until_ctrl_c<F, E>(self, fut: F) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
        E: From<std::io::Error> + 'static,
    {
        let tokio_runtime = tokio_runtime()?;
        tokio_runtime.block_on(run_until_ctrl_c(fut, CancellationToken::new()))
    }
}

/// Additional context provided by the [`CliRunner`] when executing commands.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Cancelled once the user asked the process to stop.
    pub shutdown: CancellationToken,
}

/// Creates a new default tokio multi-thread runtime with all features enabled.
pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

async fn run_until_ctrl_c<F, E>(fut: F, shutdown: CancellationToken) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: From<std::io::Error> + 'static,
{
    tokio::pin!(fut);

    tokio::select! {
        res = &mut fut => return res,
        res = tokio::signal::ctrl_c() => {
            res?;
            warn!("Received ctrl-c, shutting down");
        }
    }

    wind_down(fut, shutdown).await
}

/// Cancels `shutdown` and waits for `fut` to finish. A command still running
/// after the grace period is dropped and reported as interrupted.
async fn wind_down<F, E>(fut: F, shutdown: CancellationToken) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: From<std::io::Error> + 'static,
{
    shutdown.cancel();
    match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, fut).await {
        Ok(res) => res,
        Err(_) => {
            debug!("Command did not stop in time, dropping it");
            Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "command interrupted before it finished",
            )
            .into())
        }
    }
}
