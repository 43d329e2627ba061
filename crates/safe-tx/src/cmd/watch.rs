use clap::Parser;
use colored::Colorize;
use safe_cli_runner::CliContext;
use safe_multisig::{consts::DEFAULT_POLL_INTERVAL, poller::interval_ticker};
use tracing::info;

use std::time::Duration;

use crate::{
    common::{load_orchestrator, SafeCliArgs},
    utils::{colored_state, short_hash},
};

#[derive(Debug, Parser)]
#[clap(about = "Poll the transaction queue until ctrl-c.")]
pub struct WatchCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[arg(
        long,
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        help = "Time between polls, e.g. `30s`. Defaults to 15s."
    )]
    interval: Option<Duration>,
}

impl WatchCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, None).await?;

        let interval = self.interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        let (ticker, ticker_fut) = interval_ticker(interval);
        tokio::spawn(ticker_fut);

        info!(safe = %orchestrator.context().safe_address, ?interval, "watching queue");
        orchestrator
            .watch(ticker, |round, statuses| {
                println!("{}", format!("round {round}: {} pending", statuses.len()).bold());
                for status in statuses {
                    println!(
                        "  #{} {} {}/{} {}",
                        status.nonce,
                        short_hash(&status.safe_tx_hash),
                        status.confirmations,
                        status.threshold,
                        colored_state(&status.state)
                    );
                }
            })
            .await?;

        orchestrator.dispose();
        Ok(())
    }
}
