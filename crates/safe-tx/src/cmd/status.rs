use alloy_primitives::B256;
use clap::Parser;
use safe_cli_runner::CliContext;

use crate::{
    common::{load_orchestrator, SafeCliArgs},
    utils::{print_loading_until_async, status_table},
};

#[derive(Debug, Parser)]
#[clap(about = "Show the confirmations and lifecycle state of a Safe transaction.")]
pub struct StatusCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[arg(value_name = "SAFE_TX_HASH", help = "The safeTxHash to look up.")]
    safe_tx_hash: B256,

    #[arg(long, help = "Print JSON instead of a table.")]
    json: bool,
}

impl StatusCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, None).await?;

        let status =
            print_loading_until_async("Loading transaction", orchestrator.status(self.safe_tx_hash))
                .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            status_table(&status).printstd();
        }
        Ok(())
    }
}
