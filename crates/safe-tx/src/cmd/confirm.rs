use alloy_primitives::B256;
use clap::Parser;
use safe_cli_runner::CliContext;

use crate::{
    common::{load_orchestrator, OwnerCliArgs, SafeCliArgs},
    utils::{print_loading_until_async, print_success_message, status_table},
};

#[derive(Debug, Parser)]
#[clap(about = "Add your confirmation to a pending Safe transaction.")]
pub struct ConfirmCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[clap(flatten)]
    owner: OwnerCliArgs,

    #[arg(value_name = "SAFE_TX_HASH", help = "The safeTxHash to confirm.")]
    safe_tx_hash: B256,
}

impl ConfirmCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, Some(&self.owner)).await?;

        let status =
            print_loading_until_async("Confirming", orchestrator.confirm(self.safe_tx_hash)).await?;

        print_success_message(&format!(
            "Confirmed {} ({}/{})",
            status.safe_tx_hash, status.confirmations, status.threshold
        ));
        status_table(&status).printstd();
        Ok(())
    }
}
