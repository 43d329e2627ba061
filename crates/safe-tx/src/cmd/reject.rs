use alloy_primitives::U256;
use clap::Parser;
use safe_cli_runner::CliContext;

use crate::{
    common::{load_orchestrator, OwnerCliArgs, SafeCliArgs},
    utils::{print_loading_until_async, print_success_message},
};

#[derive(Debug, Parser)]
#[clap(about = "Propose the empty transaction that cancels whatever is queued at a nonce.")]
pub struct RejectCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[clap(flatten)]
    owner: OwnerCliArgs,

    #[arg(long, value_name = "NONCE", help = "The nonce to reject.")]
    nonce: U256,
}

impl RejectCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, Some(&self.owner)).await?;

        let outcome =
            print_loading_until_async("Proposing rejection", orchestrator.propose_rejection(self.nonce))
                .await?;

        print_success_message(&format!(
            "Proposed rejection {} for nonce {}",
            outcome.safe_tx_hash, outcome.tx.nonce
        ));
        Ok(())
    }
}
