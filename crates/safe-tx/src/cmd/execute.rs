use alloy_primitives::B256;
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm};
use safe_cli_runner::CliContext;

use crate::{
    common::{load_orchestrator, OwnerCliArgs, SafeCliArgs},
    utils::{print_loading_until_async, print_success_message, print_warning_message, status_table},
};

#[derive(Debug, Parser)]
#[clap(about = "Submit a fully confirmed Safe transaction on-chain.")]
pub struct ExecuteCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[clap(flatten)]
    owner: OwnerCliArgs,

    #[arg(value_name = "SAFE_TX_HASH", help = "The safeTxHash to execute.")]
    safe_tx_hash: B256,

    #[arg(long, short, help = "Skip the confirmation prompt.")]
    yes: bool,
}

impl ExecuteCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, Some(&self.owner)).await?;

        let status =
            print_loading_until_async("Loading transaction", orchestrator.status(self.safe_tx_hash))
                .await?;
        status_table(&status).printstd();

        if !self.yes {
            let proceed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Submit execTransaction from your account?")
                .default(false)
                .interact()?;
            if !proceed {
                print_warning_message("Aborted");
                return Ok(());
            }
        }

        let outcome =
            print_loading_until_async("Executing", orchestrator.execute(self.safe_tx_hash)).await?;

        if !outcome.gas_estimated {
            print_warning_message(&format!(
                "Gas estimation failed, used a fixed gas limit of {}",
                outcome.gas_limit
            ));
        }
        print_success_message(&format!(
            "Executed {} in {}",
            outcome.safe_tx_hash, outcome.transaction_hash
        ));
        Ok(())
    }
}
