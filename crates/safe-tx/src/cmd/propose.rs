use alloy_primitives::{Address, Bytes, U256};
use clap::Parser;
use safe_cli_runner::CliContext;
use safe_multisig::{OperationType, SafeMetaTransaction};

use crate::{
    common::{load_orchestrator, OwnerCliArgs, SafeCliArgs},
    utils::{colored_state, print_loading_until_async, print_success_message},
};

#[derive(Debug, Parser)]
#[clap(about = "Sign a new Safe transaction and post it to the transaction service.")]
pub struct ProposeCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[clap(flatten)]
    owner: OwnerCliArgs,

    #[arg(long, value_name = "ADDRESS", help = "The call target.")]
    to: Address,

    #[arg(long, value_name = "WEI", default_value = "0", help = "Native value to send, in wei.")]
    value: U256,

    #[arg(long, value_name = "HEX", default_value = "0x", help = "Calldata.")]
    data: Bytes,

    #[arg(long, help = "Run the call as a DELEGATECALL from the Safe.")]
    delegate_call: bool,

    #[arg(
        long,
        value_name = "NONCE",
        help = "Safe nonce to use. Defaults to the next free nonce, after any queued transactions."
    )]
    nonce: Option<U256>,
}

impl ProposeCommand {
    pub fn meta(&self) -> SafeMetaTransaction {
        SafeMetaTransaction {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: if self.delegate_call {
                OperationType::DelegateCall
            } else {
                OperationType::Call
            },
        }
    }

    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, Some(&self.owner)).await?;

        let outcome =
            print_loading_until_async("Proposing", orchestrator.propose(self.meta(), self.nonce))
                .await?;

        print_success_message(&format!(
            "Proposed {} at nonce {} ({})",
            outcome.safe_tx_hash,
            outcome.tx.nonce,
            colored_state(&outcome.state)
        ));
        Ok(())
    }
}
