use clap::Parser;
use safe_cli_runner::CliContext;

use crate::{
    common::{load_orchestrator, SafeCliArgs},
    utils::{pending_table, print_loading_until_async, print_warning_message},
};

#[derive(Debug, Parser)]
#[clap(about = "List the queued transactions of the Safe, lowest nonce first.")]
pub struct PendingCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,

    #[arg(long, help = "Print JSON instead of a table.")]
    json: bool,
}

impl PendingCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, None).await?;

        let statuses =
            print_loading_until_async("Loading queue", orchestrator.pending()).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        } else if statuses.is_empty() {
            print_warning_message("No pending transactions");
        } else {
            pending_table(&statuses).printstd();
        }
        Ok(())
    }
}
