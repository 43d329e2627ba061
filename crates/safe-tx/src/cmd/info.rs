use clap::Parser;
use safe_cli_runner::CliContext;

use crate::{
    common::{load_orchestrator, SafeCliArgs},
    utils::{overview_table, print_loading_until_async},
};

#[derive(Debug, Parser)]
#[clap(about = "Show owners, threshold, nonce and balance of the Safe.")]
pub struct InfoCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,
}

impl InfoCommand {
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let orchestrator = load_orchestrator(&ctx, &self.safe, None).await?;

        let overview = print_loading_until_async("Loading Safe info", orchestrator.info()).await?;
        overview_table(&overview).printstd();
        Ok(())
    }
}
