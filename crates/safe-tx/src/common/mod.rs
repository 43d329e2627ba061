use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use clap::{value_parser, Parser};
use safe_cli_runner::CliContext;
use safe_multisig::{signer_from_private_key, AppContext, SafeConfig, SafeOrchestrator};
use tracing::debug;

use std::{path::PathBuf, time::Duration};

use crate::utils::print_loading_until_async;

pub const PRIVATE_KEY_ENV: &str = "SAFE_TX_PRIVATE_KEY";

/// Where the Safe lives. Flags override the config file.
#[derive(Debug, Parser, Clone, Default)]
pub struct SafeCliArgs {
    #[arg(
        long,
        value_name = "PATH",
        value_parser = value_parser!(PathBuf),
        help = "Path to the config file. Defaults to home_dir/.safe-tx/config.json if the home dir \
                    is available, otherwise it defaults to `./.safe-tx/config.json`."
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "ADDRESS", help = "The Safe to operate on.")]
    pub safe: Option<Address>,

    #[arg(long, value_name = "CHAIN_ID", help = "The chain the Safe is deployed on.")]
    pub chain_id: Option<u64>,

    #[arg(long, value_name = "URL", help = "JSON-RPC endpoint of the chain.")]
    pub rpc_url: Option<String>,

    #[arg(
        long,
        value_name = "URL",
        help = "Base URL of the Safe Transaction Service. Derived from the chain id if not set."
    )]
    pub tx_service_url: Option<String>,
}

impl SafeCliArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(SafeConfig::default_path)
    }

    pub fn overrides(&self) -> SafeConfig {
        SafeConfig {
            tx_service_url: self.tx_service_url.clone(),
            rpc_url: self.rpc_url.clone(),
            safe_address: self.safe,
            chain_id: self.chain_id,
        }
    }

    /// The stored config with the flags applied on top.
    pub fn load_config(&self) -> eyre::Result<SafeConfig> {
        let stored = SafeConfig::load(self.config_path())?;
        Ok(stored.merge(self.overrides()))
    }
}

/// The owner key. Never written to disk.
#[derive(Debug, Parser, Clone, Default)]
pub struct OwnerCliArgs {
    #[arg(
        long,
        value_name = "HEX",
        env = PRIVATE_KEY_ENV,
        hide_env_values = true,
        help = "Private key of a Safe owner. Prompted for if not given."
    )]
    pub private_key: Option<String>,

    #[arg(
        long,
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        help = "How long to wait for the execution receipt, e.g. `90s`. Capped at 10 minutes."
    )]
    pub receipt_timeout: Option<Duration>,
}

impl OwnerCliArgs {
    pub fn signer(&self) -> eyre::Result<PrivateKeySigner> {
        let key = match &self.private_key {
            Some(key) => key.clone(),
            None => rpassword::prompt_password_stdout("Owner private key: ")?,
        };
        Ok(signer_from_private_key(key.trim())?)
    }
}

/// Resolves the config, wires the collaborators and initialises an orchestrator
/// which is disposed when the user hits ctrl-c.
pub async fn load_orchestrator(
    ctx: &CliContext,
    safe: &SafeCliArgs,
    owner: Option<&OwnerCliArgs>,
) -> eyre::Result<SafeOrchestrator> {
    let config = safe.load_config()?.resolve()?;
    let signer = owner.map(OwnerCliArgs::signer).transpose()?;
    if let Some(signer) = &signer {
        debug!(owner = %signer.address(), "loaded owner key");
    }

    let receipt_timeout = owner.and_then(|owner| owner.receipt_timeout);
    let app = AppContext::from_config(&config, signer)?
        .with_receipt_timeout(receipt_timeout)
        .with_parent_token(&ctx.shutdown);

    let orchestrator =
        print_loading_until_async("Loading Safe", SafeOrchestrator::init(app)).await?;
    Ok(orchestrator)
}
