use clap::{Parser, Subcommand};
use prettytable::{row, Table};
use safe_cli_runner::CliContext;
use safe_multisig::{SafeConfig, SafeError};
use url::Url;

use std::path::Path;

use crate::{common::SafeCliArgs, utils::print_success_message};

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    #[command(name = "set")]
    Set(SetConfigCommand),

    #[command(name = "show")]
    Show(ShowConfigCommand),
}

#[derive(Debug, Parser)]
#[clap(about = "Store Safe, chain and endpoint settings. Private keys are never stored.")]
pub struct SetConfigCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,
}

impl SetConfigCommand {
    pub async fn execute(self, _ctx: CliContext) -> eyre::Result<()> {
        let path = self.safe.config_path();
        let updated = set_config(&path, self.safe.overrides())?;

        print_success_message(&format!("Saved {}", path.display()));
        config_table(&updated).printstd();
        Ok(())
    }
}

#[derive(Debug, Parser)]
#[clap(about = "Print the stored settings, with any flags applied.")]
pub struct ShowConfigCommand {
    #[clap(flatten)]
    safe: SafeCliArgs,
}

impl ShowConfigCommand {
    pub async fn execute(self, _ctx: CliContext) -> eyre::Result<()> {
        let config = self.safe.load_config()?;
        config_table(&config).printstd();
        Ok(())
    }
}

/// Merges `overrides` into the stored config and writes it back.
pub fn set_config(path: &Path, overrides: SafeConfig) -> eyre::Result<SafeConfig> {
    for url in [&overrides.rpc_url, &overrides.tx_service_url].into_iter().flatten() {
        Url::parse(url)
            .map_err(|e| SafeError::configuration(format!("invalid url {url:?}: {e}")))?;
    }

    let updated = SafeConfig::load(path)?.merge(overrides);
    updated.save(path)?;
    Ok(updated)
}

fn config_table(config: &SafeConfig) -> Table {
    fn or_unset<T: ToString>(value: &Option<T>) -> String {
        value.as_ref().map(T::to_string).unwrap_or_else(|| "-".to_string())
    }

    let mut table = Table::new();
    table.add_row(row!["safe_address", or_unset(&config.safe_address)]);
    table.add_row(row!["chain_id", or_unset(&config.chain_id)]);
    table.add_row(row!["rpc_url", or_unset(&config.rpc_url)]);
    table.add_row(row!["tx_service_url", or_unset(&config.tx_service_url)]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn set_keeps_values_not_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        set_config(
            &path,
            SafeConfig {
                safe_address: Some(address!("5AFE3855358E112B5647B952709E6165E1C1EEEe")),
                chain_id: Some(11155111),
                ..Default::default()
            },
        )
        .unwrap();
        let updated = set_config(
            &path,
            SafeConfig { rpc_url: Some("http://localhost:8545".into()), ..Default::default() },
        )
        .unwrap();

        assert_eq!(updated.chain_id, Some(11155111));
        assert_eq!(SafeConfig::load(&path).unwrap(), updated);
    }

    #[test]
    fn bad_urls_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let res = set_config(
            &path,
            SafeConfig { rpc_url: Some("not a url".into()), ..Default::default() },
        );

        assert!(res.is_err());
        assert!(!path.exists());
    }
}
