use urls::{arbitrum, base, gnosis, mainnet, optimism, polygon, sepolia};

use std::time::Duration;

use crate::error::{Result, SafeError};

pub mod urls {
    pub mod mainnet {
        pub const CHAIN_ID: u64 = 1;

        pub const TRANSACTION_SERVICE_URL: &str =
            "https://safe-transaction-mainnet.safe.global/api";
    }

    pub mod optimism {
        pub const CHAIN_ID: u64 = 10;

        pub const TRANSACTION_SERVICE_URL: &str =
            "https://safe-transaction-optimism.safe.global/api";
    }

    pub mod gnosis {
        pub const CHAIN_ID: u64 = 100;

        pub const TRANSACTION_SERVICE_URL: &str =
            "https://safe-transaction-gnosis-chain.safe.global/api";
    }

    pub mod polygon {
        pub const CHAIN_ID: u64 = 137;

        pub const TRANSACTION_SERVICE_URL: &str =
            "https://safe-transaction-polygon.safe.global/api";
    }

    pub mod base {
        pub const CHAIN_ID: u64 = 8453;

        pub const TRANSACTION_SERVICE_URL: &str = "https://safe-transaction-base.safe.global/api";
    }

    pub mod arbitrum {
        pub const CHAIN_ID: u64 = 42161;

        pub const TRANSACTION_SERVICE_URL: &str =
            "https://safe-transaction-arbitrum.safe.global/api";
    }

    pub mod sepolia {
        pub const CHAIN_ID: u64 = 11155111;

        pub const TRANSACTION_SERVICE_URL: &str =
            "https://safe-transaction-sepolia.safe.global/api";
    }
}

/// Gas limit used for `execTransaction` when estimation fails.
pub const FALLBACK_GAS_LIMIT: u64 = 500_000;

/// Safety margin added on top of a successful gas estimate, in percent.
pub const GAS_MARGIN_PERCENT: u64 = 20;

pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for any receipt wait, whatever the caller asks for.
pub const MAX_RECEIPT_TIMEOUT: Duration = Duration::from_secs(600);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Safe version assumed when the contract does not tell us.
pub const DEFAULT_SAFE_VERSION: &str = "1.3.0";

pub fn get_transaction_service_url(chain_id: u64) -> Result<String> {
    match chain_id {
        mainnet::CHAIN_ID => Ok(mainnet::TRANSACTION_SERVICE_URL.to_string()),
        optimism::CHAIN_ID => Ok(optimism::TRANSACTION_SERVICE_URL.to_string()),
        gnosis::CHAIN_ID => Ok(gnosis::TRANSACTION_SERVICE_URL.to_string()),
        polygon::CHAIN_ID => Ok(polygon::TRANSACTION_SERVICE_URL.to_string()),
        base::CHAIN_ID => Ok(base::TRANSACTION_SERVICE_URL.to_string()),
        arbitrum::CHAIN_ID => Ok(arbitrum::TRANSACTION_SERVICE_URL.to_string()),
        sepolia::CHAIN_ID => Ok(sepolia::TRANSACTION_SERVICE_URL.to_string()),
        _ => Err(SafeError::configuration(format!(
            "no transaction service known for chain {chain_id}, pass one explicitly"
        ))),
    }
}

/// Clamps a requested receipt timeout to [`MAX_RECEIPT_TIMEOUT`].
pub fn receipt_timeout(requested: Option<Duration>) -> Duration {
    requested.unwrap_or(DEFAULT_RECEIPT_TIMEOUT).min(MAX_RECEIPT_TIMEOUT)
}

/// Applies [`GAS_MARGIN_PERCENT`] to an estimate.
pub fn with_gas_margin(estimate: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(GAS_MARGIN_PERCENT) / 100)
}
