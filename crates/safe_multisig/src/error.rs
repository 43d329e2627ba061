use alloy_primitives::{B256, U256};

use std::time::Duration;

use crate::lifecycle::{TxEvent, TxState};

pub type Result<T, E = SafeError> = std::result::Result<T, E>;

/// Where a hash that disagrees with the locally computed one came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSource {
    Relay,
    Contract,
}

impl std::fmt::Display for HashSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashSource::Relay => f.write_str("transaction service"),
            HashSource::Contract => f.write_str("safe contract"),
        }
    }
}

/// Errors raised while building, confirming or executing a Safe transaction.
#[derive(Debug, thiserror::Error)]
pub enum SafeError {
    /// Missing or malformed address, key or URL. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transaction service answered with a non-2xx status. `body` is verbatim.
    #[error("transaction service returned {status}: {body}")]
    Relay { status: u16, body: String },

    #[error("transaction service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode transaction service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("safeTxHash mismatch: computed {local}, {origin} reported {reported}")]
    HashMismatch { local: B256, reported: B256, origin: HashSource },

    #[error("not enough valid signatures: have {have}, need {need}")]
    InsufficientSignatures { have: usize, need: usize },

    #[error("chain error: {0}")]
    Chain(String),

    #[error("transaction nonce {tx} does not match the safe nonce {onchain}")]
    StaleNonce { tx: U256, onchain: U256 },

    #[error("no receipt after {}s", .0.as_secs())]
    ReceiptTimeout(Duration),

    #[error("failed to sign safe transaction: {0}")]
    Signing(String),

    #[error("transaction {0} is already executed")]
    AlreadyExecuted(B256),

    #[error("transaction {0} is already confirmed by this owner")]
    AlreadyConfirmed(B256),

    #[error("invalid state transition from {from:?} on {event:?}")]
    InvalidTransition { from: TxState, event: TxEvent },
}

impl SafeError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        SafeError::Configuration(msg.into())
    }

    pub fn chain(err: impl std::fmt::Display) -> Self {
        SafeError::Chain(err.to_string())
    }

    /// `AlreadyExecuted` and `AlreadyConfirmed` are outcomes other owners raced us to, not failures.
    pub fn is_benign(&self) -> bool {
        matches!(self, SafeError::AlreadyExecuted(_) | SafeError::AlreadyConfirmed(_))
    }

    /// Network level failures which should not stop a polling loop.
    pub fn is_transient(&self) -> bool {
        match self {
            SafeError::Http(_) => true,
            SafeError::Relay { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
