//! Safe multisig transaction lifecycle: hashing, signature aggregation,
//! transaction service access and on-chain execution.

pub mod calls;
pub mod client;
pub mod config;
pub mod consts;
pub mod context;
pub mod contracts;
pub mod eip712;
pub mod error;
pub mod hash;
pub mod lifecycle;
pub mod orchestrator;
pub mod poller;
pub mod signatures;
pub mod signer;
pub mod transaction_data;

mod serde_helpers;

#[cfg(test)]
mod test_utils;

pub use calls::{http_chain, ExecutionReceipt, RpcChain, SafeChain};
pub use client::{PagedList, SafeClient, TransactionService};
pub use config::{ResolvedConfig, SafeConfig};
pub use context::AppContext;
pub use error::{HashSource, Result, SafeError};
pub use lifecycle::{TxEvent, TxState};
pub use orchestrator::{
    ExecutionOutcome, ProposalOutcome, SafeOrchestrator, SafeOverview, TransactionStatus,
};
pub use signer::{signer_from_private_key, SafeSigner};
pub use transaction_data::{OperationType, SafeMetaTransaction, SafeTransactionData};
