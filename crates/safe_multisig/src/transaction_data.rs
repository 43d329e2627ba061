use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_helpers::{nullable_bytes, u256_dec, u64_loose};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OperationType {
    #[default]
    Call = 0,
    DelegateCall = 1,
}

impl OperationType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<OperationType> for u8 {
    fn from(value: OperationType) -> Self {
        value.as_u8()
    }
}

impl TryFrom<u8> for OperationType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OperationType::Call),
            1 => Ok(OperationType::DelegateCall),
            other => Err(format!("unknown operation {other}")),
        }
    }
}

/// A call the Safe should make, before gas parameters and nonce are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeMetaTransaction {
    pub to: Address,
    #[serde(with = "u256_dec")]
    pub value: U256,
    #[serde(with = "nullable_bytes", default)]
    pub data: Bytes,
    #[serde(default)]
    pub operation: OperationType,
}

/// Every field that goes into the safeTxHash.
///
/// Changing any field after signatures were collected invalidates all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransactionData {
    pub to: Address,
    #[serde(with = "u256_dec")]
    pub value: U256,
    #[serde(with = "nullable_bytes", default)]
    pub data: Bytes,
    pub operation: OperationType,
    #[serde(with = "u256_dec")]
    pub safe_tx_gas: U256,
    #[serde(with = "u256_dec")]
    pub base_gas: U256,
    #[serde(with = "u256_dec")]
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    #[serde(with = "u256_dec")]
    pub nonce: U256,
}

impl SafeTransactionData {
    /// A transaction with no gas refund, paid in the native token.
    pub fn new(meta: SafeMetaTransaction, nonce: U256) -> Self {
        Self {
            to: meta.to,
            value: meta.value,
            data: meta.data,
            operation: meta.operation,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }

    /// The zero-value self call used to cancel whatever else was queued at `nonce`.
    pub fn rejection(safe: Address, nonce: U256) -> Self {
        Self::new(
            SafeMetaTransaction {
                to: safe,
                value: U256::ZERO,
                data: Bytes::new(),
                operation: OperationType::Call,
            },
            nonce,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub owner: Address,
    #[serde(with = "nullable_bytes", default)]
    pub signature: Bytes,
    pub submission_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<String>,
}

/// Safe metadata as reported by the transaction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeInfo {
    pub address: Address,
    #[serde(with = "u256_dec")]
    pub nonce: U256,
    #[serde(deserialize_with = "u64_loose::deserialize")]
    pub threshold: u64,
    pub owners: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SafeInfo {
    pub fn is_owner(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }
}

/// A multisig transaction as tracked by the transaction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigTransaction {
    pub safe: Address,
    #[serde(flatten)]
    pub tx: SafeTransactionData,
    pub safe_tx_hash: B256,
    #[serde(default)]
    pub is_executed: bool,
    #[serde(default)]
    pub is_successful: Option<bool>,
    #[serde(default)]
    pub confirmations_required: Option<u64>,
    #[serde(default)]
    pub confirmations: Vec<Confirmation>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub proposer: Option<Address>,
    #[serde(default)]
    pub submission_date: Option<DateTime<Utc>>,
}

impl MultisigTransaction {
    pub fn nonce(&self) -> U256 {
        self.tx.nonce
    }

    pub fn is_confirmed_by(&self, owner: &Address) -> bool {
        self.confirmations.iter().any(|c| &c.owner == owner)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeTransactionBody {
    #[serde(flatten)]
    pub safe_tx: SafeTransactionData,
    pub contract_transaction_hash: B256,
    pub sender: Address,
    pub signature: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmationBody {
    pub signature: Bytes,
    pub owner: Address,
}

/// Calldata ready to be sent to the Safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableSafeTransaction {
    pub safe_address: Address,
    pub input_data: Bytes,
}
