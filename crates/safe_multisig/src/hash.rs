//! safeTxHash computation.
//!
//! Produces exactly what the Safe contract's `getTransactionHash` returns:
//!
//! ```text
//! keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ keccak256(SAFE_TX_TYPEHASH ‖ to ‖ value ‖
//!     keccak256(data) ‖ operation ‖ safeTxGas ‖ baseGas ‖ gasPrice ‖ gasToken ‖
//!     refundReceiver ‖ nonce))
//! ```

use alloy_primitives::{keccak256, Address, B256, U256};
use tracing::warn;

use crate::{
    eip712::SafeTypeHashes,
    error::{HashSource, Result, SafeError},
    transaction_data::SafeTransactionData,
};

/// Encodes values as 32-byte ABI words.
struct WordEncoder(Vec<u8>);

impl WordEncoder {
    fn with_words(words: usize) -> Self {
        Self(Vec::with_capacity(words * 32))
    }

    fn word(mut self, word: B256) -> Self {
        self.0.extend_from_slice(word.as_slice());
        self
    }

    fn uint(mut self, value: U256) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes::<32>());
        self
    }

    fn address(mut self, address: Address) -> Self {
        self.0.extend_from_slice(address.into_word().as_slice());
        self
    }

    fn finish(self) -> B256 {
        keccak256(&self.0)
    }
}

/// `keccak256(DOMAIN_TYPEHASH ‖ [chainId ‖] safe)`
pub fn domain_separator(safe_address: Address, chain_id: u64, type_hashes: &SafeTypeHashes) -> B256 {
    let encoder = WordEncoder::with_words(3).word(type_hashes.domain);
    let encoder = if type_hashes.domain_has_chain_id {
        encoder.uint(U256::from(chain_id))
    } else {
        encoder
    };
    encoder.address(safe_address).finish()
}

/// `hashStruct(SafeTx)`
pub fn safe_tx_struct_hash(tx: &SafeTransactionData, type_hashes: &SafeTypeHashes) -> B256 {
    WordEncoder::with_words(11)
        .word(type_hashes.safe_tx)
        .address(tx.to)
        .uint(tx.value)
        .word(keccak256(&tx.data))
        .uint(U256::from(tx.operation.as_u8()))
        .uint(tx.safe_tx_gas)
        .uint(tx.base_gas)
        .uint(tx.gas_price)
        .address(tx.gas_token)
        .address(tx.refund_receiver)
        .uint(tx.nonce)
        .finish()
}

pub fn compute_safe_tx_hash(
    tx: &SafeTransactionData,
    safe_address: Address,
    chain_id: u64,
    type_hashes: &SafeTypeHashes,
) -> B256 {
    let domain = domain_separator(safe_address, chain_id, type_hashes);
    let struct_hash = safe_tx_struct_hash(tx, type_hashes);

    let mut digest_input = [0u8; 66];
    digest_input[0] = 0x19;
    digest_input[1] = 0x01;
    digest_input[2..34].copy_from_slice(domain.as_slice());
    digest_input[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(digest_input)
}

/// Fails with [`SafeError::HashMismatch`] unless `reported` equals the locally computed hash.
///
/// The reported value is never used in place of the local one.
pub fn verify_safe_tx_hash(local: B256, reported: B256, origin: HashSource) -> Result<B256> {
    if local != reported {
        warn!(%local, %reported, %origin, "safeTxHash mismatch");
        return Err(SafeError::HashMismatch { local, reported, origin });
    }
    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction_data::{OperationType, SafeMetaTransaction};
    use alloy_primitives::{address, hex, Bytes};
    use alloy_sol_types::{eip712_domain, sol, SolStruct};

    sol! {
        struct SafeTx {
            address to;
            uint256 value;
            bytes data;
            uint8 operation;
            uint256 safeTxGas;
            uint256 baseGas;
            uint256 gasPrice;
            address gasToken;
            address refundReceiver;
            uint256 nonce;
        }
    }

    const SAFE: Address = address!("5AFE3855358E112B5647B952709E6165E1C1EEEe");

    fn sample_tx() -> SafeTransactionData {
        SafeTransactionData {
            to: address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"),
            value: U256::from(1_000_000_000_000_000u64),
            data: Bytes::from(hex!("a9059cbb000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045")),
            operation: OperationType::Call,
            safe_tx_gas: U256::from(100_000),
            base_gas: U256::from(21_000),
            gas_price: U256::from(3),
            gas_token: Address::ZERO,
            refund_receiver: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            nonce: U256::from(5),
        }
    }

    #[test]
    fn matches_alloy_eip712_signing_hash() {
        let tx = sample_tx();
        let sol_tx = SafeTx {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.as_u8(),
            safeTxGas: tx.safe_tx_gas,
            baseGas: tx.base_gas,
            gasPrice: tx.gas_price,
            gasToken: tx.gas_token,
            refundReceiver: tx.refund_receiver,
            nonce: tx.nonce,
        };
        let domain = eip712_domain! {
            chain_id: 11155111,
            verifying_contract: SAFE,
        };

        let local = compute_safe_tx_hash(&tx, SAFE, 11155111, &SafeTypeHashes::default());
        assert_eq!(local, sol_tx.eip712_signing_hash(&domain));
        assert_eq!(
            safe_tx_struct_hash(&tx, &SafeTypeHashes::default()),
            sol_tx.eip712_hash_struct()
        );
    }

    #[test]
    fn deterministic() {
        let hashes = SafeTypeHashes::default();
        let a = compute_safe_tx_hash(&sample_tx(), SAFE, 1, &hashes);
        let b = compute_safe_tx_hash(&sample_tx(), SAFE, 1, &hashes);
        assert_eq!(a, b);
    }

    #[test]
    fn every_field_changes_the_digest() {
        let hashes = SafeTypeHashes::default();
        let base = compute_safe_tx_hash(&sample_tx(), SAFE, 1, &hashes);

        let mutations: Vec<Box<dyn Fn(&mut SafeTransactionData)>> = vec![
            Box::new(|tx| tx.to = Address::repeat_byte(0x01)),
            Box::new(|tx| tx.value += U256::from(1)),
            Box::new(|tx| tx.data = Bytes::from(vec![0xde, 0xad])),
            Box::new(|tx| tx.operation = OperationType::DelegateCall),
            Box::new(|tx| tx.safe_tx_gas += U256::from(1)),
            Box::new(|tx| tx.base_gas += U256::from(1)),
            Box::new(|tx| tx.gas_price += U256::from(1)),
            Box::new(|tx| tx.gas_token = Address::repeat_byte(0x02)),
            Box::new(|tx| tx.refund_receiver = Address::ZERO),
            Box::new(|tx| tx.nonce += U256::from(1)),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            let mut tx = sample_tx();
            mutate(&mut tx);
            assert_ne!(compute_safe_tx_hash(&tx, SAFE, 1, &hashes), base, "field #{i}");
        }

        assert_ne!(compute_safe_tx_hash(&sample_tx(), SAFE, 5, &hashes), base);
        assert_ne!(
            compute_safe_tx_hash(&sample_tx(), Address::repeat_byte(0x03), 1, &hashes),
            base
        );
    }

    #[test]
    fn legacy_domain_ignores_chain_id() {
        let hashes = SafeTypeHashes::for_version_str("1.2.0").unwrap();
        let tx = SafeTransactionData::new(
            SafeMetaTransaction {
                to: SAFE,
                value: U256::ZERO,
                data: Bytes::new(),
                operation: OperationType::Call,
            },
            U256::ZERO,
        );
        assert_eq!(
            compute_safe_tx_hash(&tx, SAFE, 1, &hashes),
            compute_safe_tx_hash(&tx, SAFE, 100, &hashes)
        );
        assert_ne!(
            compute_safe_tx_hash(&tx, SAFE, 1, &hashes),
            compute_safe_tx_hash(&tx, SAFE, 1, &SafeTypeHashes::default())
        );
    }

    #[test]
    fn mismatch_fails_loudly() {
        let local = B256::repeat_byte(0xaa);
        assert_eq!(verify_safe_tx_hash(local, local, HashSource::Relay).unwrap(), local);
        let err = verify_safe_tx_hash(local, B256::repeat_byte(0xbb), HashSource::Contract)
            .unwrap_err();
        assert!(matches!(
            err,
            SafeError::HashMismatch { origin: HashSource::Contract, .. }
        ));
    }
}
