//! Owner signature parsing, verification and packing.
//!
//! The Safe contract walks the signature blob in 65-byte steps and requires the
//! recovered owners to be strictly ascending, so the blob is always built from
//! signatures sorted by owner address. Contract signatures (EIP-1271) carry a
//! dynamic part which is appended after all static parts.

use alloy_primitives::{eip191_hash_message, Address, Bytes, PrimitiveSignature, B256, U256};
use tracing::{debug, warn};

use std::collections::BTreeMap;

use crate::{
    error::{Result, SafeError},
    transaction_data::Confirmation,
};

pub const SIGNATURE_LENGTH: usize = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// ECDSA over the safeTxHash, `v` in {27, 28}.
    Ecdsa,
    /// ECDSA over the EIP-191 prefixed safeTxHash, `v` in {31, 32}.
    EthSign,
    /// Hash approved on-chain through `approveHash`, `v` = 1.
    ApprovedHash,
    /// EIP-1271 contract signature, `v` = 0.
    Contract,
}

/// Why a confirmation did not make it into the signature blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("confirmation has no owner")]
    MissingOwner,
    #[error("unexpected signature length {0}")]
    BadLength(usize),
    #[error("unknown signature type v={0}")]
    UnknownType(u8),
    #[error("signature recovers to {0}")]
    SignerMismatch(Address),
    #[error("signature cannot be recovered: {0}")]
    Unrecoverable(String),
    #[error("malformed contract signature")]
    MalformedContractSignature,
    #[error("not an owner of the safe")]
    NotOwner,
}

/// A verified owner signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeSignature {
    Ecdsa { owner: Address, bytes: [u8; SIGNATURE_LENGTH] },
    EthSign { owner: Address, bytes: [u8; SIGNATURE_LENGTH] },
    ApprovedHash { owner: Address },
    Contract { owner: Address, data: Bytes },
}

impl SafeSignature {
    /// Classifies `raw` by its `v` byte and checks it belongs to `owner` for `safe_tx_hash`.
    pub fn parse(
        owner: Address,
        raw: &[u8],
        safe_tx_hash: B256,
    ) -> std::result::Result<Self, RejectReason> {
        if owner == Address::ZERO {
            return Err(RejectReason::MissingOwner);
        }
        if raw.len() < SIGNATURE_LENGTH {
            return Err(RejectReason::BadLength(raw.len()));
        }

        let v = raw[64];
        match v {
            0 => parse_contract_signature(owner, raw),
            _ if raw.len() != SIGNATURE_LENGTH => Err(RejectReason::BadLength(raw.len())),
            1 => {
                let approver = Address::from_word(B256::from_slice(&raw[..32]));
                if approver != owner {
                    return Err(RejectReason::SignerMismatch(approver));
                }
                Ok(SafeSignature::ApprovedHash { owner })
            }
            27 | 28 => {
                let recovered = recover(raw, v, &safe_tx_hash)?;
                check_signer(owner, recovered)?;
                Ok(SafeSignature::Ecdsa { owner, bytes: fixed(raw) })
            }
            31 | 32 => {
                let prefixed = eip191_hash_message(safe_tx_hash);
                let recovered = recover(raw, v - 4, &prefixed)?;
                check_signer(owner, recovered)?;
                Ok(SafeSignature::EthSign { owner, bytes: fixed(raw) })
            }
            other => Err(RejectReason::UnknownType(other)),
        }
    }

    pub fn owner(&self) -> Address {
        match self {
            SafeSignature::Ecdsa { owner, .. }
            | SafeSignature::EthSign { owner, .. }
            | SafeSignature::ApprovedHash { owner }
            | SafeSignature::Contract { owner, .. } => *owner,
        }
    }

    pub fn kind(&self) -> SignatureKind {
        match self {
            SafeSignature::Ecdsa { .. } => SignatureKind::Ecdsa,
            SafeSignature::EthSign { .. } => SignatureKind::EthSign,
            SafeSignature::ApprovedHash { .. } => SignatureKind::ApprovedHash,
            SafeSignature::Contract { .. } => SignatureKind::Contract,
        }
    }

    /// The 65-byte slot of this signature; `dynamic_offset` is only used by contract signatures.
    fn static_part(&self, dynamic_offset: usize) -> [u8; SIGNATURE_LENGTH] {
        match self {
            SafeSignature::Ecdsa { bytes, .. } | SafeSignature::EthSign { bytes, .. } => *bytes,
            SafeSignature::ApprovedHash { owner } => {
                let mut out = [0u8; SIGNATURE_LENGTH];
                out[..32].copy_from_slice(owner.into_word().as_slice());
                out[64] = 1;
                out
            }
            SafeSignature::Contract { owner, .. } => {
                let mut out = [0u8; SIGNATURE_LENGTH];
                out[..32].copy_from_slice(owner.into_word().as_slice());
                out[32..64].copy_from_slice(&U256::from(dynamic_offset).to_be_bytes::<32>());
                out
            }
        }
    }

    /// `len ‖ data` for contract signatures.
    fn dynamic_part(&self) -> Option<Vec<u8>> {
        match self {
            SafeSignature::Contract { data, .. } => {
                let mut out = Vec::with_capacity(32 + data.len());
                out.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
                out.extend_from_slice(data);
                Some(out)
            }
            _ => None,
        }
    }
}

fn fixed(raw: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    let mut out = [0u8; SIGNATURE_LENGTH];
    out.copy_from_slice(&raw[..SIGNATURE_LENGTH]);
    out
}

fn recover(raw: &[u8], v: u8, prehash: &B256) -> std::result::Result<Address, RejectReason> {
    let r = U256::from_be_slice(&raw[..32]);
    let s = U256::from_be_slice(&raw[32..64]);
    PrimitiveSignature::new(r, s, v == 28)
        .recover_address_from_prehash(prehash)
        .map_err(|e| RejectReason::Unrecoverable(e.to_string()))
}

fn check_signer(owner: Address, recovered: Address) -> std::result::Result<(), RejectReason> {
    if recovered == owner {
        Ok(())
    } else {
        Err(RejectReason::SignerMismatch(recovered))
    }
}

fn parse_contract_signature(
    owner: Address,
    raw: &[u8],
) -> std::result::Result<SafeSignature, RejectReason> {
    let verifier = Address::from_word(B256::from_slice(&raw[..32]));
    if verifier != owner {
        return Err(RejectReason::SignerMismatch(verifier));
    }

    let offset: usize = U256::from_be_slice(&raw[32..64])
        .try_into()
        .map_err(|_| RejectReason::MalformedContractSignature)?;
    let data_start = offset.checked_add(32).ok_or(RejectReason::MalformedContractSignature)?;
    if offset < SIGNATURE_LENGTH || data_start > raw.len() {
        return Err(RejectReason::MalformedContractSignature);
    }
    let len: usize = U256::from_be_slice(&raw[offset..data_start])
        .try_into()
        .map_err(|_| RejectReason::MalformedContractSignature)?;
    let data_end = data_start.checked_add(len).ok_or(RejectReason::MalformedContractSignature)?;
    if data_end > raw.len() {
        return Err(RejectReason::MalformedContractSignature);
    }

    Ok(SafeSignature::Contract { owner, data: Bytes::copy_from_slice(&raw[data_start..data_end]) })
}

/// Valid owner signatures keyed (and therefore sorted) by owner, plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct CollectedSignatures {
    pub accepted: BTreeMap<Address, SafeSignature>,
    pub rejected: Vec<(Address, RejectReason)>,
}

impl CollectedSignatures {
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn contains(&self, owner: &Address) -> bool {
        self.accepted.contains_key(owner)
    }
}

/// Parses and verifies every confirmation against `safe_tx_hash` and `owners`.
///
/// Duplicate owners are resolved last-write-wins in input order. Rejected
/// confirmations are logged and reported, never fatal.
pub fn collect_signatures(
    confirmations: &[Confirmation],
    safe_tx_hash: B256,
    owners: &[Address],
) -> CollectedSignatures {
    let mut collected = CollectedSignatures::default();

    for confirmation in confirmations {
        let owner = confirmation.owner;
        let parsed = SafeSignature::parse(owner, &confirmation.signature, safe_tx_hash)
            .and_then(|sig| if owners.contains(&owner) { Ok(sig) } else { Err(RejectReason::NotOwner) });

        match parsed {
            Ok(signature) => {
                if collected.accepted.insert(owner, signature).is_some() {
                    debug!(%owner, "duplicate confirmation, keeping the latest");
                }
            }
            Err(reason) => {
                warn!(%owner, %safe_tx_hash, %reason, "dropping confirmation");
                collected.rejected.push((owner, reason));
            }
        }
    }

    collected
}

/// Packed signatures ready for `execTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlob {
    pub bytes: Bytes,
    /// Owners whose signatures are in `bytes`, ascending.
    pub signers: Vec<Address>,
    pub rejected: Vec<(Address, RejectReason)>,
}

/// Concatenates signatures in ascending owner order, contract signature data last.
pub fn encode_signatures<'a>(signatures: impl IntoIterator<Item = &'a SafeSignature>) -> Bytes {
    let mut sorted: Vec<&SafeSignature> = signatures.into_iter().collect();
    sorted.sort_by_key(|sig| sig.owner());
    sorted.dedup_by_key(|sig| sig.owner());

    let mut static_parts = Vec::with_capacity(sorted.len() * SIGNATURE_LENGTH);
    let mut dynamic_parts = Vec::new();
    let static_len = sorted.len() * SIGNATURE_LENGTH;

    for signature in sorted {
        let offset = static_len + dynamic_parts.len();
        static_parts.extend_from_slice(&signature.static_part(offset));
        if let Some(dynamic) = signature.dynamic_part() {
            dynamic_parts.extend_from_slice(&dynamic);
        }
    }

    static_parts.extend_from_slice(&dynamic_parts);
    static_parts.into()
}

/// Builds the `signatures` argument of `execTransaction`.
///
/// Fails with [`SafeError::InsufficientSignatures`] if fewer than `threshold`
/// confirmations survive verification.
pub fn build_signature_blob(
    confirmations: &[Confirmation],
    safe_tx_hash: B256,
    owners: &[Address],
    threshold: u64,
) -> Result<SignatureBlob> {
    let collected = collect_signatures(confirmations, safe_tx_hash, owners);

    let need = threshold as usize;
    if collected.len() < need {
        return Err(SafeError::InsufficientSignatures { have: collected.len(), need });
    }

    Ok(SignatureBlob {
        bytes: encode_signatures(collected.accepted.values()),
        signers: collected.accepted.keys().copied().collect(),
        rejected: collected.rejected,
    })
}
