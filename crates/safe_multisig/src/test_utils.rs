//! Well-known development keys and helpers shared by the unit tests.

use alloy_primitives::{eip191_hash_message, Address, Bytes, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use chrono::{TimeZone, Utc};

use crate::transaction_data::Confirmation;

/// Owners ordered by address: `OWNER_A < OWNER_B < OWNER_C`.
#[derive(Debug, Clone, Copy)]
pub struct TestOwner(&'static str);

// 0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC
pub const OWNER_A: TestOwner =
    TestOwner("5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a");
// 0x70997970C51812dc3A010C7d01b50e0d17dc79C8
pub const OWNER_B: TestOwner =
    TestOwner("59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d");
// 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
pub const OWNER_C: TestOwner =
    TestOwner("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");

/// Not an owner of any test Safe.
// 0x90F79bf6EB2c4f870365E785982E1f101E93b906
pub const STRANGER: TestOwner =
    TestOwner("7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6");

impl TestOwner {
    pub fn signer(&self) -> PrivateKeySigner {
        self.0.parse().unwrap()
    }

    pub fn address(&self) -> Address {
        self.signer().address()
    }
}

pub fn owners() -> Vec<Address> {
    vec![OWNER_A.address(), OWNER_B.address(), OWNER_C.address()]
}

pub fn sign(owner: TestOwner, hash: B256) -> Bytes {
    let signature = owner.signer().sign_hash_sync(&hash).unwrap();
    Bytes::copy_from_slice(&signature.as_bytes())
}

/// `eth_sign` style: signs the EIP-191 prefixed hash and shifts `v` by 4.
pub fn sign_eth(owner: TestOwner, hash: B256) -> Bytes {
    let signature = owner.signer().sign_hash_sync(&eip191_hash_message(hash)).unwrap();
    let mut bytes = signature.as_bytes();
    bytes[64] += 4;
    Bytes::copy_from_slice(&bytes)
}

pub fn confirmation(owner: TestOwner, signature: Bytes) -> Confirmation {
    Confirmation {
        owner: owner.address(),
        signature,
        submission_date: Utc.with_ymd_and_hms(2024, 11, 4, 10, 2, 11).unwrap(),
        signature_type: Some("EOA".to_string()),
    }
}
