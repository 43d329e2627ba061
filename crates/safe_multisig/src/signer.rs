use alloy_primitives::{Address, Bytes, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::{Result, SafeError};

/// Owner key capability: who we are and a raw signature over a 32-byte digest.
///
/// The returned signature is `r ‖ s ‖ v` with `v` in {27, 28}.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SafeSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: B256) -> Result<Bytes>;
}

#[async_trait]
impl SafeSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_hash(&self, hash: B256) -> Result<Bytes> {
        let signature = Signer::sign_hash(self, &hash)
            .await
            .map_err(|e| SafeError::Signing(e.to_string()))?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

/// Parses a hex private key, with or without `0x`.
pub fn signer_from_private_key(private_key: &str) -> Result<PrivateKeySigner> {
    private_key
        .trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| SafeError::configuration("malformed private key"))
}
