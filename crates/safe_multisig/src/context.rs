use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use std::{sync::Arc, time::Duration};

use crate::{
    calls::{http_chain, SafeChain},
    client::{SafeClient, TransactionService},
    config::ResolvedConfig,
    consts::receipt_timeout,
    error::{Result, SafeError},
    signer::SafeSigner,
};

/// Everything an operation on one Safe needs: its collaborators, the owner key
/// (if any) and the cancellation signal shared by background polling.
pub struct AppContext {
    pub safe_address: Address,
    pub chain_id: u64,
    pub service: Arc<dyn TransactionService>,
    pub chain: Arc<dyn SafeChain>,
    signer: Option<Arc<dyn SafeSigner>>,
    receipt_timeout: Duration,
    cancel: CancellationToken,
}

impl AppContext {
    pub fn new(
        safe_address: Address,
        chain_id: u64,
        service: Arc<dyn TransactionService>,
        chain: Arc<dyn SafeChain>,
        signer: Option<Arc<dyn SafeSigner>>,
    ) -> Self {
        Self {
            safe_address,
            chain_id,
            service,
            chain,
            signer,
            receipt_timeout: receipt_timeout(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Wires the HTTP transaction service client and the JSON-RPC chain.
    pub fn from_config(config: &ResolvedConfig, signer: Option<PrivateKeySigner>) -> Result<Self> {
        let service = SafeClient::with_url(&config.tx_service_url)?;
        let chain = http_chain(config.rpc_url.clone(), signer.clone());
        let signer = signer.map(|s| Arc::new(s) as Arc<dyn SafeSigner>);

        Ok(Self::new(config.safe_address, config.chain_id, Arc::new(service), chain, signer))
    }

    /// Caps the receipt wait, see [`receipt_timeout`].
    pub fn with_receipt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receipt_timeout = receipt_timeout(timeout);
        self
    }

    /// Ties disposal to an outer shutdown signal: cancelling `parent` disposes this context.
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }

    pub fn signer(&self) -> Result<&dyn SafeSigner> {
        self.signer
            .as_deref()
            .ok_or_else(|| SafeError::configuration("an owner private key is required"))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops background polling and drops cached Safe metadata.
    pub fn dispose(&self) {
        debug!(safe = %self.safe_address, "disposing context");
        self.cancel.cancel();
        self.service.invalidate(self.safe_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calls::MockSafeChain, client::MockTransactionService, consts::MAX_RECEIPT_TIMEOUT};

    fn context(service: MockTransactionService) -> AppContext {
        AppContext::new(
            Address::repeat_byte(0x5a),
            1,
            Arc::new(service),
            Arc::new(MockSafeChain::new()),
            None,
        )
    }

    #[test]
    fn signer_is_required_for_signing_operations() {
        let ctx = context(MockTransactionService::new());
        assert!(matches!(ctx.signer(), Err(SafeError::Configuration(_))));
    }

    #[test]
    fn dispose_cancels_and_drops_the_cache() {
        let mut service = MockTransactionService::new();
        service
            .expect_invalidate()
            .withf(|safe| *safe == Address::repeat_byte(0x5a))
            .times(1)
            .return_const(());

        let ctx = context(service);
        let token = ctx.cancellation_token();
        assert!(!ctx.is_disposed());

        ctx.dispose();
        assert!(ctx.is_disposed());
        assert!(token.is_cancelled());
    }

    #[test]
    fn parent_shutdown_reaches_the_context() {
        let parent = CancellationToken::new();
        let ctx = context(MockTransactionService::new()).with_parent_token(&parent);

        parent.cancel();
        assert!(ctx.is_disposed());
    }

    #[test]
    fn receipt_timeout_is_capped() {
        let ctx = context(MockTransactionService::new())
            .with_receipt_timeout(Some(Duration::from_secs(3_600)));
        assert_eq!(ctx.receipt_timeout(), MAX_RECEIPT_TIMEOUT);
    }
}
