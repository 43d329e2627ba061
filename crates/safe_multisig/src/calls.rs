//! Safe contract calls over JSON-RPC.

use alloy_network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{Log, TransactionRequest};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolEvent};
use alloy_transport::Transport;
use alloy_transport_http::Http;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use std::{marker::PhantomData, sync::Arc, time::Duration};

use crate::{
    contracts::safe::Safe,
    error::{Result, SafeError},
    transaction_data::{ExecutableSafeTransaction, SafeTransactionData},
};

/// What the chain told us about a mined `execTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub transaction_hash: B256,
    /// `false` if the transaction reverted or the Safe emitted `ExecutionFailure`.
    pub success: bool,
    pub gas_used: u64,
}

/// Read and write access to a Safe contract.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SafeChain: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn nonce(&self, safe: Address) -> Result<U256>;

    async fn version(&self, safe: Address) -> Result<String>;

    async fn owners(&self, safe: Address) -> Result<Vec<Address>>;

    async fn threshold(&self, safe: Address) -> Result<u64>;

    async fn balance(&self, address: Address) -> Result<U256>;

    /// `getTransactionHash` as computed by the contract itself.
    async fn transaction_hash(&self, safe: Address, tx: &SafeTransactionData) -> Result<B256>;

    async fn estimate_gas(&self, exec: &ExecutableSafeTransaction) -> Result<u64>;

    /// Sends `execTransaction` and waits at most `timeout` for the receipt.
    async fn send_execution(
        &self,
        exec: &ExecutableSafeTransaction,
        gas_limit: u64,
        timeout: Duration,
    ) -> Result<ExecutionReceipt>;
}

/// [`SafeChain`] backed by an alloy provider.
pub struct RpcChain<P, T> {
    provider: P,
    sender: Option<Address>,
    _transport: PhantomData<fn() -> T>,
}

impl<P, T> RpcChain<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    pub fn new(provider: P, sender: Option<Address>) -> Self {
        Self { provider, sender, _transport: PhantomData }
    }

    fn request(&self, exec: &ExecutableSafeTransaction) -> TransactionRequest {
        let req = TransactionRequest::default()
            .with_to(exec.safe_address)
            .with_input(exec.input_data.clone());
        match self.sender {
            Some(from) => req.with_from(from),
            None => req,
        }
    }
}

/// Connects to `rpc_url`. Without a signer the returned chain can only read.
pub fn http_chain(rpc_url: Url, signer: Option<PrivateKeySigner>) -> Arc<dyn SafeChain> {
    match signer {
        Some(signer) => {
            let sender = signer.address();
            let provider = ProviderBuilder::new()
                .with_recommended_fillers()
                .wallet(EthereumWallet::from(signer))
                .on_http(rpc_url);
            Arc::new(RpcChain::<_, Http<Client>>::new(provider, Some(sender)))
        }
        None => {
            let provider = ProviderBuilder::new().on_http(rpc_url);
            Arc::new(RpcChain::<_, Http<Client>>::new(provider, None))
        }
    }
}

#[async_trait]
impl<P, T> SafeChain for RpcChain<P, T>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(SafeError::chain)
    }

    async fn nonce(&self, safe: Address) -> Result<U256> {
        let call = Safe::nonceCall::new(());

        let Safe::nonceReturn { _0: nonce } = call_and_decode(call, safe, &self.provider).await?;

        Ok(nonce)
    }

    async fn version(&self, safe: Address) -> Result<String> {
        let call = Safe::VERSIONCall::new(());

        let Safe::VERSIONReturn { _0: version } =
            call_and_decode(call, safe, &self.provider).await?;

        Ok(version)
    }

    async fn owners(&self, safe: Address) -> Result<Vec<Address>> {
        let call = Safe::getOwnersCall::new(());

        let Safe::getOwnersReturn { _0: owners } =
            call_and_decode(call, safe, &self.provider).await?;

        Ok(owners)
    }

    async fn threshold(&self, safe: Address) -> Result<u64> {
        let call = Safe::getThresholdCall::new(());

        let Safe::getThresholdReturn { _0: threshold } =
            call_and_decode(call, safe, &self.provider).await?;

        u64::try_from(threshold).map_err(SafeError::chain)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.provider.get_balance(address).await.map_err(SafeError::chain)
    }

    async fn transaction_hash(&self, safe: Address, tx: &SafeTransactionData) -> Result<B256> {
        let call = Safe::getTransactionHashCall::new((
            tx.to,
            tx.value,
            tx.data.clone(),
            tx.operation.as_u8(),
            tx.safe_tx_gas,
            tx.base_gas,
            tx.gas_price,
            tx.gas_token,
            tx.refund_receiver,
            tx.nonce,
        ));

        let Safe::getTransactionHashReturn { _0: tx_hash } =
            call_and_decode(call, safe, &self.provider).await?;

        Ok(tx_hash)
    }

    async fn estimate_gas(&self, exec: &ExecutableSafeTransaction) -> Result<u64> {
        self.provider.estimate_gas(&self.request(exec)).await.map_err(SafeError::chain)
    }

    async fn send_execution(
        &self,
        exec: &ExecutableSafeTransaction,
        gas_limit: u64,
        timeout: Duration,
    ) -> Result<ExecutionReceipt> {
        if self.sender.is_none() {
            return Err(SafeError::configuration("a private key is required to execute"));
        }

        let req = self.request(exec).with_gas_limit(gas_limit);
        let pending = self.provider.send_transaction(req).await.map_err(SafeError::chain)?;
        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, gas_limit, "execTransaction sent, waiting for receipt");

        let receipt = tokio::time::timeout(timeout, pending.get_receipt())
            .await
            .map_err(|_| SafeError::ReceiptTimeout(timeout))?
            .map_err(SafeError::chain)?;

        let success = execution_succeeded(receipt.status(), receipt.inner.logs());
        debug!(%tx_hash, success, gas_used = receipt.gas_used, "receipt received");

        Ok(ExecutionReceipt { transaction_hash: tx_hash, success, gas_used: receipt.gas_used })
    }
}

/// Builds the `execTransaction` calldata for `safe_tx` with packed `signatures`.
pub fn exec_transaction(
    safe_tx: &SafeTransactionData,
    signatures: &[u8],
    safe: Address,
) -> ExecutableSafeTransaction {
    let call = Safe::execTransactionCall::new((
        safe_tx.to,
        safe_tx.value,
        safe_tx.data.clone(),
        safe_tx.operation.as_u8(),
        safe_tx.safe_tx_gas,
        safe_tx.base_gas,
        safe_tx.gas_price,
        safe_tx.gas_token,
        safe_tx.refund_receiver,
        Bytes::copy_from_slice(signatures),
    ));

    ExecutableSafeTransaction { safe_address: safe, input_data: call.abi_encode().into() }
}

/// A Safe with non-zero `safeTxGas` or `gasPrice` does not revert when the inner
/// call fails; it emits `ExecutionFailure` instead.
fn execution_succeeded(status: bool, logs: &[Log]) -> bool {
    status
        && !logs
            .iter()
            .any(|log| log.topics().first() == Some(&Safe::ExecutionFailure::SIGNATURE_HASH))
}

/// Private function to make a contract call and decode the response
async fn call_and_decode<C, P, T>(call: C, to: Address, provider: &P) -> Result<C::Return>
where
    C: SolCall,
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    let req = TransactionRequest::default().with_to(to).with_input(call.abi_encode());

    let data = provider.call(&req).await.map_err(SafeError::chain)?;
    let data = C::abi_decode_returns(data.as_ref(), true).map_err(SafeError::chain)?;

    Ok(data)
}
