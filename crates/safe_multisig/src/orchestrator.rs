//! Drives multisig transactions from proposal to execution.

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use std::{collections::HashMap, sync::Mutex};

use crate::{
    calls::{exec_transaction, SafeChain},
    consts::{with_gas_margin, DEFAULT_SAFE_VERSION, FALLBACK_GAS_LIMIT},
    context::AppContext,
    eip712::SafeTypeHashes,
    error::{HashSource, Result, SafeError},
    hash::{compute_safe_tx_hash, verify_safe_tx_hash},
    lifecycle::{TxEvent, TxState},
    poller::{InFlight, Ticker},
    signatures::{build_signature_blob, collect_signatures},
    transaction_data::{
        Confirmation, MultisigTransaction, SafeInfo, SafeMetaTransaction, SafeTransactionData,
    },
};

/// Confirmation progress of one transaction, as seen by this owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub safe_tx_hash: B256,
    pub nonce: U256,
    pub state: TxState,
    pub confirmations: usize,
    pub threshold: u64,
    /// Owners with a valid confirmation, ascending.
    pub signers: Vec<Address>,
    /// Owners who have not confirmed yet.
    pub missing: Vec<Address>,
    /// Confirmations dropped during verification.
    pub rejected: usize,
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalOutcome {
    pub safe_tx_hash: B256,
    pub tx: SafeTransactionData,
    pub state: TxState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub safe_tx_hash: B256,
    pub transaction_hash: B256,
    pub gas_limit: u64,
    /// `false` when estimation failed and [`FALLBACK_GAS_LIMIT`] was used.
    pub gas_estimated: bool,
    pub signers: Vec<Address>,
}

/// Safe metadata combined from the transaction service and the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeOverview {
    pub info: SafeInfo,
    pub chain_id: u64,
    pub version: String,
    pub balance: U256,
}

pub struct SafeOrchestrator {
    ctx: AppContext,
    version: String,
    type_hashes: SafeTypeHashes,
    in_flight: InFlight,
    states: Mutex<HashMap<B256, TxState>>,
}

impl SafeOrchestrator {
    /// Checks the RPC endpoint serves the configured chain, loads the Safe, checks
    /// its owners and threshold against the contract and picks the EIP-712 type
    /// hashes matching its contract version.
    pub async fn init(ctx: AppContext) -> Result<Self> {
        let chain_id = ctx.chain.chain_id().await?;
        if chain_id != ctx.chain_id {
            return Err(SafeError::configuration(format!(
                "rpc endpoint is on chain {chain_id}, expected {}",
                ctx.chain_id
            )));
        }

        let safe = ctx.safe_address;
        let info = ctx.service.get_safe_info(safe).await?;
        check_safe_info(safe, &info, ctx.chain.as_ref()).await?;

        let version = match ctx.chain.version(safe).await {
            Ok(version) => version,
            Err(e) => {
                let fallback =
                    info.version.clone().unwrap_or_else(|| DEFAULT_SAFE_VERSION.to_string());
                warn!(%safe, error = %e, %fallback, "could not read VERSION(), using fallback");
                fallback
            }
        };
        let type_hashes = SafeTypeHashes::for_version_str(&version)?;

        info!(%safe, chain_id, %version, threshold = info.threshold, owners = info.owners.len(), "safe loaded");

        Ok(Self {
            ctx,
            version,
            type_hashes,
            in_flight: InFlight::default(),
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Cancels polling and forgets everything cached.
    pub fn dispose(&self) {
        self.ctx.dispose();
        if let Ok(mut states) = self.states.lock() {
            states.clear();
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn safe_tx_hash(&self, tx: &SafeTransactionData) -> B256 {
        compute_safe_tx_hash(tx, self.ctx.safe_address, self.ctx.chain_id, &self.type_hashes)
    }

    /// Last lifecycle state this orchestrator recorded for `safe_tx_hash`.
    pub fn tracked_state(&self, safe_tx_hash: &B256) -> Option<TxState> {
        self.states.lock().ok().and_then(|states| states.get(safe_tx_hash).cloned())
    }

    pub async fn info(&self) -> Result<SafeOverview> {
        let safe = self.ctx.safe_address;
        let info = self.ctx.service.get_safe_info(safe).await?;
        let balance = self.ctx.chain.balance(safe).await?;

        Ok(SafeOverview { info, chain_id: self.ctx.chain_id, version: self.version.clone(), balance })
    }

    /// Nonce for a new proposal: one past the highest queued nonce, or the Safe nonce.
    pub async fn next_nonce(&self) -> Result<U256> {
        let safe = self.ctx.safe_address;
        let info = self.ctx.service.get_safe_info(safe).await?;
        let pending = self.ctx.service.get_pending_transactions(safe).await?;

        let next = pending
            .iter()
            .map(|tx| tx.nonce() + U256::from(1))
            .max()
            .map_or(info.nonce, |queued| queued.max(info.nonce));
        Ok(next)
    }

    /// Signs `meta` as the configured owner and posts it to the transaction service.
    ///
    /// If the service rejects the proposal its response body is returned verbatim
    /// and the draft stays `Unconfirmed`. Nothing is retried.
    pub async fn propose(
        &self,
        meta: SafeMetaTransaction,
        nonce: Option<U256>,
    ) -> Result<ProposalOutcome> {
        let signer = self.ctx.signer()?;
        let sender = signer.address();
        let safe = self.ctx.safe_address;

        let info = self.ctx.service.get_safe_info(safe).await?;
        if !info.is_owner(&sender) {
            return Err(SafeError::configuration(format!("{sender} is not an owner of {safe}")));
        }

        let nonce = match nonce {
            Some(nonce) => nonce,
            None => self.next_nonce().await?,
        };
        if nonce < info.nonce {
            return Err(SafeError::StaleNonce { tx: nonce, onchain: info.nonce });
        }

        let tx = SafeTransactionData::new(meta, nonce);
        let safe_tx_hash = self.safe_tx_hash(&tx);
        match self.track(safe_tx_hash, TxState::Unconfirmed) {
            Some(TxState::Executed) => return Err(SafeError::AlreadyExecuted(safe_tx_hash)),
            Some(TxState::Failed { .. }) => {
                self.advance(
                    safe_tx_hash,
                    TxEvent::Retry { count: 0, threshold: info.threshold, executed: false },
                )?;
            }
            _ => {}
        }

        let signature = match signer.sign_hash(safe_tx_hash).await {
            Ok(signature) => signature,
            Err(e) => return Err(self.fail(safe_tx_hash, e)),
        };
        self.ctx.service.propose_transaction(safe, &tx, safe_tx_hash, sender, signature).await?;
        self.ctx.service.invalidate(safe);

        let state =
            self.advance(safe_tx_hash, TxEvent::ConfirmationAccepted { count: 1, threshold: info.threshold })?;
        info!(%safe_tx_hash, %nonce, %state, "transaction proposed");

        Ok(ProposalOutcome { safe_tx_hash, tx, state })
    }

    /// Proposes the zero-value self call that replaces whatever is queued at `nonce`.
    pub async fn propose_rejection(&self, nonce: U256) -> Result<ProposalOutcome> {
        let rejection = SafeTransactionData::rejection(self.ctx.safe_address, nonce);
        let meta = SafeMetaTransaction {
            to: rejection.to,
            value: rejection.value,
            data: rejection.data,
            operation: rejection.operation,
        };
        self.propose(meta, Some(nonce)).await
    }

    /// Adds the configured owner's confirmation.
    ///
    /// Returns [`SafeError::AlreadyConfirmed`] or [`SafeError::AlreadyExecuted`]
    /// without posting anything if there is nothing left to do.
    pub async fn confirm(&self, safe_tx_hash: B256) -> Result<TransactionStatus> {
        let signer = self.ctx.signer()?;
        let owner = signer.address();
        if self.tracked_state(&safe_tx_hash).is_some_and(|state| state.is_terminal()) {
            return Err(SafeError::AlreadyExecuted(safe_tx_hash));
        }

        let mut tx = self.fetch_verified(safe_tx_hash).await?;
        if tx.is_executed {
            return Err(SafeError::AlreadyExecuted(safe_tx_hash));
        }

        let info = self.ctx.service.get_safe_info(self.ctx.safe_address).await?;
        if !info.is_owner(&owner) {
            return Err(SafeError::configuration(format!(
                "{owner} is not an owner of {}",
                self.ctx.safe_address
            )));
        }
        if self.confirmed_by(&tx, &info, &owner) {
            return Err(SafeError::AlreadyConfirmed(safe_tx_hash));
        }

        let signature = match signer.sign_hash(safe_tx_hash).await {
            Ok(signature) => signature,
            Err(e) => return Err(self.fail(safe_tx_hash, e)),
        };
        if let Err(err) =
            self.ctx.service.post_confirmation(safe_tx_hash, signature.clone(), owner).await
        {
            // another client of the same owner may have won the race
            if matches!(err, SafeError::Relay { .. }) {
                let current = self.ctx.service.get_transaction(safe_tx_hash).await?;
                if current.is_executed {
                    return Err(SafeError::AlreadyExecuted(safe_tx_hash));
                }
                if self.confirmed_by(&current, &info, &owner) {
                    return Err(SafeError::AlreadyConfirmed(safe_tx_hash));
                }
            }
            return Err(self.fail(safe_tx_hash, err));
        }

        tx.confirmations.push(Confirmation {
            owner,
            signature,
            submission_date: chrono::Utc::now(),
            signature_type: Some("EOA".to_string()),
        });
        if let Some(TxState::Failed { .. }) = self.tracked_state(&safe_tx_hash) {
            let count = collect_signatures(&tx.confirmations, safe_tx_hash, &info.owners).len();
            self.advance(safe_tx_hash, TxEvent::Retry { count, threshold: info.threshold, executed: false })?;
        }
        let status = self.evaluate(&tx, &info)?;
        info!(%safe_tx_hash, %owner, state = %status.state, "confirmation posted");

        Ok(status)
    }

    /// Executes a fully confirmed transaction on chain.
    pub async fn execute(&self, safe_tx_hash: B256) -> Result<ExecutionOutcome> {
        self.ctx.signer()?;
        let safe = self.ctx.safe_address;
        if self.tracked_state(&safe_tx_hash).is_some_and(|state| state.is_terminal()) {
            return Err(SafeError::AlreadyExecuted(safe_tx_hash));
        }

        let tx = self.fetch_verified(safe_tx_hash).await?;
        if tx.is_executed {
            self.advance(safe_tx_hash, TxEvent::ExecutionMined)?;
            return Err(SafeError::AlreadyExecuted(safe_tx_hash));
        }

        let info = self.ctx.service.get_safe_info(safe).await?;
        let blob = build_signature_blob(&tx.confirmations, safe_tx_hash, &info.owners, info.threshold)?;
        if let Some(TxState::Failed { .. }) = self.tracked_state(&safe_tx_hash) {
            self.advance(
                safe_tx_hash,
                TxEvent::Retry { count: blob.signers.len(), threshold: info.threshold, executed: false },
            )?;
        }

        let onchain = self.ctx.chain.nonce(safe).await?;
        if tx.nonce() != onchain {
            return Err(SafeError::StaleNonce { tx: tx.nonce(), onchain });
        }

        let contract_hash = self.ctx.chain.transaction_hash(safe, &tx.tx).await?;
        verify_safe_tx_hash(safe_tx_hash, contract_hash, HashSource::Contract)?;

        let exec = exec_transaction(&tx.tx, &blob.bytes, safe);
        let (gas_limit, gas_estimated) = match self.ctx.chain.estimate_gas(&exec).await {
            Ok(estimate) => (with_gas_margin(estimate), true),
            Err(e) => {
                warn!(%safe_tx_hash, error = %e, gas_limit = FALLBACK_GAS_LIMIT, "gas estimation failed, using fallback");
                (FALLBACK_GAS_LIMIT, false)
            }
        };

        let receipt = match self.ctx.chain.send_execution(&exec, gas_limit, self.ctx.receipt_timeout()).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(safe_tx_hash, e)),
        };
        self.ctx.service.invalidate(safe);

        if !receipt.success {
            let reason = format!("execTransaction {} failed", receipt.transaction_hash);
            error!(%safe_tx_hash, tx_hash = %receipt.transaction_hash, "execution failed on chain");
            self.advance(safe_tx_hash, TxEvent::Failure(reason.clone()))?;
            return Err(SafeError::Chain(reason));
        }

        self.advance(safe_tx_hash, TxEvent::ExecutionMined)?;
        info!(%safe_tx_hash, tx_hash = %receipt.transaction_hash, gas_used = receipt.gas_used, "transaction executed");

        Ok(ExecutionOutcome {
            safe_tx_hash,
            transaction_hash: receipt.transaction_hash,
            gas_limit,
            gas_estimated,
            signers: blob.signers,
        })
    }

    pub async fn status(&self, safe_tx_hash: B256) -> Result<TransactionStatus> {
        let tx = self.fetch_verified(safe_tx_hash).await?;
        let info = self.ctx.service.get_safe_info(self.ctx.safe_address).await?;
        self.evaluate(&tx, &info)
    }

    /// Status of every queued transaction, lowest nonce first.
    ///
    /// Transactions whose hash does not match are logged and left out.
    pub async fn pending(&self) -> Result<Vec<TransactionStatus>> {
        let safe = self.ctx.safe_address;
        self.ctx.service.invalidate(safe);
        let info = self.ctx.service.get_safe_info(safe).await?;
        let pending = self.ctx.service.get_pending_transactions(safe).await?;

        let mut statuses = Vec::with_capacity(pending.len());
        for tx in pending.iter().filter(|tx| !tx.is_executed) {
            let checked = self
                .verify_relay_hash(tx)
                .and_then(|_| self.evaluate(tx, &info));
            match checked {
                Ok(status) => statuses.push(status),
                Err(e) => error!(safe_tx_hash = %tx.safe_tx_hash, error = %e, "skipping transaction"),
            }
        }

        statuses.sort_by_key(|status| status.nonce);
        Ok(statuses)
    }

    /// One refresh of the queue. Returns `None` if a refresh of this Safe is already running.
    pub async fn poll_once(&self) -> Result<Option<Vec<TransactionStatus>>> {
        let safe = self.ctx.safe_address;
        let Some(_guard) = self.in_flight.try_begin(safe) else {
            debug!(%safe, "poll already in flight, skipping");
            return Ok(None);
        };

        self.pending().await.map(Some)
    }

    /// Polls on every tick until the ticker stops or the context is disposed.
    ///
    /// Transient transaction service failures are logged and the next tick retried.
    pub async fn watch<T, F>(&self, mut ticker: T, mut on_update: F) -> Result<()>
    where
        T: Ticker<u64>,
        F: FnMut(u64, &[TransactionStatus]) + Send,
    {
        let cancel = self.ctx.cancellation_token();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("watch cancelled");
                    return Ok(());
                }
                round = ticker.tick() => {
                    let Some(round) = round else {
                        debug!("poll ticker stopped");
                        return Ok(());
                    };

                    match self.poll_once().await {
                        Ok(Some(statuses)) => on_update(round, &statuses),
                        Ok(None) => {}
                        Err(e) if e.is_transient() => warn!(round, error = %e, "poll failed, retrying next round"),
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    async fn fetch_verified(&self, safe_tx_hash: B256) -> Result<MultisigTransaction> {
        let tx = self.ctx.service.get_transaction(safe_tx_hash).await?;
        if tx.safe != self.ctx.safe_address {
            return Err(SafeError::configuration(format!(
                "{safe_tx_hash} belongs to {}, not {}",
                tx.safe, self.ctx.safe_address
            )));
        }
        self.verify_relay_hash(&tx)?;
        Ok(tx)
    }

    fn verify_relay_hash(&self, tx: &MultisigTransaction) -> Result<B256> {
        verify_safe_tx_hash(self.safe_tx_hash(&tx.tx), tx.safe_tx_hash, HashSource::Relay)
    }

    /// `tx.safe_tx_hash` must already be verified.
    fn evaluate(&self, tx: &MultisigTransaction, info: &SafeInfo) -> Result<TransactionStatus> {
        let collected = collect_signatures(&tx.confirmations, tx.safe_tx_hash, &info.owners);
        let state = self.observe(tx.safe_tx_hash, collected.len(), info.threshold, tx.is_executed)?;

        Ok(TransactionStatus {
            safe_tx_hash: tx.safe_tx_hash,
            nonce: tx.nonce(),
            executable: state.is_executable(),
            state,
            confirmations: collected.len(),
            threshold: info.threshold,
            signers: collected.accepted.keys().copied().collect(),
            missing: info.owners.iter().filter(|o| !collected.contains(o)).copied().collect(),
            rejected: collected.rejected.len(),
        })
    }

    /// Folds what the transaction service reports into the tracked state.
    ///
    /// A locally recorded `Executed` or `Failed` is kept until the relay reports execution.
    fn observe(&self, hash: B256, count: usize, threshold: u64, executed: bool) -> Result<TxState> {
        match (self.tracked_state(&hash), executed) {
            (Some(TxState::Executed), _) => Ok(TxState::Executed),
            (Some(failed @ TxState::Failed { .. }), false) => Ok(failed),
            (_, true) => self.advance(hash, TxEvent::ExecutionMined),
            (_, false) => self.advance(hash, TxEvent::ConfirmationAccepted { count, threshold }),
        }
    }

    fn advance(&self, hash: B256, event: TxEvent) -> Result<TxState> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| SafeError::configuration("transaction state lock poisoned"))?;
        let current = states.get(&hash).cloned().unwrap_or(TxState::Unconfirmed);
        let next = current.apply(event)?;
        states.insert(hash, next.clone());
        Ok(next)
    }

    /// Starts tracking `hash` unless it already is. Returns the state now recorded.
    fn track(&self, hash: B256, state: TxState) -> Option<TxState> {
        let mut states = self.states.lock().ok()?;
        Some(states.entry(hash).or_insert(state).clone())
    }

    /// Records `err` as the failure reason for `hash` and hands it back.
    fn fail(&self, hash: B256, err: SafeError) -> SafeError {
        if let Err(e) = self.advance(hash, TxEvent::Failure(err.to_string())) {
            warn!(safe_tx_hash = %hash, error = %e, "could not record failure");
        }
        err
    }

    /// Whether `owner` has a confirmation on `tx` that survives verification.
    fn confirmed_by(&self, tx: &MultisigTransaction, info: &SafeInfo, owner: &Address) -> bool {
        collect_signatures(&tx.confirmations, tx.safe_tx_hash, &info.owners).contains(owner)
    }
}

/// The transaction service must agree with the contract on who signs and how many.
async fn check_safe_info(safe: Address, info: &SafeInfo, chain: &dyn SafeChain) -> Result<()> {
    let mut onchain = chain.owners(safe).await?;
    let threshold = chain.threshold(safe).await?;

    let mut reported = info.owners.clone();
    onchain.sort();
    reported.sort();
    if onchain != reported || threshold != info.threshold {
        return Err(SafeError::Chain(format!(
            "transaction service reports {}/{} owners for {}, the contract has {threshold}/{}",
            info.threshold,
            reported.len(),
            safe,
            onchain.len()
        )));
    }
    Ok(())
}
