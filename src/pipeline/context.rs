//! The explicit wallet handle every pipeline operation goes through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::WalletConfig;
use crate::error::ErrorCategory;
use crate::lifecycle::Shutdown;
use crate::pipeline::events::{EventBus, PipelineEvent};
use crate::pipeline::{PipelineError, PipelineResult};
use crate::resilience::{retry_transient, RetryPolicy, Retryable};
use crate::rpc::{ChainRpc, RejectionKind, RpcError, RpcResult};
use crate::tracker::{TrackerError, TrackerResult, TransactionRecord, TransactionTracker, TxStatus};
use crate::transaction::{
    signer, AccountState, NonceManager, Replacement, SignedTransaction, TransactionBuilder,
    TransactionRequest, UnsignedTransaction,
};
use crate::vault::{AuthorizationGate, Credential, KeyVault};

/// One wallet account bound to one chain endpoint.
///
/// Holds everything the send pipeline needs; there is no global wallet
/// manager.
pub struct WalletContext {
    wallet_id: String,
    address: Address,
    rpc: Arc<dyn ChainRpc>,
    vault: Arc<KeyVault>,
    gate: Arc<dyn AuthorizationGate>,
    builder: TransactionBuilder,
    tracker: Arc<TransactionTracker>,
    events: EventBus,
    shutdown: Arc<Shutdown>,
    retry: RetryPolicy,
    sent: DashMap<TxHash, UnsignedTransaction>,
    signing_blocked: AtomicBool,
}

impl WalletContext {
    pub fn new(
        config: &WalletConfig,
        wallet_id: impl Into<String>,
        address: Address,
        rpc: Arc<dyn ChainRpc>,
        vault: Arc<KeyVault>,
        gate: Arc<dyn AuthorizationGate>,
    ) -> Self {
        let events = EventBus::new();
        let builder = TransactionBuilder::new(
            rpc.clone(),
            Arc::new(NonceManager::new()),
            config.gas.clone(),
            config.rpc.chain_id,
        );
        let tracker = Arc::new(TransactionTracker::new(
            rpc.clone(),
            config.tracker.clone(),
            events.clone(),
        ));

        Self {
            wallet_id: wallet_id.into(),
            address,
            rpc,
            vault,
            gate,
            builder,
            tracker,
            events,
            shutdown: Arc::new(Shutdown::new()),
            retry: RetryPolicy::from(&config.retries),
            sent: DashMap::new(),
            signing_blocked: AtomicBool::new(false),
        }
    }

    /// Unlock once to learn the wallet's address, then build the context.
    pub async fn open(
        config: &WalletConfig,
        wallet_id: impl Into<String>,
        credential: &Credential,
        rpc: Arc<dyn ChainRpc>,
        vault: Arc<KeyVault>,
        gate: Arc<dyn AuthorizationGate>,
    ) -> PipelineResult<Self> {
        let wallet_id = wallet_id.into();
        let address = vault
            .unlock(gate.as_ref(), &wallet_id, credential)
            .await?
            .address();
        Ok(Self::new(config, wallet_id, address, rpc, vault, gate))
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn tracker(&self) -> &Arc<TransactionTracker> {
        &self.tracker
    }

    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.shutdown
    }

    pub fn is_signing_blocked(&self) -> bool {
        self.signing_blocked.load(Ordering::SeqCst)
    }

    /// Current balance of this wallet's address.
    pub async fn balance(&self) -> PipelineResult<U256> {
        let balance = self.fetch_balance(self.address).await?;
        self.events.publish(PipelineEvent::BalanceRefreshed {
            address: self.address,
            balance,
        });
        Ok(balance)
    }

    /// Fetch balances for `addresses` concurrently.
    pub async fn refresh_balances(
        &self,
        addresses: &[Address],
    ) -> Vec<(Address, PipelineResult<U256>)> {
        let lookups = addresses.iter().map(|&address| async move {
            let result = self.fetch_balance(address).await.map_err(PipelineError::from);
            if let Ok(balance) = result {
                self.events.publish(PipelineEvent::BalanceRefreshed { address, balance });
            }
            (address, result)
        });
        join_all(lookups).await
    }

    async fn fetch_balance(&self, address: Address) -> RpcResult<U256> {
        let rpc = self.rpc.as_ref();
        retry_transient(&self.retry, "eth_getBalance", move || rpc.get_balance(address)).await
    }

    /// Build, sign and broadcast `request`, then start tracking it.
    ///
    /// The nonce stays reserved until the node accepts the transaction.
    pub async fn send(
        &self,
        request: TransactionRequest,
        credential: &Credential,
    ) -> PipelineResult<SignedTransaction> {
        let span = tracing::info_span!(
            "send",
            wallet_id = %self.wallet_id,
            operation_id = %Uuid::new_v4()
        );
        self.send_once(request, credential).instrument(span).await
    }

    async fn send_once(
        &self,
        request: TransactionRequest,
        credential: &Credential,
    ) -> PipelineResult<SignedTransaction> {
        self.ensure_signing_allowed()?;

        let balance = self.fetch_balance(self.address).await?;
        let account = AccountState::with_balance(self.address, balance);

        let builder = &self.builder;
        let (request, account) = (&request, &account);
        let (tx, reservation) = retry_transient(&self.retry, "build", move || {
            builder.build_with_reservation(request, account)
        })
        .await?;

        let signed = self.sign(&tx, credential).await?;

        match self.submit(&signed).await {
            Ok(_) => {
                reservation.commit();
                self.accepted(&signed);
                Ok(signed)
            }
            Err(e) => {
                drop(reservation);
                if let RpcError::TransactionRejected {
                    kind: RejectionKind::NonceTooLow | RejectionKind::NonceTooHigh,
                    ..
                } = e
                {
                    self.builder.nonces().invalidate(self.address).await;
                }
                Err(e.into())
            }
        }
    }

    /// Replace a pending transaction at the same nonce.
    pub async fn replace(
        &self,
        hash: TxHash,
        kind: Replacement,
        bump_percent: u32,
        credential: &Credential,
    ) -> PipelineResult<SignedTransaction> {
        self.ensure_signing_allowed()?;

        if self.tracker.status(hash)?.is_terminal() {
            return Err(PipelineError::AlreadyFinal(hash));
        }
        let original = self
            .sent
            .get(&hash)
            .map(|entry| entry.value().clone())
            .ok_or(TrackerError::UnknownTransaction(hash))?;

        let reservation = self
            .builder
            .nonces()
            .reserve_explicit(self.address, original.nonce)
            .await;
        let tx = self.builder.replacement(&original, kind, bump_percent).await?;
        let signed = self.sign(&tx, credential).await?;
        self.submit(&signed).await?;

        reservation.commit();
        self.accepted(&signed);
        tracing::info!(
            replaced = %hash,
            replacement = %signed.hash,
            kind = ?kind,
            "Transaction replaced"
        );
        Ok(signed)
    }

    /// Broadcast `signed`, resolving ambiguous failures before any resend.
    ///
    /// After a timeout the node is asked whether it already has the hash;
    /// only if it does not are the same bytes sent again.
    pub async fn submit(&self, signed: &SignedTransaction) -> RpcResult<TxHash> {
        let mut attempt: u32 = 1;
        loop {
            let err = match self.rpc.broadcast(signed).await {
                Ok(hash) => return Ok(hash),
                Err(e) => e,
            };

            if err.is_ambiguous() {
                match self.node_has(signed.hash).await {
                    Ok(true) => {
                        tracing::info!(
                            tx_hash = %signed.hash,
                            "Broadcast outcome unclear, node has transaction"
                        );
                        return Ok(signed.hash);
                    }
                    Ok(false) => {
                        tracing::warn!(
                            tx_hash = %signed.hash,
                            "Broadcast outcome unclear, node does not have transaction"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            tx_hash = %signed.hash,
                            error = %e,
                            "Could not resolve broadcast outcome"
                        );
                    }
                }
            }

            if !err.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                tx_hash = %signed.hash,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Resending transaction"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn node_has(&self, hash: TxHash) -> RpcResult<bool> {
        if self.rpc.is_transaction_known(hash).await? {
            return Ok(true);
        }
        Ok(self.rpc.get_receipt(hash).await?.is_some())
    }

    /// Unlock through the gate and sign `tx`.
    ///
    /// A signing failure blocks this context until [`reauthorize`](Self::reauthorize).
    async fn sign(
        &self,
        tx: &UnsignedTransaction,
        credential: &Credential,
    ) -> PipelineResult<SignedTransaction> {
        self.ensure_signing_allowed()?;

        let unlocked = self
            .vault
            .unlock(self.gate.as_ref(), &self.wallet_id, credential)
            .await?;

        unlocked.use_once(|key| signer::sign(tx, key)).map_err(|e| {
            if e.category() == ErrorCategory::Security {
                self.signing_blocked.store(true, Ordering::SeqCst);
                tracing::error!(
                    wallet_id = %self.wallet_id,
                    error = %e,
                    "Signing failed, wallet blocked"
                );
            }
            PipelineError::from(e)
        })
    }

    /// Unlock again and lift a signing block if the key matches.
    pub async fn reauthorize(&self, credential: &Credential) -> PipelineResult<()> {
        let actual = self
            .vault
            .unlock(self.gate.as_ref(), &self.wallet_id, credential)
            .await?
            .address();

        if actual != self.address {
            return Err(PipelineError::WalletMismatch {
                expected: self.address,
                actual,
            });
        }

        self.signing_blocked.store(false, Ordering::SeqCst);
        tracing::info!(wallet_id = %self.wallet_id, "Wallet re-authorized");
        Ok(())
    }

    fn ensure_signing_allowed(&self) -> PipelineResult<()> {
        if self.is_signing_blocked() {
            return Err(PipelineError::SigningBlocked(self.wallet_id.clone()));
        }
        Ok(())
    }

    fn accepted(&self, signed: &SignedTransaction) {
        self.sent.insert(signed.hash, signed.tx.clone());
        self.tracker.register(signed.hash, signed.tx.nonce);
        self.events.publish(PipelineEvent::Submitted {
            hash: signed.hash,
            from: signed.tx.from,
            nonce: signed.tx.nonce,
        });
    }

    /// Poll `hash` in the background until terminal or shutdown.
    pub fn track(&self, hash: TxHash) -> JoinHandle<TrackerResult<TxStatus>> {
        self.tracker.spawn(hash, self.shutdown.subscribe())
    }

    pub fn record(&self, hash: TxHash) -> Option<TransactionRecord> {
        self.tracker.record(hash)
    }

    /// Every transaction sent through this context, oldest first.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.tracker.records()
    }
}

impl std::fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContext")
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.address)
            .field("signing_blocked", &self.is_signing_blocked())
            .finish_non_exhaustive()
    }
}
