//! Per-account nonce allocation.
//!
//! Each account has an async lock around its cached next nonce. A
//! reservation holds that lock until it is committed or dropped, so two
//! concurrent builds for one account can never pick the same nonce, and a
//! build that is abandoned leaves no gap.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::rpc::{ChainRpc, RpcResult};

/// Hands out sequential nonces per sending account.
#[derive(Debug, Default)]
pub struct NonceManager {
    accounts: DashMap<Address, Arc<Mutex<Option<U256>>>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: Address) -> Arc<Mutex<Option<U256>>> {
        self.accounts
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Lock `address` and pick its next nonce.
    ///
    /// The nonce is the larger of the node's pending count and the locally
    /// cached next value, so transactions still in the mempool of another
    /// node are not reused.
    pub async fn reserve(
        &self,
        rpc: &dyn ChainRpc,
        address: Address,
    ) -> RpcResult<NonceReservation> {
        let guard = self.slot(address).lock_owned().await;

        let chain_nonce = rpc.get_nonce(address).await?;
        let nonce = match *guard {
            Some(cached) if cached > chain_nonce => cached,
            _ => chain_nonce,
        };

        tracing::debug!(
            address = %address,
            nonce = %nonce,
            chain_nonce = %chain_nonce,
            "Nonce reserved"
        );

        Ok(NonceReservation {
            address,
            nonce,
            guard,
        })
    }

    /// Lock `address` for a caller-chosen nonce.
    ///
    /// Committing still advances the cache past `nonce`.
    pub async fn reserve_explicit(&self, address: Address, nonce: U256) -> NonceReservation {
        let guard = self.slot(address).lock_owned().await;
        NonceReservation {
            address,
            nonce,
            guard,
        }
    }

    /// Forget the cached nonce so the next reservation trusts the node.
    ///
    /// Used after a `nonce too low/high` rejection.
    pub async fn invalidate(&self, address: Address) {
        let slot = self.slot(address);
        *slot.lock().await = None;
        tracing::debug!(address = %address, "Nonce cache invalidated");
    }

    /// Cached next nonce, if any.
    pub async fn cached(&self, address: Address) -> Option<U256> {
        *self.slot(address).lock().await
    }
}

/// An exclusive claim on one account's next nonce.
///
/// Dropping without [`commit`](Self::commit) releases the lock and leaves
/// the cache untouched.
pub struct NonceReservation {
    address: Address,
    nonce: U256,
    guard: OwnedMutexGuard<Option<U256>>,
}

impl NonceReservation {
    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Record that `nonce` is now in use.
    pub fn commit(mut self) {
        let next = self.nonce + U256::from(1u64);
        if (*self.guard).map_or(true, |cached| cached < next) {
            *self.guard = Some(next);
        }
        tracing::debug!(address = %self.address, nonce = %self.nonce, "Nonce committed");
    }
}

impl std::fmt::Debug for NonceReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceReservation")
            .field("address", &self.address)
            .field("nonce", &self.nonce)
            .finish()
    }
}
