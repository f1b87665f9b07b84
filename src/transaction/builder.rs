//! Transaction assembly and validation.
//!
//! # Responsibilities
//! - Validate recipient and amount before touching the network
//! - Resolve nonce, gas limit and fees the caller left out
//! - Build same-nonce replacements (speed up / cancel)

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};

use crate::config::{FeeMarket, GasConfig};
use crate::keys::parse_address;
use crate::rpc::{CallRequest, ChainRpc};
use crate::transaction::nonce::{NonceManager, NonceReservation};
use crate::transaction::types::{
    add_percent, AccountState, Fee, TransactionRequest, UnsignedTransaction, GWEI,
};
use crate::transaction::{BuildError, BuildResult};

/// Gas used by a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// Smallest fee increase nodes accept for a same-nonce replacement.
pub const MIN_REPLACEMENT_BUMP_PERCENT: u32 = 10;

/// How to replace a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Same payload, higher fee.
    SpeedUp,
    /// Zero-value transfer to self at the same nonce.
    Cancel,
}

/// Turns requests into fully specified unsigned transactions.
#[derive(Clone)]
pub struct TransactionBuilder {
    rpc: Arc<dyn ChainRpc>,
    nonces: Arc<NonceManager>,
    gas: GasConfig,
    chain_id: u64,
}

impl TransactionBuilder {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        nonces: Arc<NonceManager>,
        gas: GasConfig,
        chain_id: u64,
    ) -> Self {
        Self {
            rpc,
            nonces,
            gas,
            chain_id,
        }
    }

    pub fn nonces(&self) -> &Arc<NonceManager> {
        &self.nonces
    }

    /// Build and immediately commit the nonce.
    pub async fn build(
        &self,
        request: &TransactionRequest,
        account: &AccountState,
    ) -> BuildResult<UnsignedTransaction> {
        let (tx, reservation) = self.build_with_reservation(request, account).await?;
        reservation.commit();
        Ok(tx)
    }

    /// Build while keeping the account's nonce locked.
    ///
    /// The caller commits the reservation once the transaction is accepted
    /// by the node, or drops it to release the nonce.
    pub async fn build_with_reservation(
        &self,
        request: &TransactionRequest,
        account: &AccountState,
    ) -> BuildResult<(UnsignedTransaction, NonceReservation)> {
        let to = validate_recipient(request)?;

        if let Some(balance) = account.balance {
            if request.value > balance {
                return Err(BuildError::InvalidAmount(format!(
                    "{} wei exceeds balance of {} wei",
                    request.value, balance
                )));
            }
        }

        if let Some(limit) = request.gas_limit {
            if limit < U256::from(TRANSFER_GAS) {
                return Err(BuildError::InvalidGasLimit(format!(
                    "{} is below the {} minimum",
                    limit, TRANSFER_GAS
                )));
            }
        }

        let reservation = match request.nonce {
            Some(nonce) => self.nonces.reserve_explicit(account.address, nonce).await,
            None => self
                .nonces
                .reserve(self.rpc.as_ref(), account.address)
                .await
                .map_err(BuildError::NonceResolutionFailed)?,
        };

        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None => self.estimate_gas_limit(account.address, to, request).await?,
        };

        let fee = match request.fee {
            Some(fee) => {
                self.check_fee_cap(fee.max_price())?;
                fee
            }
            None => self.resolve_fee().await?,
        };

        let tx = UnsignedTransaction {
            from: account.address,
            to,
            value: request.value,
            gas_limit,
            fee,
            nonce: reservation.nonce(),
            data: request.data.clone(),
            chain_id: self.chain_id,
        };

        if let Some(balance) = account.balance {
            if tx.max_cost() > balance {
                tracing::warn!(
                    from = %tx.from,
                    max_cost = %tx.max_cost(),
                    balance = %balance,
                    "Balance may not cover value plus gas"
                );
            }
        }

        tracing::debug!(
            from = %tx.from,
            nonce = %tx.nonce,
            gas_limit = %tx.gas_limit,
            max_price = %tx.fee.max_price(),
            "Transaction built"
        );

        Ok((tx, reservation))
    }

    /// Same-nonce replacement of `original` with fees bumped by at least 10%.
    pub async fn replacement(
        &self,
        original: &UnsignedTransaction,
        kind: Replacement,
        bump_percent: u32,
    ) -> BuildResult<UnsignedTransaction> {
        let bump = bump_percent.max(MIN_REPLACEMENT_BUMP_PERCENT);
        let mut fee = original.fee.bumped(bump);

        // A replacement priced under the current market would sit behind the original.
        if let Ok(market) = self.resolve_fee().await {
            fee = higher_fee(fee, market);
        }
        self.check_fee_cap(fee.max_price())?;

        let tx = match kind {
            Replacement::SpeedUp => UnsignedTransaction {
                fee,
                ..original.clone()
            },
            Replacement::Cancel => UnsignedTransaction {
                to: Some(original.from),
                value: U256::ZERO,
                gas_limit: U256::from(TRANSFER_GAS),
                data: Bytes::new(),
                fee,
                ..original.clone()
            },
        };

        tracing::info!(
            from = %tx.from,
            nonce = %tx.nonce,
            kind = ?kind,
            bump_percent = bump,
            "Replacement built"
        );

        Ok(tx)
    }

    async fn estimate_gas_limit(
        &self,
        from: Address,
        to: Option<Address>,
        request: &TransactionRequest,
    ) -> BuildResult<U256> {
        let call = CallRequest {
            from,
            to,
            value: request.value,
            data: request.data.clone(),
        };
        let estimate = self
            .rpc
            .estimate_gas(&call)
            .await
            .map_err(BuildError::GasEstimationFailed)?;

        Ok(add_percent(estimate, self.gas.limit_margin_percent))
    }

    /// Ask the node for current prices and apply the configured bump and cap.
    async fn resolve_fee(&self) -> BuildResult<Fee> {
        let gas_price = self
            .rpc
            .get_gas_price()
            .await
            .map_err(BuildError::FeeResolutionFailed)?;
        self.check_fee_cap(gas_price)?;

        let bumped = add_percent(gas_price, self.gas.price_bump_percent);
        let cap = self.fee_cap();

        match self.gas.fee_market {
            FeeMarket::Legacy => Ok(Fee::Legacy {
                gas_price: bumped.min(cap),
            }),
            FeeMarket::Eip1559 => {
                let tip = self
                    .rpc
                    .get_max_priority_fee()
                    .await
                    .map_err(BuildError::FeeResolutionFailed)?;
                let tip = add_percent(tip, self.gas.price_bump_percent);
                // Room for the base fee to double before the transaction stalls.
                let max_fee = gas_price
                    .saturating_mul(U256::from(2u64))
                    .saturating_add(tip)
                    .min(cap);
                Ok(Fee::Eip1559 {
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: tip.min(max_fee),
                })
            }
        }
    }

    fn fee_cap(&self) -> U256 {
        U256::from(self.gas.max_gas_price_gwei).saturating_mul(U256::from(GWEI))
    }

    fn check_fee_cap(&self, price: U256) -> BuildResult<()> {
        if price > self.fee_cap() {
            let current_gwei = price / U256::from(GWEI);
            return Err(BuildError::FeeTooHigh {
                current_gwei: current_gwei.saturating_to::<u64>(),
                max_gwei: self.gas.max_gas_price_gwei,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransactionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("chain_id", &self.chain_id)
            .field("gas", &self.gas)
            .finish_non_exhaustive()
    }
}

/// Check `to` against `contract_creation` and return the parsed recipient.
fn validate_recipient(request: &TransactionRequest) -> BuildResult<Option<Address>> {
    match (&request.to, request.contract_creation) {
        (Some(_), true) => Err(BuildError::InvalidRecipient(
            "contract creation must not set a recipient".to_string(),
        )),
        (None, true) => {
            if request.data.is_empty() {
                return Err(BuildError::InvalidRecipient(
                    "contract creation requires init code".to_string(),
                ));
            }
            Ok(None)
        }
        (None, false) => Err(BuildError::InvalidRecipient("recipient is required".to_string())),
        (Some(input), false) => {
            let address =
                parse_address(input).map_err(|e| BuildError::InvalidRecipient(e.to_string()))?;
            if address.is_zero() {
                return Err(BuildError::InvalidRecipient(
                    "the zero address burns funds".to_string(),
                ));
            }
            Ok(Some(address))
        }
    }
}

/// Component-wise maximum of two fees of the same kind.
fn higher_fee(ours: Fee, market: Fee) -> Fee {
    match (ours, market) {
        (Fee::Legacy { gas_price: a }, Fee::Legacy { gas_price: b }) => Fee::Legacy {
            gas_price: a.max(b),
        },
        (
            Fee::Eip1559 {
                max_fee_per_gas: a_max,
                max_priority_fee_per_gas: a_tip,
            },
            Fee::Eip1559 {
                max_fee_per_gas: b_max,
                max_priority_fee_per_gas: b_tip,
            },
        ) => Fee::Eip1559 {
            max_fee_per_gas: a_max.max(b_max),
            max_priority_fee_per_gas: a_tip.max(b_tip),
        },
        (ours, _) => ours,
    }
}
