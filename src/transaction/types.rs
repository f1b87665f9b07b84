//! Transaction data model.

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, Bytes, Signature, TxHash, B256, U256};
use serde::Serialize;

use crate::transaction::{BuildError, BuildResult};

/// One gwei in wei.
pub const GWEI: u64 = 1_000_000_000;

/// Fee fields of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fee {
    /// EIP-155 legacy pricing.
    Legacy { gas_price: U256 },
    /// EIP-1559 fee cap and tip.
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl Fee {
    /// The most the sender pays per unit of gas.
    pub fn max_price(&self) -> U256 {
        match self {
            Fee::Legacy { gas_price } => *gas_price,
            Fee::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }

    /// Every price component raised by `percent`, rounding up.
    pub fn bumped(&self, percent: u32) -> Fee {
        match *self {
            Fee::Legacy { gas_price } => Fee::Legacy {
                gas_price: add_percent(gas_price, percent),
            },
            Fee::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Fee::Eip1559 {
                max_fee_per_gas: add_percent(max_fee_per_gas, percent),
                max_priority_fee_per_gas: add_percent(max_priority_fee_per_gas, percent),
            },
        }
    }
}

/// `value * (100 + percent) / 100`, rounded up, saturating.
pub(crate) fn add_percent(value: U256, percent: u32) -> U256 {
    let hundred = U256::from(100u64);
    let scaled = value.saturating_mul(hundred + U256::from(percent));
    let (quotient, remainder) = scaled.div_rem(hundred);
    if remainder.is_zero() {
        quotient
    } else {
        quotient.saturating_add(U256::from(1u64))
    }
}

/// A fully specified transaction, ready for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedTransaction {
    pub from: Address,
    /// `None` deploys a contract.
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: U256,
    pub fee: Fee,
    pub nonce: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

impl UnsignedTransaction {
    /// Worst-case cost: `value + gas_limit * max_price`.
    pub fn max_cost(&self) -> U256 {
        self.value
            .saturating_add(self.gas_limit.saturating_mul(self.fee.max_price()))
    }
}

/// A signed transaction. Built once by the signer and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: UnsignedTransaction,
    pub signature: Signature,
    /// Digest the signature commits to.
    pub signing_hash: B256,
    /// keccak256 of `raw`.
    pub hash: TxHash,
    /// EIP-2718 encoding sent with `eth_sendRawTransaction`.
    pub raw: Bytes,
}

impl SignedTransaction {
    /// `0x`-prefixed hex of the raw bytes.
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// What the caller asks for. Omitted fields are resolved by the builder.
#[derive(Debug, Clone, Default)]
pub struct TransactionRequest {
    /// Recipient as typed by the user; validated by the builder.
    pub to: Option<String>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<U256>,
    pub fee: Option<Fee>,
    pub nonce: Option<U256>,
    /// Deploy `data` as a contract; `to` must be absent.
    pub contract_creation: bool,
}

impl TransactionRequest {
    /// Plain value transfer.
    pub fn transfer(to: impl Into<String>, value: U256) -> Self {
        Self {
            to: Some(to.into()),
            value,
            ..Default::default()
        }
    }
}

/// What the builder knows about the sending account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    pub address: Address,
    /// Last known balance; `None` skips the balance check.
    pub balance: Option<U256>,
}

impl AccountState {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: None,
        }
    }

    pub fn with_balance(address: Address, balance: U256) -> Self {
        Self {
            address,
            balance: Some(balance),
        }
    }
}

/// Parse a decimal ether amount (`"1.5"`) into wei.
pub fn parse_amount(input: &str) -> BuildResult<U256> {
    let trimmed = input.trim();
    let invalid = |reason: &str| BuildError::InvalidAmount(format!("'{}': {}", input, reason));

    if trimmed.is_empty() {
        return Err(invalid("empty amount"));
    }
    if trimmed.starts_with('-') || trimmed.starts_with('+') {
        return Err(invalid("amount must be an unsigned number"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid("not a decimal number"));
    }
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > 18 {
            return Err(invalid("more than 18 decimal places"));
        }
    }

    parse_ether(trimmed).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1").unwrap(), U256::from(10u64).pow(U256::from(18)));
        assert_eq!(parse_amount("0.5").unwrap(), U256::from(500_000_000_000_000_000u64));
        assert_eq!(parse_amount("0").unwrap(), U256::ZERO);
        assert_eq!(parse_amount("0.000000000000000001").unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(matches!(parse_amount("-1"), Err(BuildError::InvalidAmount(_))));
        assert!(matches!(parse_amount(""), Err(BuildError::InvalidAmount(_))));
        assert!(matches!(parse_amount("1e18"), Err(BuildError::InvalidAmount(_))));
        assert!(matches!(
            parse_amount("0.0000000000000000001"),
            Err(BuildError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_add_percent_rounds_up() {
        assert_eq!(add_percent(U256::from(100u64), 10), U256::from(110u64));
        assert_eq!(add_percent(U256::from(15u64), 10), U256::from(17u64));
        assert_eq!(add_percent(U256::ZERO, 50), U256::ZERO);
    }

    #[test]
    fn test_fee_bump() {
        let fee = Fee::Eip1559 {
            max_fee_per_gas: U256::from(200u64),
            max_priority_fee_per_gas: U256::from(10u64),
        };
        assert_eq!(
            fee.bumped(10),
            Fee::Eip1559 {
                max_fee_per_gas: U256::from(220u64),
                max_priority_fee_per_gas: U256::from(11u64),
            }
        );
        assert_eq!(fee.max_price(), U256::from(200u64));
    }
}
