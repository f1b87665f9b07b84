//! Wire-facing types for the RPC layer.

use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256, U64};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use serde::Deserialize;

/// Parameters for `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    /// `None` estimates a contract deployment.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl From<&CallRequest> for TransactionRequest {
    fn from(call: &CallRequest) -> Self {
        TransactionRequest {
            from: Some(call.from),
            to: Some(match call.to {
                Some(to) => TxKind::Call(to),
                None => TxKind::Create,
            }),
            value: Some(call.value),
            input: TransactionInput::new(call.data.clone()),
            ..Default::default()
        }
    }
}

/// The parts of a transaction receipt the tracker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    /// `None` on nodes that return receipts for pending transactions.
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    /// Execution outcome; `false` for reverts and out-of-gas.
    pub success: bool,
}

/// Receipt JSON as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReceipt {
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    /// Absent on pre-Byzantium receipts, which carry a state root instead.
    #[serde(default)]
    pub status: Option<U64>,
}

impl RawReceipt {
    pub(crate) fn into_receipt(self, transaction_hash: TxHash) -> Receipt {
        Receipt {
            transaction_hash,
            block_number: self.block_number.map(|n| n.to::<u64>()),
            gas_used: self.gas_used,
            success: self.status.map(|s| s == U64::from(1)).unwrap_or(true),
        }
    }
}

/// Why a node refused a raw transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    NonceTooLow,
    NonceTooHigh,
    Underpriced,
    InsufficientFunds,
    GasLimitTooHigh,
    /// The node already has these exact bytes.
    AlreadyKnown,
    Other,
}

impl RejectionKind {
    /// Classify the free-text message nodes put in the error response.
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("already known") || message.contains("known transaction") {
            RejectionKind::AlreadyKnown
        } else if message.contains("nonce too low") {
            RejectionKind::NonceTooLow
        } else if message.contains("nonce too high") {
            RejectionKind::NonceTooHigh
        } else if message.contains("underpriced")
            || message.contains("fee too low")
            || message.contains("less than block base fee")
        {
            RejectionKind::Underpriced
        } else if message.contains("insufficient funds") {
            RejectionKind::InsufficientFunds
        } else if message.contains("exceeds block gas limit")
            || message.contains("gas limit reached")
        {
            RejectionKind::GasLimitTooHigh
        } else {
            RejectionKind::Other
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            RejectionKind::NonceTooLow => {
                "nonce already used; rebuild the transaction with a fresh nonce"
            }
            RejectionKind::NonceTooHigh => {
                "nonce leaves a gap; rebuild with the account's next nonce"
            }
            RejectionKind::Underpriced => "fee too low; rebuild with a higher gas price",
            RejectionKind::InsufficientFunds => {
                "balance cannot cover value plus gas; lower the amount"
            }
            RejectionKind::GasLimitTooHigh => "gas limit above block limit; lower the gas limit",
            RejectionKind::AlreadyKnown => "transaction already submitted",
            RejectionKind::Other => "the node rejected the transaction; review its parameters",
        }
    }
}
