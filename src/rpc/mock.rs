//! In-memory `ChainRpc` for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::rpc::types::{CallRequest, Receipt};
use crate::rpc::{ChainRpc, RpcError, RpcResult};
use crate::transaction::SignedTransaction;

#[derive(Debug, Default)]
struct State {
    chain_id: u64,
    block_number: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
    gas_price: U256,
    priority_fee: U256,
    gas_estimate: U256,
    receipts: HashMap<TxHash, Receipt>,
    known: HashSet<TxHash>,
    broadcasts: Vec<SignedTransaction>,
    /// Errors returned by the next calls to the named method, in order.
    failures: HashMap<&'static str, VecDeque<RpcError>>,
    /// Accept the broadcast but report a timeout to the caller.
    swallow_broadcast_response: bool,
}

/// Scriptable chain. Every method is synchronous under the hood.
#[derive(Debug)]
pub(crate) struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub(crate) fn new(chain_id: u64) -> Self {
        Self {
            state: Mutex::new(State {
                chain_id,
                block_number: 100,
                gas_price: U256::from(20_000_000_000u64),
                priority_fee: U256::from(1_000_000_000u64),
                gas_estimate: U256::from(21_000u64),
                ..Default::default()
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    fn take_failure(&self, method: &'static str) -> RpcResult<()> {
        self.with(|s| match s.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        })
    }

    pub(crate) fn set_balance(&self, address: Address, balance: U256) {
        self.with(|s| s.balances.insert(address, balance));
    }

    pub(crate) fn set_nonce(&self, address: Address, nonce: u64) {
        self.with(|s| s.nonces.insert(address, U256::from(nonce)));
    }

    pub(crate) fn set_gas_price(&self, wei: U256) {
        self.with(|s| s.gas_price = wei);
    }

    pub(crate) fn set_gas_estimate(&self, gas: u64) {
        self.with(|s| s.gas_estimate = U256::from(gas));
    }

    pub(crate) fn set_block_number(&self, block: u64) {
        self.with(|s| s.block_number = block);
    }

    pub(crate) fn advance_blocks(&self, blocks: u64) {
        self.with(|s| s.block_number += blocks);
    }

    pub(crate) fn block_number(&self) -> u64 {
        self.with(|s| s.block_number)
    }

    /// Mine `hash` in the current block.
    pub(crate) fn mine(&self, hash: TxHash, success: bool) {
        self.with(|s| {
            let receipt = Receipt {
                transaction_hash: hash,
                block_number: Some(s.block_number),
                gas_used: Some(U256::from(21_000u64)),
                success,
            };
            s.known.insert(hash);
            s.receipts.insert(hash, receipt);
        });
    }

    /// Reorg `hash` out: the node still knows it but has no receipt.
    pub(crate) fn unmine(&self, hash: TxHash) {
        self.with(|s| s.receipts.remove(&hash));
    }

    pub(crate) fn mark_known(&self, hash: TxHash) {
        self.with(|s| s.known.insert(hash));
    }

    pub(crate) fn forget(&self, hash: TxHash) {
        self.with(|s| {
            s.known.remove(&hash);
            s.receipts.remove(&hash);
        });
    }

    pub(crate) fn fail_next(&self, method: &'static str, err: RpcError) {
        self.with(|s| s.failures.entry(method).or_default().push_back(err));
    }

    pub(crate) fn swallow_broadcast_response(&self, enabled: bool) {
        self.with(|s| s.swallow_broadcast_response = enabled);
    }

    pub(crate) fn broadcast_count(&self) -> usize {
        self.with(|s| s.broadcasts.len())
    }

    pub(crate) fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.with(|s| s.broadcasts.clone())
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn get_chain_id(&self) -> RpcResult<u64> {
        self.take_failure("eth_chainId")?;
        Ok(self.with(|s| s.chain_id))
    }

    async fn get_block_number(&self) -> RpcResult<u64> {
        self.take_failure("eth_blockNumber")?;
        Ok(self.with(|s| s.block_number))
    }

    async fn get_balance(&self, address: Address) -> RpcResult<U256> {
        self.take_failure("eth_getBalance")?;
        Ok(self.with(|s| s.balances.get(&address).copied().unwrap_or_default()))
    }

    async fn get_nonce(&self, address: Address) -> RpcResult<U256> {
        self.take_failure("eth_getTransactionCount")?;
        Ok(self.with(|s| s.nonces.get(&address).copied().unwrap_or_default()))
    }

    async fn get_gas_price(&self) -> RpcResult<U256> {
        self.take_failure("eth_gasPrice")?;
        Ok(self.with(|s| s.gas_price))
    }

    async fn get_max_priority_fee(&self) -> RpcResult<U256> {
        self.take_failure("eth_maxPriorityFeePerGas")?;
        Ok(self.with(|s| s.priority_fee))
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> RpcResult<U256> {
        self.take_failure("eth_estimateGas")?;
        Ok(self.with(|s| s.gas_estimate))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> RpcResult<TxHash> {
        self.take_failure("eth_sendRawTransaction")?;
        let swallow = self.with(|s| {
            s.broadcasts.push(tx.clone());
            s.known.insert(tx.hash);
            let from = tx.tx.from;
            let next = tx.tx.nonce + U256::from(1);
            let entry = s.nonces.entry(from).or_default();
            if *entry < next {
                *entry = next;
            }
            s.swallow_broadcast_response
        });

        if swallow {
            return Err(RpcError::ConnectionFailed {
                method: "eth_sendRawTransaction",
                timed_out: true,
                reason: "timed out".to_string(),
            });
        }
        Ok(tx.hash)
    }

    async fn get_receipt(&self, hash: TxHash) -> RpcResult<Option<Receipt>> {
        self.take_failure("eth_getTransactionReceipt")?;
        Ok(self.with(|s| s.receipts.get(&hash).cloned()))
    }

    async fn is_transaction_known(&self, hash: TxHash) -> RpcResult<bool> {
        self.take_failure("eth_getTransactionByHash")?;
        Ok(self.with(|s| s.known.contains(&hash)))
    }
}
