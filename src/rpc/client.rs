//! Blockchain RPC client with rate limiting, timeouts and error classification.
//!
//! # Responsibilities
//! - Connect to one JSON-RPC endpoint
//! - Query chain state (nonce, balance, gas, receipts)
//! - Broadcast raw transactions
//! - Classify failures into transport errors and node rejections

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;
use tokio::time::timeout;

use crate::config::{RateLimitConfig, RpcConfig};
use crate::observability::metrics;
use crate::rpc::rate_limit::RateLimiter;
use crate::rpc::types::{CallRequest, RawReceipt, Receipt, RejectionKind};
use crate::rpc::{ChainRpc, RpcError, RpcResult};
use crate::transaction::SignedTransaction;

const SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// Rate-limited JSON-RPC client for a single endpoint.
///
/// Clones share the provider connection pool and the token bucket.
#[derive(Clone)]
pub struct RpcClient {
    provider: RootProvider,
    config: RpcConfig,
    limiter: Arc<RateLimiter>,
    timeout_duration: Duration,
}

impl RpcClient {
    /// Create a client without touching the network.
    pub fn new(config: RpcConfig, rate_limit: &RateLimitConfig) -> RpcResult<Self> {
        let url: url::Url =
            config
                .url
                .parse()
                .map_err(|e: url::ParseError| RpcError::InvalidEndpoint {
                    url: config.url.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            provider: RootProvider::new_http(url),
            timeout_duration: Duration::from_millis(config.request_timeout_ms),
            limiter: Arc::new(RateLimiter::new(rate_limit)),
            config,
        })
    }

    /// Create a client and check the endpoint's chain ID.
    ///
    /// An unreachable endpoint is logged, not fatal; a wrong chain is fatal.
    pub async fn connect(config: RpcConfig, rate_limit: &RateLimitConfig) -> RpcResult<Self> {
        let client = Self::new(config, rate_limit)?;

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %client.config.url,
                    chain_id = client.config.chain_id,
                    "RPC client initialized"
                );
            }
            Err(e @ RpcError::ChainMismatch { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "RPC client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> RpcResult<()> {
        let actual = self.get_chain_id().await?;
        if actual != self.config.chain_id {
            return Err(RpcError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Check if the endpoint answers at all.
    pub async fn is_healthy(&self) -> bool {
        self.get_block_number().await.is_ok()
    }

    /// Take a token, then run `request` under the configured deadline.
    async fn call<T, R>(&self, method: &'static str, request: R) -> RpcResult<T>
    where
        R: IntoFuture<Output = Result<T, TransportError>>,
    {
        self.limiter.acquire(method)?;

        match timeout(self.timeout_duration, request).await {
            Ok(Ok(value)) => {
                metrics::record_rpc_call(method, "ok");
                Ok(value)
            }
            Ok(Err(e)) => {
                metrics::record_rpc_call(method, "error");
                let err = classify(method, e);
                tracing::debug!(method, error = %err, "RPC call failed");
                Err(err)
            }
            Err(_) => {
                metrics::record_rpc_call(method, "timeout");
                tracing::warn!(
                    method,
                    timeout_ms = self.timeout_duration.as_millis() as u64,
                    "RPC timeout"
                );
                Err(RpcError::ConnectionFailed {
                    method,
                    timed_out: true,
                    reason: format!("timed out after {} ms", self.timeout_duration.as_millis()),
                })
            }
        }
    }
}

/// Split alloy errors into node rejections and transport failures.
fn classify(method: &'static str, err: TransportError) -> RpcError {
    if let Some(payload) = err.as_error_resp() {
        let message = payload.message.to_string();
        if method == SEND_RAW_TRANSACTION {
            return RpcError::TransactionRejected {
                kind: RejectionKind::classify(&message),
                code: payload.code,
                reason: message,
            };
        }
        return RpcError::Response {
            method,
            code: payload.code,
            message,
        };
    }

    RpcError::ConnectionFailed {
        method,
        timed_out: false,
        reason: err.to_string(),
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn get_chain_id(&self) -> RpcResult<u64> {
        self.call("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn get_block_number(&self) -> RpcResult<u64> {
        self.call("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn get_balance(&self, address: Address) -> RpcResult<U256> {
        self.call("eth_getBalance", self.provider.get_balance(address)).await
    }

    async fn get_nonce(&self, address: Address) -> RpcResult<U256> {
        let count = self
            .call(
                "eth_getTransactionCount",
                self.provider.get_transaction_count(address).pending(),
            )
            .await?;
        Ok(U256::from(count))
    }

    async fn get_gas_price(&self) -> RpcResult<U256> {
        let price = self.call("eth_gasPrice", self.provider.get_gas_price()).await?;
        Ok(U256::from(price))
    }

    async fn get_max_priority_fee(&self) -> RpcResult<U256> {
        let tip = self
            .call(
                "eth_maxPriorityFeePerGas",
                self.provider.get_max_priority_fee_per_gas(),
            )
            .await?;
        Ok(U256::from(tip))
    }

    async fn estimate_gas(&self, call: &CallRequest) -> RpcResult<U256> {
        let request: TransactionRequest = call.into();
        let gas = self
            .call("eth_estimateGas", self.provider.estimate_gas(request))
            .await?;
        Ok(U256::from(gas))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> RpcResult<TxHash> {
        let result = self
            .call(
                SEND_RAW_TRANSACTION,
                self.provider.send_raw_transaction(&tx.raw),
            )
            .await;

        match result {
            Ok(pending) => {
                let node_hash = *pending.tx_hash();
                if node_hash != tx.hash {
                    metrics::record_broadcast("hash_mismatch");
                    return Err(RpcError::InvalidResponse {
                        method: SEND_RAW_TRANSACTION,
                        reason: format!("node returned hash {} for {}", node_hash, tx.hash),
                    });
                }
                metrics::record_broadcast("accepted");
                tracing::info!(tx_hash = %tx.hash, "Transaction broadcast");
                Ok(node_hash)
            }
            Err(RpcError::TransactionRejected {
                kind: RejectionKind::AlreadyKnown,
                ..
            }) => {
                metrics::record_broadcast("already_known");
                tracing::debug!(tx_hash = %tx.hash, "Node already has transaction");
                Ok(tx.hash)
            }
            Err(e) => {
                metrics::record_broadcast("failed");
                Err(e)
            }
        }
    }

    async fn get_receipt(&self, hash: TxHash) -> RpcResult<Option<Receipt>> {
        let raw: Option<RawReceipt> = self
            .call(
                "eth_getTransactionReceipt",
                self.provider
                    .raw_request("eth_getTransactionReceipt".into(), (hash,)),
            )
            .await?;
        Ok(raw.map(|r| r.into_receipt(hash)))
    }

    async fn is_transaction_known(&self, hash: TxHash) -> RpcResult<bool> {
        let tx: Option<serde_json::Value> = self
            .call(
                "eth_getTransactionByHash",
                self.provider
                    .raw_request("eth_getTransactionByHash".into(), (hash,)),
            )
            .await?;
        Ok(tx.is_some())
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("rpc_url", &self.config.url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_ms", &self.config.request_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RpcConfig {
        RpcConfig {
            // Nothing listens on port 1.
            url: "http://127.0.0.1:1".to_string(),
            chain_id: 31337,
            request_timeout_ms: 500,
        }
    }

    #[test]
    fn test_invalid_url() {
        let config = RpcConfig {
            url: "not a url".to_string(),
            ..test_config()
        };
        let err = RpcClient::new(config, &RateLimitConfig::default()).unwrap_err();
        assert!(matches!(err, RpcError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_connect_tolerates_unreachable_endpoint() {
        let result = RpcClient::connect(test_config(), &RateLimitConfig::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let client = RpcClient::new(test_config(), &RateLimitConfig::default()).unwrap();
        let err = client.get_block_number().await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionFailed { method: "eth_blockNumber", .. }));
        assert!(!client.is_healthy().await);
    }
}
