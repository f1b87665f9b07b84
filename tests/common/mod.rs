//! Shared utilities for integration testing: a scriptable JSON-RPC node.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use wallet_pipeline::config::{RateLimitConfig, RpcConfig};
use wallet_pipeline::rpc::RpcClient;

#[derive(Debug, Default)]
pub struct NodeState {
    pub chain_id: u64,
    pub block_number: u64,
    pub gas_price: U256,
    pub priority_fee: U256,
    pub balances: HashMap<Address, U256>,
    pub nonces: HashMap<Address, u64>,
    /// Raw transactions accepted through `eth_sendRawTransaction`.
    pub raw_transactions: Vec<Bytes>,
    pub known: HashSet<TxHash>,
    /// Mined transactions: block number and execution status.
    pub mined: HashMap<TxHash, (u64, bool)>,
    /// Error returned by the next `eth_sendRawTransaction`; nothing is recorded.
    pub send_error: Option<(i64, String)>,
    /// Error returned by the next `eth_estimateGas`.
    pub estimate_error: Option<(i64, String)>,
    /// Per-method delay before answering.
    pub delays: HashMap<String, Duration>,
    pub calls: HashMap<String, usize>,
}

/// A mock node bound to an ephemeral local port.
#[derive(Clone)]
pub struct MockNode {
    pub url: String,
    state: Arc<Mutex<NodeState>>,
}

impl MockNode {
    pub async fn start(chain_id: u64) -> Self {
        let state = Arc::new(Mutex::new(NodeState {
            chain_id,
            block_number: 100,
            gas_price: U256::from(20_000_000_000u64),
            priority_fee: U256::from(1_000_000_000u64),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/", post(handle))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self, method: &str) -> usize {
        self.with(|s| s.calls.get(method).copied().unwrap_or(0))
    }

    pub fn mine(&self, hash: TxHash, success: bool) {
        self.with(|s| {
            let block = s.block_number;
            s.mined.insert(hash, (block, success));
        });
    }

    pub fn rpc_config(&self, chain_id: u64, timeout_ms: u64) -> RpcConfig {
        RpcConfig {
            url: self.url.clone(),
            chain_id,
            request_timeout_ms: timeout_ms,
        }
    }

    pub fn client(&self, timeout_ms: u64) -> RpcClient {
        let chain_id = self.with(|s| s.chain_id);
        let rate_limit = RateLimitConfig {
            requests_per_second: 1_000,
            burst_size: 1_000,
        };
        RpcClient::new(self.rpc_config(chain_id, timeout_ms), &rate_limit).unwrap()
    }
}

fn quantity(value: U256) -> Value {
    json!(value)
}

async fn handle(
    State(state): State<Arc<Mutex<NodeState>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();

    let (outcome, delay) = {
        let mut node = state.lock().unwrap();
        *node.calls.entry(method.clone()).or_default() += 1;
        let delay = node.delays.get(&method).copied();
        (answer(&mut node, &method, &params), delay)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    Json(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => {
            json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
        }
    })
}

fn param_address(params: &Value) -> Address {
    params[0].as_str().unwrap_or_default().parse().unwrap_or_default()
}

fn param_hash(params: &Value) -> TxHash {
    params[0].as_str().unwrap_or_default().parse().unwrap_or_default()
}

fn answer(node: &mut NodeState, method: &str, params: &Value) -> Result<Value, (i64, String)> {
    match method {
        "eth_chainId" => Ok(quantity(U256::from(node.chain_id))),
        "eth_blockNumber" => Ok(quantity(U256::from(node.block_number))),
        "eth_getBalance" => Ok(quantity(
            node.balances.get(&param_address(params)).copied().unwrap_or_default(),
        )),
        "eth_getTransactionCount" => Ok(quantity(U256::from(
            node.nonces.get(&param_address(params)).copied().unwrap_or_default(),
        ))),
        "eth_gasPrice" => Ok(quantity(node.gas_price)),
        "eth_maxPriorityFeePerGas" => Ok(quantity(node.priority_fee)),
        "eth_estimateGas" => match node.estimate_error.take() {
            Some(err) => Err(err),
            None => Ok(quantity(U256::from(21_000u64))),
        },
        "eth_sendRawTransaction" => {
            if let Some(err) = node.send_error.take() {
                return Err(err);
            }
            let raw: Bytes = params[0].as_str().unwrap_or_default().parse().unwrap_or_default();
            let hash = keccak256(&raw);
            if !node.known.insert(hash) {
                return Err((-32000, "already known".to_string()));
            }
            node.raw_transactions.push(raw);
            Ok(json!(hash))
        }
        "eth_getTransactionByHash" => {
            let hash = param_hash(params);
            if node.known.contains(&hash) {
                Ok(json!({ "hash": hash }))
            } else {
                Ok(Value::Null)
            }
        }
        "eth_getTransactionReceipt" => {
            let hash = param_hash(params);
            Ok(match node.mined.get(&hash) {
                Some(&(block, success)) => json!({
                    "transactionHash": hash,
                    "blockNumber": quantity(U256::from(block)),
                    "gasUsed": quantity(U256::from(21_000u64)),
                    "status": if success { "0x1" } else { "0x0" },
                }),
                None => Value::Null,
            })
        }
        other => Err((-32601, format!("method {} not found", other))),
    }
}
