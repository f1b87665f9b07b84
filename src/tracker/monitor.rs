//! Polling loop that drives transaction records to a terminal status.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{TxHash, U256};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::TrackerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::pipeline::events::{EventBus, PipelineEvent};
use crate::resilience::calculate_backoff;
use crate::rpc::{ChainRpc, Receipt};
use crate::tracker::state::{unix_now, StatusChange, TransactionRecord, TxStatus};
use crate::tracker::{TrackerError, TrackerResult};

/// What one poll cycle learned from the node.
#[derive(Debug, Clone, Copy)]
enum Observation {
    Mined {
        block: u64,
        gas_used: Option<U256>,
        success: bool,
        deep_enough: bool,
    },
    Unmined {
        known: bool,
    },
}

/// Owns every transaction record of a wallet session.
pub struct TransactionTracker {
    rpc: Arc<dyn ChainRpc>,
    config: TrackerConfig,
    records: DashMap<TxHash, TransactionRecord>,
    events: EventBus,
}

impl TransactionTracker {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: TrackerConfig, events: EventBus) -> Self {
        Self {
            rpc,
            config,
            records: DashMap::new(),
            events,
        }
    }

    /// Start tracking a freshly broadcast transaction in `Submitted`.
    ///
    /// Registering a hash twice keeps the first record.
    pub fn register(&self, hash: TxHash, nonce: U256) {
        let mut inserted = false;
        self.records.entry(hash).or_insert_with(|| {
            inserted = true;
            TransactionRecord::new(hash, nonce)
        });

        if inserted {
            metrics::record_status_transition(TxStatus::Submitted.as_str());
            metrics::record_tracked_count(self.records.len());
            tracing::info!(tx_hash = %hash, nonce = %nonce, "Tracking transaction");
        }
    }

    pub fn record(&self, hash: TxHash) -> Option<TransactionRecord> {
        self.records.get(&hash).map(|r| r.clone())
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<TransactionRecord> {
        let mut all: Vec<_> = self.records.iter().map(|r| r.clone()).collect();
        all.sort_by_key(|r| (r.submitted_at, r.nonce));
        all
    }

    pub fn status(&self, hash: TxHash) -> TrackerResult<TxStatus> {
        self.records
            .get(&hash)
            .map(|r| r.status)
            .ok_or(TrackerError::UnknownTransaction(hash))
    }

    /// Run one poll cycle for `hash` and return the resulting status.
    ///
    /// Transport failures leave the record untouched.
    pub async fn poll_once(&self, hash: TxHash) -> TrackerResult<TxStatus> {
        let status = self.status(hash)?;
        if status.is_terminal() {
            return Ok(status);
        }

        let observation = match self.rpc.get_receipt(hash).await? {
            Some(Receipt {
                block_number: Some(block),
                gas_used,
                success,
                ..
            }) => {
                let head = self.rpc.get_block_number().await?;
                Observation::Mined {
                    block,
                    gas_used,
                    success,
                    deep_enough: head.saturating_sub(block) >= self.config.confirmation_blocks,
                }
            }
            _ => Observation::Unmined {
                known: self.rpc.is_transaction_known(hash).await?,
            },
        };

        self.apply(hash, observation)
    }

    fn apply(&self, hash: TxHash, observation: Observation) -> TrackerResult<TxStatus> {
        let mut changes: Vec<StatusChange> = Vec::new();

        let status = {
            let mut record = self
                .records
                .get_mut(&hash)
                .ok_or(TrackerError::UnknownTransaction(hash))?;
            record.poll_count += 1;
            record.last_checked_at = Some(unix_now());

            if record.status.is_terminal() {
                return Ok(record.status);
            }

            match observation {
                Observation::Mined {
                    block,
                    gas_used,
                    success,
                    deep_enough,
                } => {
                    record.unseen_polls = 0;
                    record.block_number = Some(block);
                    record.gas_used = gas_used;

                    if record.status == TxStatus::Submitted {
                        changes.push(record.transition(TxStatus::Pending)?);
                    }
                    if deep_enough {
                        let outcome = if success {
                            TxStatus::Confirmed
                        } else {
                            TxStatus::Failed
                        };
                        changes.push(record.transition(outcome)?);
                    } else {
                        tracing::debug!(tx_hash = %hash, block, "Waiting for confirmations");
                    }
                }
                Observation::Unmined { known } => {
                    if let Some(block) = record.block_number.take() {
                        record.gas_used = None;
                        tracing::warn!(
                            tx_hash = %hash,
                            block,
                            "Receipt disappeared, back to pending"
                        );
                    }

                    if known {
                        record.unseen_polls = 0;
                        if record.status == TxStatus::Submitted {
                            changes.push(record.transition(TxStatus::Pending)?);
                        }
                    } else {
                        record.unseen_polls += 1;
                        if record.unseen_polls >= self.config.drop_after_polls {
                            changes.push(record.transition(TxStatus::Dropped)?);
                        }
                    }
                }
            }
            record.status
        };

        for change in changes {
            self.publish(hash, change);
        }
        Ok(status)
    }

    fn publish(&self, hash: TxHash, change: StatusChange) {
        metrics::record_status_transition(change.to.as_str());
        tracing::info!(
            tx_hash = %hash,
            from = %change.from,
            to = %change.to,
            "Transaction status changed"
        );
        self.events.publish(PipelineEvent::StatusChanged {
            hash,
            from: change.from,
            to: change.to,
        });
    }

    /// Poll `hash` with bounded exponential backoff until it is terminal or
    /// `shutdown` fires.
    pub async fn track(
        &self,
        hash: TxHash,
        mut shutdown: ShutdownSignal,
    ) -> TrackerResult<TxStatus> {
        let initial = Duration::from_millis(self.config.poll_initial_ms);
        let max = Duration::from_millis(self.config.poll_max_ms);
        let mut attempt: u32 = 1;

        loop {
            let delay = calculate_backoff(attempt, initial, max);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::debug!(tx_hash = %hash, "Tracking stopped by shutdown");
                    return self.status(hash);
                }
            }

            match self.poll_once(hash).await {
                Ok(status) if status.is_terminal() => return Ok(status),
                Ok(_) => {}
                Err(TrackerError::Rpc(e)) => {
                    tracing::warn!(tx_hash = %hash, error = %e, "Status poll failed, will retry");
                }
                Err(e) => return Err(e),
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Run [`track`](Self::track) as a background task.
    pub fn spawn(
        self: &Arc<Self>,
        hash: TxHash,
        shutdown: ShutdownSignal,
    ) -> JoinHandle<TrackerResult<TxStatus>> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move { tracker.track(hash, shutdown).await })
    }
}

impl std::fmt::Debug for TransactionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionTracker")
            .field("config", &self.config)
            .field("tracked", &self.records.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::rpc::mock::MockChain;
    use crate::rpc::RpcError;

    fn config() -> TrackerConfig {
        TrackerConfig {
            poll_initial_ms: 100,
            poll_max_ms: 1_000,
            confirmation_blocks: 3,
            drop_after_polls: 3,
        }
    }

    fn setup() -> (Arc<MockChain>, Arc<TransactionTracker>, EventBus) {
        let chain = Arc::new(MockChain::new(1));
        let events = EventBus::new();
        let tracker = Arc::new(TransactionTracker::new(chain.clone(), config(), events.clone()));
        (chain, tracker, events)
    }

    fn hash(byte: u8) -> TxHash {
        TxHash::repeat_byte(byte)
    }

    #[tokio::test]
    async fn test_confirmation_after_depth() {
        let (chain, tracker, events) = setup();
        let mut rx = events.subscribe();
        tracker.register(hash(1), U256::ZERO);

        chain.mark_known(hash(1));
        assert_eq!(tracker.poll_once(hash(1)).await.unwrap(), TxStatus::Pending);

        chain.mine(hash(1), true);
        assert_eq!(tracker.poll_once(hash(1)).await.unwrap(), TxStatus::Pending);
        chain.advance_blocks(2);
        assert_eq!(tracker.poll_once(hash(1)).await.unwrap(), TxStatus::Pending);
        chain.advance_blocks(1);
        assert_eq!(tracker.poll_once(hash(1)).await.unwrap(), TxStatus::Confirmed);

        let record = tracker.record(hash(1)).unwrap();
        assert_eq!(record.block_number, Some(100));
        assert_eq!(record.gas_used, Some(U256::from(21_000u64)));
        assert_eq!(record.poll_count, 4);
        assert_eq!(record.history.len(), 2);

        assert_eq!(
            rx.recv().await.unwrap(),
            PipelineEvent::StatusChanged {
                hash: hash(1),
                from: TxStatus::Submitted,
                to: TxStatus::Pending
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PipelineEvent::StatusChanged {
                hash: hash(1),
                from: TxStatus::Pending,
                to: TxStatus::Confirmed
            }
        );
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails_after_depth() {
        let (chain, tracker, _) = setup();
        tracker.register(hash(2), U256::ZERO);
        chain.mine(hash(2), false);

        assert_eq!(tracker.poll_once(hash(2)).await.unwrap(), TxStatus::Pending);
        chain.advance_blocks(3);
        assert_eq!(tracker.poll_once(hash(2)).await.unwrap(), TxStatus::Failed);

        // Terminal records are not polled again.
        chain.unmine(hash(2));
        assert_eq!(tracker.poll_once(hash(2)).await.unwrap(), TxStatus::Failed);
    }

    #[tokio::test]
    async fn test_reorged_receipt_returns_to_pending() {
        let (chain, tracker, _) = setup();
        tracker.register(hash(3), U256::ZERO);

        chain.mine(hash(3), true);
        tracker.poll_once(hash(3)).await.unwrap();
        assert_eq!(tracker.record(hash(3)).unwrap().block_number, Some(100));

        chain.unmine(hash(3));
        assert_eq!(tracker.poll_once(hash(3)).await.unwrap(), TxStatus::Pending);
        assert_eq!(tracker.record(hash(3)).unwrap().block_number, None);

        chain.set_block_number(105);
        chain.mine(hash(3), true);
        chain.advance_blocks(3);
        assert_eq!(tracker.poll_once(hash(3)).await.unwrap(), TxStatus::Confirmed);
        assert_eq!(tracker.record(hash(3)).unwrap().block_number, Some(105));
    }

    #[tokio::test]
    async fn test_unknown_hash_is_dropped() {
        let (chain, tracker, _) = setup();
        tracker.register(hash(4), U256::ZERO);
        chain.forget(hash(4));

        assert_eq!(tracker.poll_once(hash(4)).await.unwrap(), TxStatus::Submitted);
        assert_eq!(tracker.poll_once(hash(4)).await.unwrap(), TxStatus::Submitted);
        assert_eq!(tracker.poll_once(hash(4)).await.unwrap(), TxStatus::Dropped);
    }

    #[tokio::test]
    async fn test_poll_failure_leaves_record_untouched() {
        let (chain, tracker, _) = setup();
        tracker.register(hash(5), U256::ZERO);
        chain.fail_next(
            "eth_getTransactionReceipt",
            RpcError::ConnectionFailed {
                method: "eth_getTransactionReceipt",
                timed_out: true,
                reason: "timed out".into(),
            },
        );

        assert!(matches!(tracker.poll_once(hash(5)).await, Err(TrackerError::Rpc(_))));
        let record = tracker.record(hash(5)).unwrap();
        assert_eq!(record.status, TxStatus::Submitted);
        assert_eq!(record.poll_count, 0);
    }

    #[tokio::test]
    async fn test_unregistered_hash() {
        let (_, tracker, _) = setup();
        assert_eq!(
            tracker.poll_once(hash(9)).await,
            Err(TrackerError::UnknownTransaction(hash(9)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_survives_transport_errors() {
        let (chain, tracker, _) = setup();
        tracker.register(hash(6), U256::ZERO);
        chain.mine(hash(6), true);
        chain.advance_blocks(3);
        for _ in 0..3 {
            chain.fail_next(
                "eth_getTransactionReceipt",
                RpcError::ConnectionFailed {
                    method: "eth_getTransactionReceipt",
                    timed_out: false,
                    reason: "connection refused".into(),
                },
            );
        }

        let shutdown = Shutdown::new();
        let status = tracker.spawn(hash(6), shutdown.subscribe()).await.unwrap().unwrap();
        assert_eq!(status, TxStatus::Confirmed);
        assert_eq!(tracker.record(hash(6)).unwrap().poll_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_stops_on_shutdown() {
        let (chain, tracker, _) = setup();
        tracker.register(hash(7), U256::ZERO);
        chain.mark_known(hash(7));

        let shutdown = Shutdown::new();
        let handle = tracker.spawn(hash(7), shutdown.subscribe());
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.trigger();

        assert_eq!(handle.await.unwrap().unwrap(), TxStatus::Pending);
        assert!(tracker.record(hash(7)).unwrap().poll_count >= 3);
    }
}
