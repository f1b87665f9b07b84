//! Discrete wallet events delivered over a broadcast channel.

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::tracker::TxStatus;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A raw transaction was accepted by the node.
    Submitted { hash: TxHash, from: Address, nonce: U256 },
    StatusChanged {
        hash: TxHash,
        from: TxStatus,
        to: TxStatus,
    },
    BalanceRefreshed { address: Address, balance: U256 },
}

/// Fan-out of pipeline events. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Deliver `event` to current subscribers; dropped when there are none.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let event = PipelineEvent::BalanceRefreshed {
            address: Address::ZERO,
            balance: U256::from(5u64),
        };
        bus.publish(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        EventBus::new().publish(PipelineEvent::BalanceRefreshed {
            address: Address::ZERO,
            balance: U256::ZERO,
        });
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(PipelineEvent::StatusChanged {
            hash: TxHash::ZERO,
            from: TxStatus::Submitted,
            to: TxStatus::Pending,
        })
        .unwrap();
        assert_eq!(json["event"], "status_changed");
        assert_eq!(json["to"], "pending");
    }
}
