//! Chain events published to external subscribers.

use {
    crossbeam_channel::{bounded, Receiver, Sender, TrySendError},
    log::*,
    std::sync::atomic::{AtomicU64, Ordering},
    strata_sdk::{block::BlockId, receipt::ContractResult, transaction::TransactionId},
};

pub const DEFAULT_TRIGGER_CAPACITY: usize = 1_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    BlockApplied {
        id: BlockId,
        transaction_count: usize,
    },
    TransactionApplied {
        id: TransactionId,
        block_number: u64,
        result: ContractResult,
    },
    /// The last irreversible block moved forward.
    Solidified { last_irreversible: u64 },
}

pub trait TriggerSink: Send + Sync {
    /// Publishes without blocking; a sink may drop what it cannot take.
    fn offer(&self, trigger: Trigger);
}

/// Bounded channel sink. A full channel drops the trigger.
pub struct ChannelTriggerSink {
    sender: Sender<Trigger>,
    dropped: AtomicU64,
}

impl ChannelTriggerSink {
    pub fn new(capacity: usize) -> (Self, Receiver<Trigger>) {
        let (sender, receiver) = bounded(capacity);
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TriggerSink for ChannelTriggerSink {
    fn offer(&self, trigger: Trigger) {
        match self.sender.try_send(trigger) {
            Ok(()) => (),
            Err(TrySendError::Full(trigger)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("trigger queue full, dropping {:?}", trigger);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("trigger receiver gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, strata_sdk::hash::Hash};

    #[test]
    fn test_full_channel_drops() {
        let (sink, receiver) = ChannelTriggerSink::new(1);
        let first = Trigger::Solidified {
            last_irreversible: 1,
        };
        sink.offer(first.clone());
        sink.offer(Trigger::BlockApplied {
            id: BlockId::new(2, Hash::new_unique()),
            transaction_count: 0,
        });
        assert_eq!(sink.dropped_count(), 1);
        assert_eq!(receiver.try_recv(), Ok(first));
        assert!(receiver.try_recv().is_err());
    }
}
