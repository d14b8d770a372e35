use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::Task;
use crate::ledger::{FjallStore, LedgerError};

/// Durable-enqueue-then-dispatch broker: persists a [`Task`] to the ledger
/// (so it survives a crash before any worker claims it), then hands its
/// taskId to one of N worker slot channels, round-robin.
///
/// The broker is not itself a task; it's a struct with methods called
/// synchronously from API handlers. Distribution is durability-over-
/// promptness: a closed worker channel does not fail the admission, since
/// the task is already safe in the ledger and any slot can later pick it
/// up by scanning for waiting jobs.
pub struct TaskBroker {
    store: Arc<FjallStore>,
    slot_channels: Vec<mpsc::Sender<String>>,
    next_slot: AtomicUsize,
}

impl TaskBroker {
    pub fn new(
        store: Arc<FjallStore>,
        num_slots: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<String>>) {
        info!(num_slots, channel_size, "creating task broker with worker slot channels");

        let mut slot_channels = Vec::with_capacity(num_slots);
        let mut slot_receivers = Vec::with_capacity(num_slots);

        for slot_id in 0..num_slots {
            let (tx, rx) = mpsc::channel(channel_size);
            slot_channels.push(tx);
            slot_receivers.push(rx);
            debug!(slot_id, "created worker slot channel");
        }

        let broker = Self {
            store,
            slot_channels,
            next_slot: AtomicUsize::new(0),
        };

        (broker, slot_receivers)
    }

    /// Persists `task` to the ledger and dispatches its taskId to a slot.
    /// Returns the taskId unconditionally: the task is durable even if
    /// every slot channel happens to be closed at the moment of dispatch.
    pub async fn enqueue(&self, task: Task) -> Result<String, LedgerError> {
        let task_id = task.task_id.clone();
        self.store.enqueue(task)?;

        let slot_idx = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.slot_channels.len();

        match self.slot_channels[slot_idx].send(task_id.clone()).await {
            Ok(_) => debug!(task_id = %task_id, slot_idx, "task dispatched to slot"),
            Err(_) => warn!(
                task_id = %task_id,
                slot_idx,
                "slot channel closed; task remains durable in the ledger"
            ),
        }

        Ok(task_id)
    }

    pub fn num_slots(&self) -> usize {
        self.slot_channels.len()
    }

    pub fn health_check(&self) -> bool {
        self.slot_channels.iter().all(|ch| !ch.is_closed())
    }
}
