//! Flush Barrier Module
//!
//! Two-state gate that holds back mutations while a snapshot is being taken.

use std::collections::{HashSet, VecDeque};

use crate::persistence::Command;

// == Flush Barrier ==
/// Open by default. While closed, mutations queue up in arrival order.
#[derive(Debug, Default)]
pub struct FlushBarrier {
    closed: bool,
    pending: VecDeque<Command>,
    /// Keys with a queued delete; their visible value is already consumed
    deleted: HashSet<String>,
}

impl FlushBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Closes the gate. Subsequent mutations must be enqueued.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Queues a mutation for replay when the gate reopens.
    pub fn enqueue(&mut self, command: Command) {
        debug_assert!(self.closed, "enqueue on an open barrier");
        if let Command::Delete { key } = &command {
            self.deleted.insert(key.clone());
        }
        self.pending.push_back(command);
    }

    /// Whether a delete of `key` is waiting for the gate to reopen.
    pub fn has_pending_delete(&self, key: &str) -> bool {
        self.deleted.contains(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Reopens the gate and hands back the queued mutations, oldest first.
    ///
    /// The caller must apply them before releasing its lock on the store.
    pub fn drain(&mut self) -> VecDeque<Command> {
        self.closed = false;
        self.deleted.clear();
        std::mem::take(&mut self.pending)
    }
}
