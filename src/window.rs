// ABOUTME: Transaction window — correlates server-facing transaction ids with caller-facing request ids
// ABOUTME: A thin bijection guard: each txn id is pending for at most one request id at a time

use std::collections::HashMap;

/// Tracks which transaction ids are currently awaiting an ack, and which
/// request id each one belongs to. Not thread-safe; a [`crate::session`]
/// owns exactly one of these and drives it from a single task.
#[derive(Debug, Default)]
pub struct TransactionWindow {
    pending: HashMap<u64, u64>,
}

impl TransactionWindow {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Marks `txn_id` as pending for `request_id`. If `txn_id` was already
    /// pending for a different request, that mapping is silently overwritten
    /// and the collision is logged — the original request is effectively
    /// abandoned in the window, matching the reference window's behavior.
    pub fn put_pending(&mut self, txn_id: u64, request_id: u64) {
        if let Some(previous) = self.pending.insert(txn_id, request_id)
            && previous != request_id
        {
            tracing::warn!(
                txn_id,
                previous_request_id = previous,
                new_request_id = request_id,
                "overwriting pending request id for transaction id"
            );
        }
    }

    pub fn is_pending(&self, txn_id: u64) -> bool {
        self.pending.contains_key(&txn_id)
    }

    pub fn get_pending(&self, txn_id: u64) -> Option<u64> {
        self.pending.get(&txn_id).copied()
    }

    pub fn remove_pending(&mut self, txn_id: u64) -> Option<u64> {
        self.pending.remove(&txn_id)
    }

    pub fn size(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
