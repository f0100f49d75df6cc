// ABOUTME: RelpBatch — a caller-facing unit of work: request frames awaiting acks, their responses, and a retry queue
// ABOUTME: Request ids here are batch-local and distinct from the session's transaction ids (see crate::window)

use crate::codec::parse_response_code;
use crate::frame::Frame;
use std::collections::{HashMap, VecDeque};

/// A batch of outbound requests and their eventual responses.
///
/// Request ids are assigned by the batch itself, starting at 1, and are
/// only meaningful within that batch — they reset for every new
/// `RelpBatch`, unlike the session's transaction ids which are never reused.
#[derive(Debug, Default)]
pub struct RelpBatch {
    next_request_id: u64,
    requests: HashMap<u64, Frame>,
    responses: HashMap<u64, Frame>,
    work_queue: VecDeque<u64>,
}

impl RelpBatch {
    pub fn new() -> Self {
        Self {
            next_request_id: 0,
            requests: HashMap::new(),
            responses: HashMap::new(),
            work_queue: VecDeque::new(),
        }
    }

    /// Convenience wrapper around [`RelpBatch::put_request`] for a plain
    /// syslog payload.
    pub fn insert(&mut self, syslog_payload: impl Into<bytes::Bytes>) -> u64 {
        self.put_request(Frame::syslog(syslog_payload))
    }

    /// Adds `frame` to the batch's requests and pushes its new request id
    /// onto the back of the work queue.
    pub fn put_request(&mut self, frame: Frame) -> u64 {
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.requests.insert(id, frame);
        self.work_queue.push_back(id);
        id
    }

    pub fn get_request(&self, id: u64) -> Option<&Frame> {
        self.requests.get(&id)
    }

    /// Removes `id` from both the requests map and the work queue (if it is
    /// still present there).
    pub fn remove_request(&mut self, id: u64) {
        self.requests.remove(&id);
        self.work_queue.retain(|&queued| queued != id);
    }

    pub fn get_response(&self, id: u64) -> Option<&Frame> {
        self.responses.get(&id)
    }

    /// Records `response` against `id`, but only if `id` still has a
    /// request on file — a response with no matching request is dropped,
    /// matching the reference batch.
    pub fn put_response(&mut self, id: u64, response: Frame) {
        if self.requests.contains_key(&id) {
            self.responses.insert(id, response);
        }
    }

    /// A transaction verifies if it has both a request and a response on
    /// file and the response's code is 200.
    pub fn verify(&self, id: u64) -> bool {
        let (Some(_request), Some(response)) = (self.requests.get(&id), self.responses.get(&id))
        else {
            tracing::debug!(request_id = id, "transaction could not be verified");
            return false;
        };
        match parse_response_code(&response.payload) {
            Ok(200) => true,
            Ok(code) => {
                tracing::debug!(request_id = id, code, "transaction returned non-200 response");
                false
            }
            Err(err) => {
                tracing::warn!(request_id = id, %err, "could not parse response code for transaction");
                false
            }
        }
    }

    /// Verifies every request currently in the batch. Returns false as soon
    /// as any one fails to verify.
    pub fn verify_all(&self) -> bool {
        self.requests.keys().all(|&id| self.verify(id))
    }

    /// Pushes `id` back onto the work queue so it is sent again, if it still
    /// has a request on file.
    pub fn retry(&mut self, id: u64) {
        if self.requests.contains_key(&id) {
            tracing::debug!(request_id = id, "retrying request");
            self.work_queue.push_back(id);
        }
    }

    /// Verifies every request and re-queues the ones that failed.
    pub fn retry_all_failed(&mut self) {
        let failed: Vec<u64> = self
            .requests
            .keys()
            .copied()
            .filter(|&id| !self.verify(id))
            .collect();
        for id in failed {
            self.retry(id);
        }
    }

    pub fn work_queue_len(&self) -> usize {
        self.work_queue.len()
    }

    /// Pops the front of the work queue. Panics if the queue is empty —
    /// callers are expected to check [`RelpBatch::work_queue_len`] first.
    pub fn pop_work_queue(&mut self) -> u64 {
        self.work_queue
            .pop_front()
            .expect("pop_work_queue() called on an empty work queue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn insert_assigns_sequential_request_ids() {
        let mut batch = RelpBatch::new();
        let a = batch.insert(Bytes::from_static(b"one"));
        let b = batch.insert(Bytes::from_static(b"two"));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(batch.work_queue_len(), 2);
    }

    #[test]
    fn pop_work_queue_is_fifo() {
        let mut batch = RelpBatch::new();
        let a = batch.insert(Bytes::from_static(b"one"));
        let b = batch.insert(Bytes::from_static(b"two"));
        assert_eq!(batch.pop_work_queue(), a);
        assert_eq!(batch.pop_work_queue(), b);
        assert_eq!(batch.work_queue_len(), 0);
    }

    #[test]
    fn verify_fails_without_response() {
        let mut batch = RelpBatch::new();
        let id = batch.insert(Bytes::from_static(b"payload"));
        assert!(!batch.verify(id));
    }

    #[test]
    fn verify_succeeds_on_200_response() {
        let mut batch = RelpBatch::new();
        let id = batch.insert(Bytes::from_static(b"payload"));
        batch.put_response(id, Frame::new(1, "rsp", Bytes::from_static(b"200 OK")));
        assert!(batch.verify(id));
    }

    #[test]
    fn verify_fails_on_non_200_response() {
        let mut batch = RelpBatch::new();
        let id = batch.insert(Bytes::from_static(b"payload"));
        batch.put_response(id, Frame::new(1, "rsp", Bytes::from_static(b"500 error")));
        assert!(!batch.verify(id));
    }

    #[test]
    fn put_response_is_dropped_without_matching_request() {
        let mut batch = RelpBatch::new();
        batch.put_response(99, Frame::new(1, "rsp", Bytes::from_static(b"200 OK")));
        assert!(batch.get_response(99).is_none());
    }

    #[test]
    fn verify_all_requires_every_transaction_to_pass() {
        let mut batch = RelpBatch::new();
        let a = batch.insert(Bytes::from_static(b"one"));
        let b = batch.insert(Bytes::from_static(b"two"));
        batch.put_response(a, Frame::new(1, "rsp", Bytes::from_static(b"200 OK")));
        batch.put_response(b, Frame::new(2, "rsp", Bytes::from_static(b"500 error")));
        assert!(!batch.verify_all());
    }

    #[test]
    fn retry_all_failed_requeues_only_unverified() {
        let mut batch = RelpBatch::new();
        let a = batch.insert(Bytes::from_static(b"one"));
        let b = batch.insert(Bytes::from_static(b"two"));
        batch.put_response(a, Frame::new(1, "rsp", Bytes::from_static(b"200 OK")));
        batch.put_response(b, Frame::new(2, "rsp", Bytes::from_static(b"500 error")));
        batch.pop_work_queue();
        batch.pop_work_queue();
        assert_eq!(batch.work_queue_len(), 0);

        batch.retry_all_failed();
        assert_eq!(batch.work_queue_len(), 1);
        assert_eq!(batch.pop_work_queue(), b);
    }

    #[test]
    fn remove_request_clears_queue_entry() {
        let mut batch = RelpBatch::new();
        let a = batch.insert(Bytes::from_static(b"one"));
        batch.insert(Bytes::from_static(b"two"));
        batch.remove_request(a);
        assert!(batch.get_request(a).is_none());
        assert_eq!(batch.work_queue_len(), 1);
    }
}
