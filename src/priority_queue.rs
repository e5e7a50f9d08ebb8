//! Binary min-heap of service requests ordered by urgency.
//!
//! Priorities are recomputed from the stored record on every comparison, so
//! status, category and age changes show up without a reindex step. An
//! id → slot map is kept in step with every swap, which makes removal and
//! priority updates O(log n) instead of a linear scan.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::priority::{is_closed, is_urgent, labels_match, priority_score};
use crate::request::ServiceRequest;

#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    heap: Vec<ServiceRequest>,
    positions: HashMap<u64, usize>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
    }

    pub fn contains(&self, id: u64) -> bool {
        self.positions.contains_key(&id)
    }

    /// Heap array in storage order.
    pub fn as_slice(&self) -> &[ServiceRequest] {
        &self.heap
    }

    /// Ordering key; the id only breaks exact score ties.
    fn key(&self, index: usize, now: DateTime<Utc>) -> (i64, u64) {
        let request = &self.heap[index];
        (priority_score(request, now), request.id)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].id, a);
        self.positions.insert(self.heap[b].id, b);
    }

    fn sift_up(&mut self, mut index: usize, now: DateTime<Utc>) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.key(index, now) >= self.key(parent, now) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
        index
    }

    fn sift_down(&mut self, mut index: usize, now: DateTime<Utc>) -> usize {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;
            if left < len && self.key(left, now) < self.key(smallest, now) {
                smallest = left;
            }
            if right < len && self.key(right, now) < self.key(smallest, now) {
                smallest = right;
            }
            if smallest == index {
                return index;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }

    /// A changed priority may have to move either way.
    fn restore(&mut self, index: usize, now: DateTime<Utc>) {
        let index = self.sift_up(index, now);
        self.sift_down(index, now);
    }

    /// Adds a request. An id already queued has its record replaced and re-sifted.
    pub fn enqueue(&mut self, request: ServiceRequest) {
        if self.contains(request.id) {
            self.update_priority(request);
            return;
        }
        let index = self.heap.len();
        self.positions.insert(request.id, index);
        self.heap.push(request);
        self.sift_up(index, Utc::now());
    }

    /// Removes and returns the most urgent request.
    pub fn dequeue(&mut self) -> Result<ServiceRequest> {
        let last = self.heap.len().checked_sub(1).ok_or(EngineError::EmptyQueue)?;
        self.swap(0, last);
        let request = self.heap.pop().ok_or(EngineError::EmptyQueue)?;
        self.positions.remove(&request.id);
        if !self.heap.is_empty() {
            self.sift_down(0, Utc::now());
        }
        Ok(request)
    }

    pub fn peek(&self) -> Result<&ServiceRequest> {
        self.heap.first().ok_or(EngineError::EmptyQueue)
    }

    pub fn remove(&mut self, id: u64) -> Option<ServiceRequest> {
        let index = *self.positions.get(&id)?;
        let removed = self.heap.swap_remove(index);
        self.positions.remove(&removed.id);
        if index < self.heap.len() {
            self.positions.insert(self.heap[index].id, index);
            self.restore(index, Utc::now());
        }
        Some(removed)
    }

    /// Replaces the stored record for `request.id` and repositions it.
    ///
    /// Returns false when the id is not queued.
    pub fn update_priority(&mut self, request: ServiceRequest) -> bool {
        let Some(&index) = self.positions.get(&request.id) else {
            return false;
        };
        self.heap[index] = request;
        self.restore(index, Utc::now());
        true
    }

    /// Replaces the contents with `items` using bottom-up heapify.
    ///
    /// Later records win when ids repeat.
    pub fn build_heap(&mut self, items: impl IntoIterator<Item = ServiceRequest>) {
        self.clear();
        for request in items {
            match self.positions.get(&request.id) {
                Some(&index) => self.heap[index] = request,
                None => {
                    self.positions.insert(request.id, self.heap.len());
                    self.heap.push(request);
                }
            }
        }
        let now = Utc::now();
        for index in (0..self.heap.len() / 2).rev() {
            self.sift_down(index, now);
        }
    }

    /// The `n` most urgent requests, most urgent first. The queue is untouched.
    pub fn top_priority(&self, n: usize) -> Vec<ServiceRequest> {
        let mut scratch = self.clone();
        let mut out = Vec::with_capacity(n.min(self.len()));
        while out.len() < n {
            match scratch.dequeue() {
                Ok(request) => out.push(request),
                Err(_) => break,
            }
        }
        out
    }

    fn sorted_by_priority<'a>(&'a self, keep: impl Fn(&ServiceRequest) -> bool) -> Vec<&'a ServiceRequest> {
        let now = Utc::now();
        let mut out: Vec<&ServiceRequest> = self.heap.iter().filter(|r| keep(r)).collect();
        out.sort_by_key(|r| (priority_score(r, now), r.id));
        out
    }

    /// Critical, Urgent and High requests in priority order.
    pub fn urgent_requests(&self) -> Vec<&ServiceRequest> {
        self.sorted_by_priority(|r| is_urgent(&r.status))
    }

    /// Open requests older than `max_days`, oldest first.
    pub fn overdue_requests(&self, max_days: i64) -> Vec<&ServiceRequest> {
        let now = Utc::now();
        let mut out: Vec<&ServiceRequest> = self
            .heap
            .iter()
            .filter(|r| !is_closed(&r.status) && r.age_days(now) > max_days)
            .collect();
        out.sort_by_key(|r| (r.submitted_at, r.id));
        out
    }

    pub fn by_status(&self, status: &str) -> Vec<&ServiceRequest> {
        self.sorted_by_priority(|r| labels_match(&r.status, status))
    }

    pub fn by_service_type(&self, service_type: &str) -> Vec<&ServiceRequest> {
        self.sorted_by_priority(|r| labels_match(&r.service_type, service_type))
    }

    /// Checks the heap property and the id → slot map.
    pub fn is_valid_heap(&self) -> bool {
        let now = Utc::now();
        let ordered = (1..self.heap.len()).all(|child| {
            let parent = (child - 1) / 2;
            priority_score(&self.heap[parent], now) <= priority_score(&self.heap[child], now)
        });
        let indexed = self.positions.len() == self.heap.len()
            && self
                .heap
                .iter()
                .enumerate()
                .all(|(index, r)| self.positions.get(&r.id) == Some(&index));
        ordered && indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const STATUSES: [&str; 8] = [
        "Critical", "Urgent", "High", "In Process", "Pending", "Low", "Completed", "Cancelled",
    ];

    fn request(id: u64, status: &str) -> ServiceRequest {
        ServiceRequest::new(id, "Plumbing", status)
    }

    #[test]
    fn test_dequeue_follows_status_order() {
        let mut queue = PriorityQueue::new();
        for (id, status) in [(1, "Critical"), (2, "Pending"), (3, "Completed"), (4, "Urgent"), (5, "Low")] {
            queue.enqueue(request(id, status));
        }
        let order: Vec<u64> = std::iter::from_fn(|| queue.dequeue().ok()).map(|r| r.id).collect();
        assert_eq!(order, vec![1, 4, 2, 5, 3]);
    }

    #[test]
    fn test_empty_queue_errors() {
        let mut queue = PriorityQueue::new();
        assert!(matches!(queue.peek(), Err(EngineError::EmptyQueue)));
        assert!(matches!(queue.dequeue(), Err(EngineError::EmptyQueue)));
    }

    #[test]
    fn test_older_request_surfaces_first_on_ties() {
        let now = Utc::now();
        let mut queue = PriorityQueue::new();
        queue.enqueue(request(1, "Pending").submitted(now));
        queue.enqueue(request(2, "Pending").submitted(now - Duration::days(12)));
        assert_eq!(queue.peek().map(|r| r.id).ok(), Some(2));
    }

    #[test]
    fn test_update_priority_moves_both_ways() {
        let mut queue = PriorityQueue::new();
        queue.build_heap((1..=6).map(|id| request(id, "Pending")));

        assert!(queue.update_priority(request(5, "Critical")));
        assert_eq!(queue.peek().map(|r| r.id).ok(), Some(5));

        assert!(queue.update_priority(request(5, "Cancelled")));
        assert_ne!(queue.peek().map(|r| r.id).ok(), Some(5));
        assert!(queue.is_valid_heap());
        assert!(!queue.update_priority(request(42, "Critical")));
    }

    #[test]
    fn test_enqueue_existing_id_replaces() {
        let mut queue = PriorityQueue::new();
        queue.enqueue(request(1, "Low"));
        queue.enqueue(request(1, "Critical"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().map(|r| r.status.clone()).ok(), Some("Critical".to_string()));
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = PriorityQueue::new();
        queue.build_heap((1..=8).map(|id| request(id, STATUSES[(id as usize) % 8])));
        assert_eq!(queue.remove(3).map(|r| r.id), Some(3));
        assert!(queue.remove(3).is_none());
        assert_eq!(queue.len(), 7);
        assert!(!queue.contains(3));
        assert!(queue.is_valid_heap());
    }

    #[test]
    fn test_random_operations_keep_heap_property() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = PriorityQueue::new();
        for step in 0..1_500u64 {
            let id = rng.gen_range(0..200);
            let status = STATUSES[rng.gen_range(0..STATUSES.len())];
            match rng.gen_range(0..4) {
                0 => queue.enqueue(request(id, status)),
                1 => {
                    queue.update_priority(request(id, status));
                }
                2 => {
                    queue.remove(id);
                }
                _ => {
                    let _ = queue.dequeue();
                }
            }
            if step % 100 == 0 {
                assert!(queue.is_valid_heap(), "heap broken at step {}", step);
            }
        }
        assert!(queue.is_valid_heap());
    }

    #[test]
    fn test_read_views_do_not_mutate() {
        let now = Utc::now();
        let mut queue = PriorityQueue::new();
        queue.build_heap(vec![
            request(1, "Low").submitted(now - Duration::days(40)),
            request(2, "Critical"),
            request(3, "Completed").submitted(now - Duration::days(90)),
            request(4, "High").submitted(now - Duration::days(20)),
            ServiceRequest::new(5, "HVAC", "Urgent"),
        ]);
        let before: Vec<u64> = queue.as_slice().iter().map(|r| r.id).collect();

        let top: Vec<u64> = queue.top_priority(3).into_iter().map(|r| r.id).collect();
        assert_eq!(top, vec![2, 5, 4]);
        let urgent: Vec<u64> = queue.urgent_requests().into_iter().map(|r| r.id).collect();
        assert_eq!(urgent, vec![2, 5, 4]);
        let overdue: Vec<u64> = queue.overdue_requests(14).into_iter().map(|r| r.id).collect();
        assert_eq!(overdue, vec![1, 4]);
        assert_eq!(queue.by_status("critical").len(), 1);
        assert_eq!(queue.by_service_type("hvac").len(), 1);

        let after: Vec<u64> = queue.as_slice().iter().map(|r| r.id).collect();
        assert_eq!(before, after);
        assert_eq!(queue.top_priority(10).len(), 5);
    }
}
