// src/sched/queue.rs

//! Rank-ordered work queue with completion acknowledgment.
//!
//! Items come out in ascending rank; equal ranks come out in push order.
//! Every pushed item must be both popped and acknowledged before
//! [`SchedulerQueue::drain`] returns, which is how the orchestrator learns
//! that all work has finished.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use crate::chain::Chain;

/// Anything the queue can order.
pub trait Ranked {
    /// Lower ranks are popped first.
    fn rank(&self) -> u64;
}

impl Ranked for Chain {
    fn rank(&self) -> u64 {
        self.rank
    }
}

/// Heap entry ordered by `(rank, seq)`, smallest first.
#[derive(Debug)]
struct Entry<T> {
    rank: u64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // `BinaryHeap` is a max-heap; reverse so the lowest (rank, seq) wins.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
struct QueueState<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
    /// Pushed but not yet acknowledged.
    unfinished: usize,
}

#[derive(Debug)]
pub struct SchedulerQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
    drained: Notify,
}

impl<T: Ranked> SchedulerQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                unfinished: 0,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.unfinished += 1;
            state.heap.push(Entry {
                rank: item.rank(),
                seq,
                item,
            });
        }
        self.available.notify_one();
    }

    /// Pop the lowest-ranked item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().heap.pop().map(|e| e.item)
    }

    /// Pop the lowest-ranked item, waiting up to `timeout` for one to arrive.
    pub async fn pop(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a push between the check
            // and the wait is not missed.
            let notified = self.available.notified();
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Mark one popped item's work as finished.
    pub fn acknowledge(&self) {
        let now_drained = {
            let mut state = self.lock();
            match state.unfinished.checked_sub(1) {
                Some(left) => {
                    state.unfinished = left;
                    left == 0
                }
                None => {
                    warn!("acknowledge called more times than items were pushed");
                    false
                }
            }
        };
        if now_drained {
            self.drained.notify_waiters();
        }
    }

    /// Remove every item still waiting in the queue and count each one as
    /// acknowledged. Items already popped still need their own
    /// acknowledgment.
    pub fn clear(&self) -> Vec<T> {
        let (removed, now_drained) = {
            let mut state = self.lock();
            let removed: Vec<T> = std::mem::take(&mut state.heap)
                .into_sorted_vec()
                .into_iter()
                .rev()
                .map(|e| e.item)
                .collect();
            state.unfinished = state.unfinished.saturating_sub(removed.len());
            (removed, state.unfinished == 0)
        };
        if now_drained {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Wait until every pushed item has been popped and acknowledged.
    pub async fn drain(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // `notify_waiters` only wakes futures that are already enabled.
            notified.as_mut().enable();
            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items waiting to be popped.
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items pushed but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Ranked> Default for SchedulerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Item(u64, &'static str);

    impl Ranked for Item {
        fn rank(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn pops_by_rank_then_insertion_order() {
        let q = SchedulerQueue::new();
        q.push(Item(5, "e"));
        q.push(Item(1, "a"));
        q.push(Item(u64::MAX, "unseen"));
        q.push(Item(1, "b"));
        q.push(Item(0, "first"));

        let order: Vec<_> = std::iter::from_fn(|| q.try_pop()).map(|i| i.1).collect();
        assert_eq!(order, vec!["first", "a", "b", "e", "unseen"]);
    }

    #[tokio::test]
    async fn pop_times_out_when_empty() {
        let q: SchedulerQueue<Item> = SchedulerQueue::new();
        let started = Instant::now();
        assert_eq!(q.pop(Duration::from_millis(50)).await, None);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let q = Arc::new(SchedulerQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push(Item(3, "late"));

        let got = waiter.await.unwrap();
        assert_eq!(got, Some(Item(3, "late")));
    }

    #[tokio::test]
    async fn drain_waits_for_acknowledgment_not_just_pop() {
        let q = Arc::new(SchedulerQueue::new());
        q.push(Item(0, "x"));
        q.push(Item(0, "y"));

        assert!(q.try_pop().is_some());
        assert!(q.try_pop().is_some());
        assert!(q.is_empty());
        assert_eq!(q.unfinished(), 2);

        let drain = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.drain().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!drain.is_finished());

        q.acknowledge();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!drain.is_finished());

        q.acknowledge();
        tokio::time::timeout(Duration::from_secs(1), drain)
            .await
            .expect("drain should return after the last acknowledgment")
            .unwrap();
    }

    #[tokio::test]
    async fn drain_on_empty_queue_returns_immediately() {
        let q: SchedulerQueue<Item> = SchedulerQueue::new();
        tokio::time::timeout(Duration::from_millis(100), q.drain())
            .await
            .expect("nothing was pushed");
    }

    #[tokio::test]
    async fn clear_counts_removed_items_as_done() {
        let q = SchedulerQueue::new();
        q.push(Item(2, "b"));
        q.push(Item(1, "a"));
        q.push(Item(3, "c"));

        let popped = q.try_pop().unwrap();
        assert_eq!(popped.1, "a");

        let removed: Vec<_> = q.clear().into_iter().map(|i| i.1).collect();
        assert_eq!(removed, vec!["b", "c"]);
        assert_eq!(q.unfinished(), 1);

        q.acknowledge();
        tokio::time::timeout(Duration::from_millis(100), q.drain())
            .await
            .expect("queue should be drained");
    }

    #[test]
    fn extra_acknowledge_does_not_underflow() {
        let q: SchedulerQueue<Item> = SchedulerQueue::new();
        q.acknowledge();
        assert_eq!(q.unfinished(), 0);
    }
}
