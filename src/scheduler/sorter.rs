//! The future-event list.
//!
//! One small candidate list per particle (every event where it is
//! primary) plus a final list for system events, under a lazy outer
//! binary heap keyed by each list's minimum. List rebuilds bump a
//! per-list stamp; popped heap entries with a stale stamp are
//! bookkeeping from an earlier rebuild and are simply discarded.

use crate::core::Event;
use ordered_float::NotNan;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    key: (NotNan<f64>, u8, u32, u32),
    idx: usize,
    stamp: u64,
}

#[derive(Debug, Default)]
pub struct FutureEventList {
    lists: Vec<Vec<Event>>,
    stamps: Vec<u64>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
}

impl FutureEventList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size for `n` particles plus the trailing system list.
    pub fn resize(&mut self, n: usize) {
        self.lists = vec![Vec::new(); n + 1];
        self.stamps = vec![0; n + 1];
        self.heap.clear();
    }

    #[inline]
    pub fn system_index(&self) -> usize {
        self.lists.len() - 1
    }

    #[inline]
    pub fn push(&mut self, idx: usize, ev: Event) {
        self.lists[idx].push(ev);
    }

    pub fn clear_list(&mut self, idx: usize) {
        self.lists[idx].clear();
        self.stamps[idx] += 1;
    }

    fn list_min(&self, idx: usize) -> Option<Event> {
        self.lists[idx].iter().min().copied()
    }

    /// Re-key the outer heap after the list at `idx` changed.
    pub fn update(&mut self, idx: usize) {
        self.stamps[idx] += 1;
        if let Some(min) = self.list_min(idx) {
            self.heap.push(Reverse(HeapEntry {
                key: min.order_key(),
                idx,
                stamp: self.stamps[idx],
            }));
        }
    }

    /// Rebuild the outer heap from every list.
    pub fn init(&mut self) {
        self.heap.clear();
        for idx in 0..self.lists.len() {
            self.update(idx);
        }
    }

    /// The current minimum over all lists, discarding stale heap
    /// bookkeeping on the way.
    pub fn peek(&mut self) -> Option<(usize, Event)> {
        loop {
            let entry = self.heap.peek()?.0;
            if entry.stamp != self.stamps[entry.idx] {
                self.heap.pop();
                continue;
            }
            match self.list_min(entry.idx) {
                Some(min) => return Some((entry.idx, min)),
                None => {
                    self.heap.pop();
                    continue;
                }
            }
        }
    }

    /// Remove one concrete event from a list and re-key.
    pub fn remove(&mut self, idx: usize, ev: &Event) {
        if let Some(slot) = self.lists[idx].iter().position(|e| e == ev) {
            self.lists[idx].swap_remove(slot);
        }
        self.update(idx);
    }

    /// Map every queued absolute time `t` to `now + (t - now) * scale`.
    pub fn rescale_times(&mut self, now: f64, scale: f64) {
        for list in self.lists.iter_mut() {
            for ev in list.iter_mut() {
                let t = ev.time.into_inner();
                if t.is_finite() {
                    // Scaling a finite time by a finite factor cannot
                    // introduce a NaN.
                    if let Ok(nt) = NotNan::new(now + (t - now) * scale) {
                        ev.time = nt;
                    }
                }
            }
        }
        self.init();
    }

    #[cfg(test)]
    pub fn list_len(&self, idx: usize) -> usize {
        self.lists[idx].len()
    }
}
