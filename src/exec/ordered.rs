use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

use crate::exec::executor::Executor;
use crate::foundation::error::{PolyscanError, PolyscanResult};
use crate::foundation::sync::lock;

enum Slot<D> {
    Pending,
    Ready(D),
    Skipped,
    Done,
}

struct OrderedState<D> {
    slots: Vec<Slot<D>>,
    /// Lowest index not yet executed or skipped.
    next_exec: usize,
    /// One past the highest index ever marked ready since the last reset.
    high_water: usize,
    pump_running: bool,
    executed: u64,
    skipped: u64,
}

struct Shared<D, F> {
    executor: Arc<Executor>,
    state: Mutex<OrderedState<D>>,
    work: F,
}

/// Counters describing how an [`OrderedWorkQueue`] has progressed since its last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderedQueueStats {
    /// Lowest index not yet processed.
    pub next_index: usize,
    /// Indices whose payload was handed to the work function.
    pub executed: u64,
    /// Indices released without a payload.
    pub skipped: u64,
}

/// Queue that processes payloads strictly in index order, whatever order they arrive in.
///
/// Every index in `0..capacity` must eventually be either scheduled or skipped; the queue
/// stops at the first index that is neither. `work` receives each maximal stretch of
/// consecutive scheduled payloads inside the ready run as one slice, on an executor thread,
/// and never runs concurrently with itself.
pub struct OrderedWorkQueue<D, F> {
    shared: Arc<Shared<D, F>>,
}

impl<D, F> Clone for OrderedWorkQueue<D, F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D, F> OrderedWorkQueue<D, F>
where
    D: Send + 'static,
    F: Fn(&mut [D]) + Send + Sync + 'static,
{
    /// Create a queue accepting indices `0..capacity`.
    pub fn new(executor: Arc<Executor>, capacity: usize, work: F) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor,
                state: Mutex::new(OrderedState {
                    slots: (0..capacity).map(|_| Slot::Pending).collect(),
                    next_exec: 0,
                    high_water: 0,
                    pump_running: false,
                    executed: 0,
                    skipped: 0,
                }),
                work,
            }),
        }
    }

    /// Provide the payload for `index`.
    pub fn schedule(&self, index: usize, item: D) -> PolyscanResult<()> {
        self.mark(index, Slot::Ready(item))
    }

    /// Release `index` without a payload.
    pub fn skip(&self, index: usize) -> PolyscanResult<()> {
        self.mark(index, Slot::Skipped)
    }

    /// Clear all readiness state for the next frame.
    ///
    /// Fails unless every index marked since the last reset has been processed and no pump is
    /// running.
    pub fn reset(&self) -> PolyscanResult<()> {
        let mut st = lock(&self.shared.state);
        if st.pump_running || st.next_exec < st.high_water {
            return Err(PolyscanError::scheduling(format!(
                "ordered queue reset while busy (next {} of {})",
                st.next_exec, st.high_water
            )));
        }
        let touched = st.high_water;
        for slot in &mut st.slots[..touched] {
            *slot = Slot::Pending;
        }
        st.next_exec = 0;
        st.high_water = 0;
        st.executed = 0;
        st.skipped = 0;
        Ok(())
    }

    /// Lowest index not yet processed.
    pub fn next_index(&self) -> usize {
        lock(&self.shared.state).next_exec
    }

    /// Return `true` when indices `0..count` have all been processed.
    pub fn is_drained(&self, count: usize) -> bool {
        let st = lock(&self.shared.state);
        !st.pump_running && st.next_exec >= count
    }

    /// Progress counters since the last reset.
    pub fn stats(&self) -> OrderedQueueStats {
        let st = lock(&self.shared.state);
        OrderedQueueStats {
            next_index: st.next_exec,
            executed: st.executed,
            skipped: st.skipped,
        }
    }

    /// Number of indices accepted per frame.
    pub fn capacity(&self) -> usize {
        lock(&self.shared.state).slots.len()
    }

    fn mark(&self, index: usize, slot: Slot<D>) -> PolyscanResult<()> {
        let start = {
            let mut st = lock(&self.shared.state);
            let capacity = st.slots.len();
            let Some(cell) = st.slots.get_mut(index) else {
                return Err(PolyscanError::capacity(format!(
                    "ordered queue index {index} out of range (capacity {capacity})"
                )));
            };
            if !matches!(cell, Slot::Pending) {
                return Err(PolyscanError::scheduling(format!(
                    "ordered queue index {index} marked twice"
                )));
            }
            *cell = slot;
            st.high_water = st.high_water.max(index + 1);

            let start = index == st.next_exec && !st.pump_running;
            if start {
                st.pump_running = true;
            }
            start
        };

        if start {
            let shared = Arc::clone(&self.shared);
            self.shared.executor.spawn(move || shared.pump());
        }
        Ok(())
    }
}

impl<D, F> Shared<D, F>
where
    D: Send + 'static,
    F: Fn(&mut [D]) + Send + Sync + 'static,
{
    fn pump(self: Arc<Self>) {
        let mut batch: Vec<D> = Vec::new();
        let mut stretches: SmallVec<[Range<usize>; 4]> = SmallVec::new();

        let mut st = lock(&self.state);
        loop {
            let begin = st.next_exec;
            let mut end = begin;
            let mut skipped = 0u64;
            let mut stretch_start = None;

            while end < st.slots.len() {
                match std::mem::replace(&mut st.slots[end], Slot::Done) {
                    Slot::Ready(item) => {
                        stretch_start.get_or_insert(batch.len());
                        batch.push(item);
                    }
                    Slot::Skipped => {
                        skipped += 1;
                        if let Some(s) = stretch_start.take() {
                            stretches.push(s..batch.len());
                        }
                    }
                    other => {
                        st.slots[end] = other;
                        break;
                    }
                }
                end += 1;
            }
            if let Some(s) = stretch_start.take() {
                stretches.push(s..batch.len());
            }

            if end == begin {
                st.pump_running = false;
                return;
            }
            drop(st);

            for range in stretches.drain(..) {
                let items = &mut batch[range];
                if catch_unwind(AssertUnwindSafe(|| (self.work)(items))).is_err() {
                    tracing::error!(
                        first = begin,
                        "ordered work batch panicked; continuing with the next index"
                    );
                }
            }
            let executed = batch.len() as u64;
            batch.clear();

            st = lock(&self.state);
            st.next_exec = end;
            st.executed += executed;
            st.skipped += skipped;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/ordered.rs"]
mod tests;
