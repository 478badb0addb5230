use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use crate::exec::executor::Executor;
use crate::foundation::sync::lock;

struct QueueState<D> {
    items: VecDeque<D>,
    active: usize,
}

struct Shared<D, F> {
    executor: Arc<Executor>,
    state: Mutex<QueueState<D>>,
    capacity: usize,
    max_workers: usize,
    work: F,
}

/// Bounded queue whose items are processed by `work` on executor threads in no particular order.
///
/// Scheduling into an empty queue starts a pump task. A pump drains items oldest first and,
/// while items remain, recruits one more pump at a time up to `max_workers` concurrent pumps.
/// A pump counts as active from the moment it is spawned until it finds the queue empty.
/// `work` may schedule more items into the same queue.
pub struct UnorderedWorkQueue<D, F> {
    shared: Arc<Shared<D, F>>,
}

impl<D, F> Clone for UnorderedWorkQueue<D, F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D, F> UnorderedWorkQueue<D, F>
where
    D: Send + 'static,
    F: Fn(D) + Send + Sync + 'static,
{
    /// Create a queue holding at most `capacity` pending items.
    ///
    /// `max_workers` is clamped to at least one.
    pub fn new(executor: Arc<Executor>, capacity: usize, max_workers: usize, work: F) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor,
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    active: 0,
                }),
                capacity,
                max_workers: max_workers.max(1),
                work,
            }),
        }
    }

    /// Queue `item` for processing.
    ///
    /// Hands the item back when the queue is full; the caller decides whether to retry later or
    /// process it some other way.
    pub fn schedule(&self, item: D) -> Result<(), D> {
        let start = {
            let mut st = lock(&self.shared.state);
            if st.items.len() >= self.shared.capacity {
                return Err(item);
            }
            // A pump that is still counted as active always takes another look at the queue
            // before it exits, so a full complement of pumps will pick this item up.
            let start = st.items.is_empty() && st.active < self.shared.max_workers;
            st.items.push_back(item);
            if start {
                st.active += 1;
            }
            start
        };

        if start {
            Shared::start_pump(&self.shared);
        }
        Ok(())
    }

    /// Items waiting to be picked up by a pump.
    pub fn len(&self) -> usize {
        lock(&self.shared.state).items.len()
    }

    /// Return `true` when no item is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pumps currently running.
    pub fn active_workers(&self) -> usize {
        lock(&self.shared.state).active
    }

    /// Maximum number of pending items.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<D, F> Shared<D, F>
where
    D: Send + 'static,
    F: Fn(D) + Send + Sync + 'static,
{
    fn start_pump(this: &Arc<Self>) {
        let shared = Arc::clone(this);
        this.executor.spawn(move || shared.pump());
    }

    /// Drain items until the queue is empty. The caller has already counted this pump in
    /// `active`.
    fn pump(self: Arc<Self>) {
        let mut st = lock(&self.state);

        while let Some(item) = st.items.pop_front() {
            let recruit = !st.items.is_empty() && st.active < self.max_workers;
            if recruit {
                st.active += 1;
            }
            drop(st);

            if recruit {
                Self::start_pump(&self);
            }
            if catch_unwind(AssertUnwindSafe(|| (self.work)(item))).is_err() {
                tracing::error!("unordered work item panicked; continuing with the next item");
            }

            st = lock(&self.state);
        }

        st.active -= 1;
        // Start the next burst from fresh storage.
        if st.items.is_empty() && st.active == 0 {
            st.items.clear();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/unordered.rs"]
mod tests;
