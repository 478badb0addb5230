use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::foundation::sync::lock;

/// Blocks kept alive across `release_all`.
const FIXED_BLOCKS: usize = 1;

/// Snapshot of [`SharedRunPool`] bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RunPoolStats {
    /// Blocks currently alive, spare or in use.
    pub(crate) blocks_allocated: usize,
    /// Blocks with at least one live [`PoolRun`].
    pub(crate) blocks_outstanding: usize,
    /// Times the pool had to grow by allocating a new block.
    pub(crate) grow_events: u64,
    /// Acquisitions refused because a new block could not be allocated.
    pub(crate) alloc_failures: u64,
}

/// `BLOCK` item slots. Runs own disjoint ranges, so every slot lock is uncontended.
struct Block<T> {
    slots: Box<[Mutex<T>]>,
}

impl<T: Default> Block<T> {
    fn try_new(len: usize) -> Option<Arc<Self>> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(len).ok()?;
        slots.resize_with(len, || Mutex::new(T::default()));
        Some(Arc::new(Self {
            slots: slots.into_boxed_slice(),
        }))
    }
}

struct Tracked<T> {
    block: Arc<Block<T>>,
    live_runs: usize,
}

struct RunPoolState<T> {
    /// Block runs are carved from, and the next free slot in it.
    current: Option<Tracked<T>>,
    cursor: usize,
    /// Blocks no longer current that still have live runs.
    retired: Vec<Tracked<T>>,
    spare: Vec<Arc<Block<T>>>,
    stats: RunPoolStats,
    block_limit: Option<usize>,
}

impl<T> RunPoolState<T> {
    fn run_returned(&mut self, block: &Arc<Block<T>>) {
        if let Some(cur) = self
            .current
            .as_mut()
            .filter(|cur| Arc::ptr_eq(&cur.block, block))
        {
            cur.live_runs -= 1;
            if cur.live_runs == 0 {
                self.stats.blocks_outstanding -= 1;
            }
            return;
        }
        let Some(pos) = self
            .retired
            .iter()
            .position(|t| Arc::ptr_eq(&t.block, block))
        else {
            return;
        };
        self.retired[pos].live_runs -= 1;
        if self.retired[pos].live_runs == 0 {
            let done = self.retired.swap_remove(pos);
            self.stats.blocks_outstanding -= 1;
            self.spare.push(done.block);
        }
    }
}

/// Thread-safe pool handing out contiguous runs of up to `BLOCK` items.
///
/// Runs are carved one after another from the current block. When the current block cannot
/// hold the next run, a spare block (or a newly allocated one) becomes current. A block goes
/// back to the spares once every run carved from it has been dropped, from whichever thread
/// drops them. [`SharedRunPool::release_all`] frees everything but the first block.
pub(crate) struct SharedRunPool<T, const BLOCK: usize> {
    inner: Arc<Mutex<RunPoolState<T>>>,
}

impl<T: Default + Send, const BLOCK: usize> SharedRunPool<T, BLOCK> {
    pub(crate) fn new() -> Self {
        Self::build(None)
    }

    /// Pool that refuses to hold more than `limit` blocks at once, as if allocation failed.
    pub(crate) fn with_block_limit(limit: usize) -> Self {
        Self::build(Some(limit))
    }

    fn build(limit: Option<usize>) -> Self {
        let mut stats = RunPoolStats::default();
        let fixed = limit.map_or(FIXED_BLOCKS, |l| l.min(FIXED_BLOCKS));
        let current = (fixed > 0)
            .then(|| Block::try_new(BLOCK))
            .flatten()
            .map(|block| {
                stats.blocks_allocated += 1;
                Tracked {
                    block,
                    live_runs: 0,
                }
            });
        Self {
            inner: Arc::new(Mutex::new(RunPoolState {
                current,
                cursor: 0,
                retired: Vec::new(),
                spare: Vec::new(),
                stats,
                block_limit: limit,
            })),
        }
    }

    /// Acquire a run of `count` default-initialised items.
    ///
    /// Returns `None` when `count > BLOCK` or when the pool cannot grow.
    pub(crate) fn acquire(&self, count: usize) -> Option<PoolRun<T>> {
        if count > BLOCK {
            return None;
        }

        let (block, range) = {
            let mut guard = lock(&self.inner);
            let st = &mut *guard;
            let fits = st
                .current
                .as_ref()
                .is_some_and(|cur| cur.live_runs == 0 || BLOCK - st.cursor >= count);
            if fits {
                if st.current.as_ref().is_some_and(|cur| cur.live_runs == 0) {
                    st.cursor = 0;
                }
            } else {
                let next = Self::next_block(st)?;
                if let Some(old) = st.current.take() {
                    if old.live_runs > 0 {
                        st.retired.push(old);
                    } else {
                        st.spare.push(old.block);
                    }
                }
                st.current = Some(Tracked {
                    block: next,
                    live_runs: 0,
                });
                st.cursor = 0;
            }

            let start = st.cursor;
            st.cursor += count;
            let cur = st.current.as_mut()?;
            cur.live_runs += 1;
            let block = Arc::clone(&cur.block);
            if cur.live_runs == 1 {
                st.stats.blocks_outstanding += 1;
            }
            (block, start..start + count)
        };

        for slot in &block.slots[range.clone()] {
            *lock(slot) = T::default();
        }
        Some(PoolRun {
            block,
            range,
            home: Arc::downgrade(&self.inner),
        })
    }

    fn next_block(st: &mut RunPoolState<T>) -> Option<Arc<Block<T>>> {
        if let Some(block) = st.spare.pop() {
            return Some(block);
        }
        if st
            .block_limit
            .is_some_and(|limit| st.stats.blocks_allocated >= limit)
        {
            st.stats.alloc_failures += 1;
            return None;
        }
        let Some(block) = Block::try_new(BLOCK) else {
            st.stats.alloc_failures += 1;
            return None;
        };
        st.stats.blocks_allocated += 1;
        st.stats.grow_events += 1;
        tracing::trace!(blocks = st.stats.blocks_allocated, "run pool grew");
        Some(block)
    }

    /// Free every spare block beyond the fixed first one.
    ///
    /// Runs still outstanding stay valid and return their block to the pool when dropped.
    pub(crate) fn release_all(&self) {
        let mut st = lock(&self.inner);
        if st.current.as_ref().is_some_and(|cur| cur.live_runs == 0) {
            st.cursor = 0;
        }
        let keep = FIXED_BLOCKS
            .saturating_sub(usize::from(st.current.is_some()))
            .min(st.spare.len());
        let freed = st.spare.len() - keep;
        st.spare.truncate(keep);
        st.stats.blocks_allocated -= freed;
    }

    pub(crate) fn stats(&self) -> RunPoolStats {
        lock(&self.inner).stats
    }
}

/// Exclusively owned run of pooled items carved from one block.
///
/// The block returns to the pool once its last run is dropped.
pub(crate) struct PoolRun<T> {
    block: Arc<Block<T>>,
    range: Range<usize>,
    home: Weak<Mutex<RunPoolState<T>>>,
}

impl<T> PoolRun<T> {
    pub(crate) fn len(&self) -> usize {
        self.range.len()
    }

    /// Items of this run in order, each behind its own (uncontended) guard.
    pub(crate) fn iter(&self) -> impl Iterator<Item = MutexGuard<'_, T>> {
        self.block.slots[self.range.clone()].iter().map(lock)
    }
}

impl<T> std::fmt::Debug for PoolRun<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRun")
            .field("range", &self.range)
            .finish()
    }
}

impl<T> Drop for PoolRun<T> {
    fn drop(&mut self) {
        let Some(home) = self.home.upgrade() else {
            return;
        };
        lock(&home).run_returned(&self.block);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool/shared.rs"]
mod tests;
