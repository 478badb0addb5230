use std::sync::{Arc, Condvar, Mutex};

use crate::foundation::error::{PolyscanError, PolyscanResult};
use crate::foundation::sync::lock;

#[derive(Default)]
struct TaskTracker {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl TaskTracker {
    fn begin(&self) {
        *lock(&self.pending) += 1;
    }

    fn finish(&self) {
        let mut pending = lock(&self.pending);
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Decrements the tracker even when the task unwinds.
struct TaskGuard(Arc<TaskTracker>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Worker pool that runs queue pumps and can report when every spawned task has finished.
///
/// Wraps a dedicated rayon thread pool. Tasks may spawn further tasks; [`Executor::wait_idle`]
/// returns only once the whole tree has drained.
pub struct Executor {
    pool: rayon::ThreadPool,
    tracker: Arc<TaskTracker>,
}

impl Executor {
    /// Build an executor with `threads` workers, or rayon's default when `None`.
    pub fn new(threads: Option<usize>) -> PolyscanResult<Self> {
        if let Some(n) = threads
            && n == 0
        {
            return Err(PolyscanError::validation(
                "executor 'threads' must be >= 1 when set",
            ));
        }

        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("polyscan-worker-{i}"))
            .panic_handler(|_| tracing::error!("polyscan worker task panicked"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| PolyscanError::Other(anyhow::anyhow!("failed to build thread pool: {e}")))?;

        Ok(Self {
            pool,
            tracker: Arc::new(TaskTracker::default()),
        })
    }

    /// Run `task` on a worker thread.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tracker.begin();
        let guard = TaskGuard(Arc::clone(&self.tracker));
        self.pool.spawn(move || {
            let _guard = guard;
            task();
        });
    }

    /// Block until every spawned task, including tasks spawned by tasks, has finished.
    ///
    /// Must not be called from one of this executor's own workers.
    pub fn wait_idle(&self) {
        debug_assert!(
            self.pool.current_thread_index().is_none(),
            "wait_idle called from a worker thread"
        );
        let mut pending = lock(&self.tracker.pending);
        while *pending > 0 {
            pending = self
                .tracker
                .idle
                .wait(pending)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Tasks spawned but not yet finished.
    pub fn pending(&self) -> usize {
        *lock(&self.tracker.pending)
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Number of distinct execution contexts: one per worker plus one for outside callers.
    pub fn context_count(&self) -> usize {
        self.num_threads() + 1
    }

    /// Execution context of the calling thread, in `0..context_count()`.
    ///
    /// Workers map to their rayon index; any other thread maps to `num_threads()`.
    pub fn current_context(&self) -> usize {
        self.pool
            .current_thread_index()
            .unwrap_or_else(|| self.num_threads())
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("threads", &self.num_threads())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/executor.rs"]
mod tests;
