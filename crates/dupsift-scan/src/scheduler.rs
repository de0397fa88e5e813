//! Task scheduling abstraction for walk tasks.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

/// A unit of work handed to a [`TaskScheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Why a scheduler refused a task.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The scheduler no longer accepts work.
    #[error("scheduler is shut down")]
    ShutDown,

    /// The scheduler rejected the task.
    #[error("task rejected: {reason}")]
    Rejected { reason: String },
}

/// Runs walk tasks concurrently.
///
/// Implementations must run every accepted task exactly once, on any
/// thread, and must not run it on the caller's stack.
pub trait TaskScheduler: Send + Sync {
    /// Hand a task to the scheduler.
    fn spawn(&self, task: Task) -> Result<(), SpawnError>;
}

impl TaskScheduler for ThreadPool {
    fn spawn(&self, task: Task) -> Result<(), SpawnError> {
        ThreadPool::spawn(self, task);
        Ok(())
    }
}

impl<S: TaskScheduler + ?Sized> TaskScheduler for Arc<S> {
    fn spawn(&self, task: Task) -> Result<(), SpawnError> {
        (**self).spawn(task)
    }
}

/// Scheduler backed by rayon's global thread pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalPool;

impl TaskScheduler for GlobalPool {
    fn spawn(&self, task: Task) -> Result<(), SpawnError> {
        rayon::spawn(task);
        Ok(())
    }
}

/// Build a dedicated walk pool (`threads == 0` means one per CPU).
pub fn walk_pool(threads: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("dupsift-walk-{index}"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_thread_pool_runs_task() {
        let pool = walk_pool(2).unwrap();
        let (tx, rx) = mpsc::channel();

        TaskScheduler::spawn(&pool, Box::new(move || tx.send(7).unwrap())).unwrap();

        assert_eq!(rx.recv().unwrap(), 7);
    }

    #[test]
    fn test_arc_dyn_scheduler() {
        let scheduler: Arc<dyn TaskScheduler> = Arc::new(GlobalPool);
        let (tx, rx) = mpsc::channel();

        scheduler.spawn(Box::new(move || tx.send("done").unwrap())).unwrap();

        assert_eq!(rx.recv().unwrap(), "done");
    }
}
