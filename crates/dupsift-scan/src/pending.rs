//! Join set for dynamically spawned walk tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

/// Counts walk tasks that have been registered but not yet completed.
///
/// A task registers each child before handing it to the scheduler and
/// completes itself only after its own listing is done, so the count can
/// only reach zero once no task is left that could still submit work.
/// Reaching zero is signalled once over a channel.
#[derive(Debug)]
pub(crate) struct PendingTasks {
    outstanding: AtomicUsize,
    idle_tx: Sender<()>,
    idle_rx: Receiver<()>,
}

impl PendingTasks {
    pub fn new() -> Self {
        let (idle_tx, idle_rx) = unbounded();
        Self {
            outstanding: AtomicUsize::new(0),
            idle_tx,
            idle_rx,
        }
    }

    /// Account for a task about to be submitted.
    pub fn register(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark a registered task as finished (or as never started).
    pub fn complete(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.idle_tx.send(());
        }
    }

    /// Tasks registered and not yet completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Block until every registered task completed, or until `deadline`.
    ///
    /// Returns `false` if the deadline passed first.
    pub fn wait(&self, deadline: Option<Instant>) -> bool {
        loop {
            if self.outstanding() == 0 {
                return true;
            }
            let received = match deadline {
                Some(deadline) => self.idle_rx.recv_deadline(deadline),
                None => self
                    .idle_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            // Both ends live in `self`, so an error here is always a timeout.
            if received.is_err() {
                return self.outstanding() == 0;
            }
        }
    }
}
