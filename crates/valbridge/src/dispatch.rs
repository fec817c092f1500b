// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial task queues for bridged calls.
//!
//! Tasks submitted to a [`DispatchQueue`] run one at a time in submission
//! order. No ordering is promised relative to synchronous calls made outside
//! the queue.

use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Unit of work run on a queue.
pub type DispatchTask = Box<dyn FnOnce() + Send + 'static>;

/// FIFO ordering service.
pub trait DispatchQueue: Send + Sync {
    /// Enqueue `task` and return immediately.
    fn dispatch_async(&self, task: DispatchTask);

    /// Run `task` on the queue and wait for it to complete.
    fn dispatch_sync(&self, task: DispatchTask);

    /// Short name, used in logs.
    fn name(&self) -> &str {
        "queue"
    }
}

/// Queue served by a single dedicated thread.
///
/// Dropping the queue lets already submitted tasks finish, then joins the
/// worker thread.
pub struct SerialWorkerQueue {
    name: String,
    sender: Mutex<Option<Sender<DispatchTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl SerialWorkerQueue {
    /// Spawn the worker thread. A `capacity` of 0 means unbounded.
    pub fn new(name: &str, capacity: usize) -> Result<Self> {
        let (sender, receiver) = if capacity == 0 {
            channel::unbounded::<DispatchTask>()
        } else {
            channel::bounded::<DispatchTask>(capacity)
        };

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Exits once every sender is gone and the channel is drained.
                for task in receiver {
                    task();
                }
            })
            .map_err(|e| Error::message(format!("failed to spawn queue thread '{}': {}", name, e)))?;

        log::debug!("[dispatch] started queue '{}' (capacity {})", name, capacity);
        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
        })
    }

    fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    fn send(&self, task: DispatchTask) {
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => {
                if sender.send(task).is_err() {
                    log::warn!("[dispatch] queue '{}' is closed, dropping task", self.name);
                }
            }
            None => log::warn!("[dispatch] queue '{}' is shut down, dropping task", self.name),
        }
    }

    /// Stop accepting tasks, drain the queue and join the worker.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if self.is_worker_thread() {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::warn!("[dispatch] worker of queue '{}' panicked", self.name);
            }
            log::debug!("[dispatch] stopped queue '{}'", self.name);
        }
    }
}

impl DispatchQueue for SerialWorkerQueue {
    fn dispatch_async(&self, task: DispatchTask) {
        self.send(task);
    }

    fn dispatch_sync(&self, task: DispatchTask) {
        if self.is_worker_thread() {
            task();
            return;
        }
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        self.send(Box::new(move || {
            task();
            let _ = done_tx.send(());
        }));
        // Disconnected when the task was dropped unrun.
        let _ = done_rx.recv();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialWorkerQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_tasks_run_in_submission_order() {
        let queue = SerialWorkerQueue::new("test-fifo", 0).expect("spawn");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..64 {
            let seen = Arc::clone(&seen);
            queue.dispatch_async(Box::new(move || seen.lock().push(i)));
        }
        queue.dispatch_sync(Box::new(|| {}));

        assert_eq!(*seen.lock(), (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_sync_dispatch_runs_on_worker() {
        let queue = SerialWorkerQueue::new("test-sync", 4).expect("spawn");
        let caller = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&ran_on);
        queue.dispatch_sync(Box::new(move || *slot.lock() = Some(thread::current().id())));

        let worker = ran_on.lock().expect("task ran");
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_shutdown_drains_pending_tasks() {
        let queue = SerialWorkerQueue::new("test-drain", 0).expect("spawn");
        let count = Arc::new(Mutex::new(0));
        for _ in 0..10 {
            let count = Arc::clone(&count);
            queue.dispatch_async(Box::new(move || *count.lock() += 1));
        }
        queue.shutdown();
        assert_eq!(*count.lock(), 10);

        // Dropped silently after shutdown.
        queue.dispatch_async(Box::new(|| panic!("must not run")));
    }
}
