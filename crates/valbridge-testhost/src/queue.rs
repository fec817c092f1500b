// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Manually flushed dispatch queue.

use std::collections::VecDeque;

use parking_lot::Mutex;
use valbridge::{DispatchQueue, DispatchTask};

/// Queue holding async tasks until [`TestDispatchQueue::flush_tasks`].
///
/// Sync tasks run inline on the caller.
#[derive(Default)]
pub struct TestDispatchQueue {
    tasks: Mutex<VecDeque<DispatchTask>>,
}

impl TestDispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Run queued tasks, including the ones they enqueue, until the queue is
    /// empty. Returns the number of tasks run.
    pub fn flush_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            // The lock is released before the task runs.
            let task = self.tasks.lock().pop_front();
            let Some(task) = task else {
                log::trace!("[dispatch] flushed {} task(s)", ran);
                return ran;
            };
            task();
            ran += 1;
        }
    }
}

impl DispatchQueue for TestDispatchQueue {
    fn dispatch_async(&self, task: DispatchTask) {
        self.tasks.lock().push_back(task);
    }

    fn dispatch_sync(&self, task: DispatchTask) {
        task();
    }

    fn name(&self) -> &str {
        "test"
    }
}
