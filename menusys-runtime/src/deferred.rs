// Run-later queue drained at the host's frame boundary.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

/// FIFO of work postponed to the next frame.
///
/// Tasks queued while a batch is draining run on the following frame, so a
/// task that re-queues itself cannot stall the drain.
#[derive(Default)]
pub struct DeferredQueue {
    tasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run every task queued before this call. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Drop pending tasks without running them.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.tasks.borrow_mut());
        drop(dropped);
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue").field("pending", &self.len()).finish()
    }
}
