//! # Pending Queue
//!
//! Unbounded FIFO buffer of submitted commands, safe for concurrent appends and
//! drains without external locking. Built on a lock-free segmented queue, so
//! every command is removed by exactly one drain.

use crossbeam::queue::SegQueue;

/// How many commands a drain should remove from the head of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPlan {
    Nothing,
    UpTo(usize),
    All,
}

#[derive(Debug)]
pub struct PendingQueue<C> {
    items: SegQueue<C>,
}

impl<C> PendingQueue<C> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
        }
    }

    /// Append a command at the tail; never blocks
    pub fn push(&self, command: C) {
        self.items.push(command);
    }

    /// Approximate number of queued commands; may be stale as soon as it is read
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove commands from the head in FIFO order according to `plan`.
    ///
    /// Returns fewer than requested when the queue empties first. `All` keeps
    /// draining while commands are present, including ones appended mid-drain.
    pub fn drain(&self, plan: DrainPlan) -> Vec<C> {
        let limit = match plan {
            DrainPlan::Nothing => return Vec::new(),
            DrainPlan::UpTo(limit) => limit,
            DrainPlan::All => usize::MAX,
        };

        let mut batch = Vec::with_capacity(limit.min(self.len()));
        while batch.len() < limit {
            match self.items.pop() {
                Some(command) => batch.push(command),
                None => break,
            }
        }
        batch
    }
}

impl<C> Default for PendingQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}
