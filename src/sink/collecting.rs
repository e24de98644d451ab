//! In-memory sink that records every batch it receives.

use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Sink;

/// Records each dispatched batch in arrival order
#[derive(Debug)]
pub struct CollectingSink<C> {
    batches: Mutex<Vec<Vec<C>>>,
    single_dispatches: AtomicU64,
    multi_dispatches: AtomicU64,
}

impl<C: Clone> CollectingSink<C> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            single_dispatches: AtomicU64::new(0),
            multi_dispatches: AtomicU64::new(0),
        }
    }

    /// Every batch received so far
    pub fn batches(&self) -> Vec<Vec<C>> {
        self.batches.lock().clone()
    }

    /// Every command received so far, flattened in dispatch order
    pub fn commands(&self) -> Vec<C> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Remove and return the recorded batches
    pub fn take_batches(&self) -> Vec<Vec<C>> {
        std::mem::take(&mut *self.batches.lock())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Number of `dispatch_one` calls received
    pub fn single_dispatches(&self) -> u64 {
        self.single_dispatches.load(Ordering::Relaxed)
    }

    /// Number of `dispatch_many` calls received
    pub fn multi_dispatches(&self) -> u64 {
        self.multi_dispatches.load(Ordering::Relaxed)
    }
}

impl<C: Clone> Default for CollectingSink<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone> Sink<C> for CollectingSink<C> {
    type Error = Infallible;

    fn dispatch_one(&self, command: &C) -> Result<(), Self::Error> {
        self.single_dispatches.fetch_add(1, Ordering::Relaxed);
        self.batches.lock().push(vec![command.clone()]);
        Ok(())
    }

    fn dispatch_many(&self, commands: &[C]) -> Result<(), Self::Error> {
        self.multi_dispatches.fetch_add(1, Ordering::Relaxed);
        self.batches.lock().push(commands.to_vec());
        Ok(())
    }
}
