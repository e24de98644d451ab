//! Dispatched result returned to the caller that triggered a flush.

use std::slice;
use std::vec;

/// Commands that one `submit`/`flush` call personally handed to the sink, in
/// dispatch order. Empty when the call queued only, found nothing to flush,
/// or lost the race to another flusher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTasks<C> {
    commands: Vec<C>,
}

impl<C> BatchTasks<C> {
    /// The distinguished no-op result
    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn iter(&self) -> slice::Iter<'_, C> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[C] {
        &self.commands
    }

    pub fn into_vec(self) -> Vec<C> {
        self.commands
    }
}

impl<C> Default for BatchTasks<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> From<Vec<C>> for BatchTasks<C> {
    fn from(commands: Vec<C>) -> Self {
        Self { commands }
    }
}

impl<C> IntoIterator for BatchTasks<C> {
    type Item = C;
    type IntoIter = vec::IntoIter<C>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a, C> IntoIterator for &'a BatchTasks<C> {
    type Item = &'a C;
    type IntoIter = slice::Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
