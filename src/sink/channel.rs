//! Channel-backed sink that hands each dispatched batch to a consumer thread.

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use super::Sink;

/// The receiving side of a [`ChannelSink`] was dropped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Sink channel disconnected: receiver dropped")]
pub struct SinkDisconnected;

/// Forwards every dispatched batch as one `Vec<C>` message
///
/// Single-command dispatches arrive as a one-element batch, so the consumer
/// sees the same message shape either way.
#[derive(Debug, Clone)]
pub struct ChannelSink<C> {
    sender: Sender<Vec<C>>,
}

impl<C> ChannelSink<C> {
    pub fn new(sender: Sender<Vec<C>>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiver its batches arrive on
    pub fn unbounded() -> (Self, Receiver<Vec<C>>) {
        let (sender, receiver) = channel::unbounded();
        (Self::new(sender), receiver)
    }

    /// Create a sink whose dispatch blocks once `capacity` batches are in flight
    pub fn bounded(capacity: usize) -> (Self, Receiver<Vec<C>>) {
        let (sender, receiver) = channel::bounded(capacity);
        (Self::new(sender), receiver)
    }
}

impl<C: Clone> Sink<C> for ChannelSink<C> {
    type Error = SinkDisconnected;

    fn dispatch_one(&self, command: &C) -> Result<(), Self::Error> {
        self.sender
            .send(vec![command.clone()])
            .map_err(|_| SinkDisconnected)
    }

    fn dispatch_many(&self, commands: &[C]) -> Result<(), Self::Error> {
        self.sender
            .send(commands.to_vec())
            .map_err(|_| SinkDisconnected)
    }
}
