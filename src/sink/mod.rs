//! # Sink Capability
//!
//! The downstream consumer of dispatched batches. A sink accepts either a single
//! command or an ordered slice of commands and must deliver a slice in the order
//! given. The batcher only ever calls a sink while holding its flushing flag, so
//! one batcher never invokes its sink concurrently.

pub mod channel;
pub mod collecting;

use std::sync::Arc;

pub use channel::{ChannelSink, SinkDisconnected};
pub use collecting::CollectingSink;

/// Accepts dispatched commands for actual delivery
pub trait Sink<C> {
    type Error;

    /// Deliver exactly one command
    fn dispatch_one(&self, command: &C) -> Result<(), Self::Error>;

    /// Deliver an ordered batch of commands
    fn dispatch_many(&self, commands: &[C]) -> Result<(), Self::Error>;
}

impl<C, S: Sink<C> + ?Sized> Sink<C> for &S {
    type Error = S::Error;

    fn dispatch_one(&self, command: &C) -> Result<(), Self::Error> {
        (**self).dispatch_one(command)
    }

    fn dispatch_many(&self, commands: &[C]) -> Result<(), Self::Error> {
        (**self).dispatch_many(commands)
    }
}

impl<C, S: Sink<C> + ?Sized> Sink<C> for Arc<S> {
    type Error = S::Error;

    fn dispatch_one(&self, command: &C) -> Result<(), Self::Error> {
        (**self).dispatch_one(command)
    }

    fn dispatch_many(&self, commands: &[C]) -> Result<(), Self::Error> {
        (**self).dispatch_many(commands)
    }
}
