use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;

use crate::messaging::error::SocketError;
use crate::messaging::message::Message;
use crate::messaging::options::{SocketOption, SocketOptionKey};

/// Identifies a pipe, i.e. the connection to a single peer, in the context of a multicast
///  engine.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PipeId(pub u32);

impl Debug for PipeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipe#{}", self.0)
    }
}

/// Snapshot of whether a `recv` / `send` call would currently make progress.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

/// This trait decouples protocols like BUS from the engine doing the actual work: it manages
///  the set of connected peers, broadcasts outgoing messages to all of them and queues
///  incoming messages.
///
/// All operations are non-blocking. If an operation cannot make progress, it returns
///  [SocketError::WouldBlock], and callers can wait for [MulticastEngine::readable] before
///  retrying.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MulticastEngine: Send + Sync {
    fn add_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError>;
    fn remove_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError>;

    fn readiness(&self) -> Readiness;

    /// completes once a message may be available for `recv`. Wakeups can be spurious.
    async fn readable(&self);

    /// Broadcasts a message to all peers. On success, the engine takes the message, leaving an
    ///  empty default message in its place. On error, the message is left untouched.
    fn send(&mut self, msg: &mut Message) -> Result<(), SocketError>;

    /// Returns the next message received from any peer, in whatever order the engine
    ///  chooses.
    fn recv(&mut self) -> Result<Message, SocketError>;

    fn set_option(&mut self, option: SocketOption) -> Result<(), SocketError>;
    fn get_option(&self, key: SocketOptionKey) -> Result<SocketOption, SocketError>;
}

#[async_trait]
impl<E: MulticastEngine + ?Sized> MulticastEngine for Box<E> {
    fn add_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        (**self).add_pipe(pipe)
    }

    fn remove_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        (**self).remove_pipe(pipe)
    }

    fn readiness(&self) -> Readiness {
        (**self).readiness()
    }

    async fn readable(&self) {
        (**self).readable().await
    }

    fn send(&mut self, msg: &mut Message) -> Result<(), SocketError> {
        (**self).send(msg)
    }

    fn recv(&mut self) -> Result<Message, SocketError> {
        (**self).recv()
    }

    fn set_option(&mut self, option: SocketOption) -> Result<(), SocketError> {
        (**self).set_option(option)
    }

    fn get_option(&self, key: SocketOptionKey) -> Result<SocketOption, SocketError> {
        (**self).get_option(key)
    }
}
