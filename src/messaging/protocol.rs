use async_trait::async_trait;
use bytes::Bytes;

use crate::messaging::engine::{PipeId, Readiness};
use crate::messaging::error::SocketError;
use crate::messaging::message::Message;
use crate::messaging::options::{SocketOption, SocketOptionKey};

/// The per-protocol behavior behind a [crate::messaging::socket::Socket]. A socket holds its
///  protocol as a `Box<dyn Protocol>` and dispatches all operations to it; protocols decide
///  which operations they interpret and which they pass through to their engine.
///
/// Teardown happens in `Drop`.
#[async_trait]
pub trait Protocol: Send + Sync {
    fn add_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError>;
    fn remove_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError>;

    fn readiness(&self) -> Readiness;
    async fn readable(&self);

    /// Sends a message. The caller guarantees that the message header is empty. On success
    ///  the message is taken, on error it is left with an empty header for a retry.
    fn send(&mut self, msg: &mut Message) -> Result<(), SocketError>;
    fn recv(&mut self) -> Result<Message, SocketError>;

    fn set_option(&mut self, option: SocketOption) -> Result<(), SocketError>;
    fn get_option(&self, key: SocketOptionKey) -> Result<SocketOption, SocketError>;

    /// Sets the protocol header of a message from application supplied data
    fn set_header(&self, msg: &mut Message, header: &[u8]) -> Result<(), SocketError>;
    /// Returns the part of a message's protocol header that is visible to applications
    fn get_header(&self, msg: &Message) -> Bytes;
}
