use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::{debug, trace};

use crate::messaging::bus::Bus;
use crate::messaging::engine::{MulticastEngine, PipeId, Readiness};
use crate::messaging::error::SocketError;
use crate::messaging::message::Message;
use crate::messaging::options::{SocketOption, SocketOptionKey};
use crate::messaging::protocol::Protocol;

#[derive(Debug, Clone, Copy, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum Domain {
    /// full protocol semantics
    Sp = 1,
    /// protocol headers are exposed to the application, e.g. for building devices
    SpRaw = 2,
}

pub const NN_PROTO_BUS: i32 = 7;
pub const NN_BUS: i32 = NN_PROTO_BUS * 16;

/// A socket type is identified by a domain and a protocol number, and it knows how to create
///  the protocol on top of a multicast engine.
pub struct SocketType {
    pub domain: Domain,
    pub protocol: i32,
    pub name: &'static str,
    pub create: fn(Box<dyn MulticastEngine>) -> Box<dyn Protocol>,
}

impl Debug for SocketType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?}/{})", self.name, self.domain, self.protocol)
    }
}

fn create_bus(engine: Box<dyn MulticastEngine>) -> Box<dyn Protocol> {
    Box::new(Bus::new(engine))
}

pub static BUS_SOCKET_TYPE: SocketType = SocketType {
    domain: Domain::Sp,
    protocol: NN_BUS,
    name: "bus",
    create: create_bus,
};

static SOCKET_TYPES: &[&SocketType] = &[
    &BUS_SOCKET_TYPE,
];

pub fn find_socket_type(domain: i32, protocol: i32) -> Result<&'static SocketType, SocketError> {
    let domain = Domain::try_from(domain)
        .map_err(|_| SocketError::InvalidArgument("unknown socket domain"))?;

    SOCKET_TYPES.iter()
        .find(|t| t.domain == domain && t.protocol == protocol)
        .copied()
        .ok_or(SocketError::ProtocolNotSupported { domain: domain.into(), protocol })
}

/// The application facing socket. All operations are non-blocking except for
///  [Socket::recv_async].
pub struct Socket {
    socket_type: &'static SocketType,
    protocol: Box<dyn Protocol>,
}

impl Debug for Socket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Socket{{{:?}}}", self.socket_type)
    }
}

impl Socket {
    pub fn open(domain: i32, protocol: i32, engine: Box<dyn MulticastEngine>) -> Result<Socket, SocketError> {
        let socket_type = find_socket_type(domain, protocol)?;
        debug!(?socket_type, "opening socket");
        Ok(Socket {
            socket_type,
            protocol: (socket_type.create)(engine),
        })
    }

    pub fn bus(engine: impl MulticastEngine + 'static) -> Socket {
        Self::with_protocol(&BUS_SOCKET_TYPE, Box::new(Bus::new(engine)))
    }

    /// Wraps an already created protocol, e.g. a [Bus] with a well-known node id
    pub fn with_protocol(socket_type: &'static SocketType, protocol: Box<dyn Protocol>) -> Socket {
        Socket {
            socket_type,
            protocol,
        }
    }

    pub fn socket_type(&self) -> &'static SocketType {
        self.socket_type
    }

    pub fn add_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        debug!(socket_type = ?self.socket_type, ?pipe, "adding pipe");
        self.protocol.add_pipe(pipe)
    }

    pub fn remove_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        debug!(socket_type = ?self.socket_type, ?pipe, "removing pipe");
        self.protocol.remove_pipe(pipe)
    }

    pub fn readiness(&self) -> Readiness {
        self.protocol.readiness()
    }

    /// Sends a message. A message passed in here must not have a header - headers are set
    ///  through [Socket::set_header] and are subject to the protocol's rules.
    ///
    /// On success, the message is taken and replaced by an empty message. If the send would
    ///  block, the message is left unchanged.
    pub fn send(&mut self, msg: &mut Message) -> Result<(), SocketError> {
        if !msg.header().is_empty() {
            return Err(SocketError::InvalidArgument("message header must be empty when sending"));
        }
        self.protocol.send(msg)
    }

    pub fn send_bytes(&mut self, body: impl Into<Bytes>) -> Result<(), SocketError> {
        self.send(&mut Message::new(body))
    }

    pub fn recv(&mut self) -> Result<Message, SocketError> {
        self.protocol.recv()
    }

    /// Waits until a message is available, retrying `recv` whenever the engine signals that
    ///  it may have become readable.
    pub async fn recv_async(&mut self) -> Result<Message, SocketError> {
        loop {
            match self.protocol.recv() {
                Err(SocketError::WouldBlock) => {
                    trace!(socket_type = ?self.socket_type, "waiting for socket to become readable");
                    self.protocol.readable().await;
                }
                other => return other,
            }
        }
    }

    pub fn set_option(&mut self, option: SocketOption) -> Result<(), SocketError> {
        self.protocol.set_option(option)
    }

    pub fn get_option(&self, key: SocketOptionKey) -> Result<SocketOption, SocketError> {
        self.protocol.get_option(key)
    }

    pub fn set_header(&self, msg: &mut Message, header: &[u8]) -> Result<(), SocketError> {
        self.protocol.set_header(msg, header)
    }

    pub fn get_header(&self, msg: &Message) -> Bytes {
        self.protocol.get_header(msg)
    }
}
