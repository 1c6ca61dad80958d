/// Socket options. Protocols that do not interpret an option pass it through to their
///  multicast engine unchanged.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SocketOption {
    /// maximum number of messages queued for `recv` before further incoming messages are
    ///  dropped
    RecvQueueCapacity(usize),
    /// messages with bodies larger than this are dropped on receipt
    MaxMessageSize(usize),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SocketOptionKey {
    RecvQueueCapacity,
    MaxMessageSize,
}

impl SocketOption {
    pub fn key(&self) -> SocketOptionKey {
        match self {
            SocketOption::RecvQueueCapacity(_) => SocketOptionKey::RecvQueueCapacity,
            SocketOption::MaxMessageSize(_) => SocketOptionKey::MaxMessageSize,
        }
    }
}
