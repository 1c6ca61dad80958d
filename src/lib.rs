//! BUS sockets: every message sent on a socket is broadcast to all connected peers, and a
//!  socket never receives its own messages back. See [messaging::bus] for the protocol, and
//!  [messaging::socket::Socket] for the application facing API.

pub mod messaging;
pub mod util;
pub mod test_util;
