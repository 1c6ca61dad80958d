use std::fmt::{Debug, Formatter};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::util::random::Random;

/// Every BUS socket gets a random 64 bit id when it is created. Outgoing messages are tagged
///  with this id, and incoming messages carrying it are recognized as the socket's own
///  broadcasts and dropped.
///
/// NB: Ids are not coordinated between nodes. If two nodes happen to draw the same id, they
///      silently drop each other's messages. With 64 random bits this is accepted as a
///      theoretical risk rather than guarded against.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u64);

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl NodeId {
    /// length of the tag as it is sent on the wire
    pub const SERIALIZED_LEN: usize = size_of::<u64>();

    pub fn generate<R: Random>() -> NodeId {
        NodeId(R::next_u64())
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.0);
    }

    /// The message header identifying this node as a message's sender
    pub fn to_header(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SERIALIZED_LEN);
        self.ser(&mut buf);
        buf.freeze()
    }

    /// Reads a node id from a message header. This returns `None` unless the header has
    ///  exactly the length of a serialized id - trailing data is not tolerated.
    pub fn try_from_header(mut header: &[u8]) -> Option<NodeId> {
        if header.len() != Self::SERIALIZED_LEN {
            return None;
        }
        Some(NodeId(header.get_u64()))
    }
}
