use std::fmt::{Debug, Formatter};

use bytes::Bytes;

/// A message as it is passed between application, protocol and multicast engine: an opaque
///  body plus a header that is owned by the protocol layer.
///
/// Applications never see a non-empty header on a BUS socket - the header carries the
///  sender's [crate::messaging::node_id::NodeId] on the wire and is stripped on receipt.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct Message {
    header: Bytes,
    body: Bytes,
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Message{{header:{:?}, body:{} bytes}}", self.header.as_ref(), self.body.len())
    }
}

impl Message {
    pub fn new(body: impl Into<Bytes>) -> Message {
        Message {
            header: Bytes::new(),
            body: body.into(),
        }
    }

    /// Creates a message with an explicit header. This is the raw level used by multicast
    ///  engines and for injecting foreign traffic in tests - protocols with their own header
    ///  format refuse such messages from applications.
    pub fn with_header(header: impl Into<Bytes>, body: impl Into<Bytes>) -> Message {
        Message {
            header: header.into(),
            body: body.into(),
        }
    }

    pub fn header(&self) -> &Bytes {
        &self.header
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Replaces the header, dropping the previous one
    pub fn set_header(&mut self, header: Bytes) {
        self.header = header;
    }

    /// Replaces the header with an empty one, returning the previous header
    pub fn take_header(&mut self) -> Bytes {
        std::mem::take(&mut self.header)
    }
}

impl From<&'static [u8]> for Message {
    fn from(value: &'static [u8]) -> Self {
        Message::new(value)
    }
}

impl From<Vec<u8>> for Message {
    fn from(value: Vec<u8>) -> Self {
        Message::new(value)
    }
}
