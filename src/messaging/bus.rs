//! The BUS protocol: every message sent is broadcast to all connected peers, and every message
//!  broadcast by a peer is received - except for a node's own messages.
//!
//! A node may receive its own broadcasts e.g. if it is connected to itself, or through a
//!  peer that relays messages. To filter those out, each BUS socket draws a random
//!  [NodeId] when it is created and tags all outgoing messages with it (as an 8 byte big
//!  endian message header). Incoming messages with the socket's own id are dropped, as are
//!  messages without a well-formed id header. The header is stripped before a message is
//!  handed to the application.
//!
//! NB: Only direct loopback is filtered. A relay that re-broadcasts a message under its own
//!      id makes it look like a regular message.

use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, trace};

use crate::messaging::engine::{MulticastEngine, PipeId, Readiness};
use crate::messaging::error::SocketError;
use crate::messaging::message::Message;
use crate::messaging::node_id::NodeId;
use crate::messaging::options::{SocketOption, SocketOptionKey};
use crate::messaging::protocol::Protocol;
use crate::util::random::{Random, RngRandom};

/// Counters for a BUS socket's traffic. They are purely informational: there is no limit
///  on the number of messages that are dropped in a single `recv` call.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BusStatistics {
    pub sent: u64,
    pub received: u64,
    pub dropped_malformed: u64,
    pub dropped_loopback: u64,
}

pub struct Bus<E: MulticastEngine> {
    engine: E,
    node_id: NodeId,
    /// the serialized node id, shared by all outgoing messages
    tag: Bytes,
    statistics: BusStatistics,
}

impl<E: MulticastEngine> Debug for Bus<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bus{{node_id:{:?}}}", self.node_id)
    }
}

impl<E: MulticastEngine> Bus<E> {
    pub fn new(engine: E) -> Bus<E> {
        Self::new_with_random::<RngRandom>(engine)
    }

    pub fn new_with_random<R: Random>(engine: E) -> Bus<E> {
        Self::with_node_id(engine, NodeId::generate::<R>())
    }

    pub fn with_node_id(engine: E, node_id: NodeId) -> Bus<E> {
        debug!(?node_id, "creating BUS socket");
        Bus {
            engine,
            node_id,
            tag: node_id.to_header(),
            statistics: Default::default(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn statistics(&self) -> BusStatistics {
        self.statistics
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn engine_failure(&self, op: &str, e: SocketError) -> ! {
        error!(node_id = ?self.node_id, error = %e, "multicast engine failed on {}", op);
        panic!("multicast engine failed on {}: {}", op, e);
    }
}

#[async_trait]
impl<E: MulticastEngine> Protocol for Bus<E> {
    fn add_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        self.engine.add_pipe(pipe)
    }

    fn remove_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        self.engine.remove_pipe(pipe)
    }

    fn readiness(&self) -> Readiness {
        self.engine.readiness()
    }

    async fn readable(&self) {
        self.engine.readable().await
    }

    fn send(&mut self, msg: &mut Message) -> Result<(), SocketError> {
        assert!(msg.header().is_empty(), "BUS messages must not have a header when they are sent");

        msg.set_header(self.tag.clone());

        match self.engine.send(msg) {
            Ok(()) => {
                trace!(node_id = ?self.node_id, "broadcasting message");
                self.statistics.sent += 1;
                Ok(())
            }
            Err(SocketError::WouldBlock) => {
                // leave the message as it was passed in so it can be sent again later
                msg.take_header();
                trace!(node_id = ?self.node_id, "send would block");
                Err(SocketError::WouldBlock)
            }
            Err(e) => self.engine_failure("send", e),
        }
    }

    fn recv(&mut self) -> Result<Message, SocketError> {
        loop {
            let mut msg = match self.engine.recv() {
                Ok(msg) => msg,
                Err(SocketError::WouldBlock) => return Err(SocketError::WouldBlock),
                Err(e) => self.engine_failure("recv", e),
            };

            match NodeId::try_from_header(msg.header()) {
                None => {
                    trace!(node_id = ?self.node_id, header_len = msg.header().len(), "dropping message without a valid node id header");
                    self.statistics.dropped_malformed += 1;
                }
                Some(sender) if sender == self.node_id => {
                    trace!(node_id = ?self.node_id, "dropping message sent by this node");
                    self.statistics.dropped_loopback += 1;
                }
                Some(sender) => {
                    trace!(node_id = ?self.node_id, ?sender, "received message");
                    msg.take_header();
                    self.statistics.received += 1;
                    return Ok(msg);
                }
            }
        }
    }

    fn set_option(&mut self, option: SocketOption) -> Result<(), SocketError> {
        self.engine.set_option(option)
    }

    fn get_option(&self, key: SocketOptionKey) -> Result<SocketOption, SocketError> {
        self.engine.get_option(key)
    }

    fn set_header(&self, _msg: &mut Message, header: &[u8]) -> Result<(), SocketError> {
        if !header.is_empty() {
            return Err(SocketError::InvalidArgument("BUS sockets do not support message headers"));
        }
        Ok(())
    }

    fn get_header(&self, _msg: &Message) -> Bytes {
        Bytes::new()
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use mockall::predicate::eq;
    use rstest::rstest;

    use crate::messaging::engine::MockMulticastEngine;
    use crate::util::random::{MockRandom, MOCK_RANDOM_MUTEX};

    use super::*;

    const MYSELF: NodeId = NodeId(0x1111111111111111);
    const OTHER: NodeId = NodeId(0x2222222222222222);

    fn tagged(node_id: NodeId, body: &'static [u8]) -> Message {
        Message::with_header(node_id.to_header(), body)
    }

    fn engine_with_incoming(messages: Vec<Message>) -> MockMulticastEngine {
        let mut queue = VecDeque::from(messages);
        let mut engine = MockMulticastEngine::new();
        engine.expect_recv()
            .returning(move || queue.pop_front().ok_or(SocketError::WouldBlock));
        engine
    }

    #[test]
    fn test_new_with_random() {
        let _lock = MOCK_RANDOM_MUTEX.lock();

        let ctx = MockRandom::next_u64_context();
        ctx.expect()
            .returning(|| 0x0102030405060708);

        let bus = Bus::new_with_random::<MockRandom>(MockMulticastEngine::new());
        assert_eq!(bus.node_id(), NodeId(0x0102030405060708));
    }

    #[test]
    fn test_send_tags_message() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent2 = sent.clone();

        let mut engine = MockMulticastEngine::new();
        engine.expect_send()
            .times(1)
            .returning(move |msg| {
                sent2.lock().unwrap().push(std::mem::take(msg));
                Ok(())
            });

        let mut bus = Bus::with_node_id(engine, MYSELF);
        let mut msg = Message::new(&b"ping"[..]);
        bus.send(&mut msg).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header().as_ref(), b"\x11\x11\x11\x11\x11\x11\x11\x11");
        assert_eq!(sent[0].body().as_ref(), b"ping");
        assert_eq!(bus.statistics().sent, 1);
    }

    #[test]
    fn test_send_would_block_leaves_message_untagged() {
        let mut engine = MockMulticastEngine::new();
        engine.expect_send()
            .times(1)
            .returning(|_| Err(SocketError::WouldBlock));

        let mut bus = Bus::with_node_id(engine, MYSELF);
        let mut msg = Message::new(&b"ping"[..]);
        assert!(bus.send(&mut msg).unwrap_err().is_would_block());

        assert_eq!(msg, Message::new(&b"ping"[..]));
        assert_eq!(bus.statistics().sent, 0);
    }

    #[test]
    #[should_panic(expected = "multicast engine failed on send")]
    fn test_send_engine_failure_is_fatal() {
        let mut engine = MockMulticastEngine::new();
        engine.expect_send()
            .returning(|_| Err(SocketError::Internal(anyhow::anyhow!("broken pipe"))));

        let mut bus = Bus::with_node_id(engine, MYSELF);
        let _ = bus.send(&mut Message::new(&b"ping"[..]));
    }

    #[test]
    #[should_panic(expected = "must not have a header")]
    fn test_send_with_header_is_a_contract_violation() {
        let mut bus = Bus::with_node_id(MockMulticastEngine::new(), MYSELF);
        let _ = bus.send(&mut Message::with_header(&b"x"[..], &b"ping"[..]));
    }

    #[test]
    fn test_recv_strips_header() {
        let mut bus = Bus::with_node_id(engine_with_incoming(vec![tagged(OTHER, b"ping")]), MYSELF);

        let msg = bus.recv().unwrap();
        assert!(msg.header().is_empty());
        assert_eq!(msg.body().as_ref(), b"ping");
        assert_eq!(bus.statistics().received, 1);
    }

    #[test]
    fn test_recv_empty_would_block() {
        let mut bus = Bus::with_node_id(engine_with_incoming(vec![]), MYSELF);
        assert!(bus.recv().unwrap_err().is_would_block());
    }

    #[test]
    fn test_recv_drops_loopback() {
        let mut bus = Bus::with_node_id(engine_with_incoming(vec![
            tagged(MYSELF, b"mine"),
            tagged(OTHER, b"theirs"),
            tagged(MYSELF, b"mine again"),
        ]), MYSELF);

        assert_eq!(bus.recv().unwrap().body().as_ref(), b"theirs");
        assert!(bus.recv().unwrap_err().is_would_block());

        assert_eq!(bus.statistics(), BusStatistics {
            sent: 0,
            received: 1,
            dropped_malformed: 0,
            dropped_loopback: 2,
        });
    }

    #[rstest]
    #[case::empty(b"")]
    #[case::three_bytes(b"abc")]
    #[case::seven_bytes(b"\x22\x22\x22\x22\x22\x22\x22")]
    #[case::nine_bytes(b"\x22\x22\x22\x22\x22\x22\x22\x22\x22")]
    #[case::sixteen_bytes(b"\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22\x22")]
    fn test_recv_skips_malformed_header(#[case] header: &'static [u8]) {
        let mut bus = Bus::with_node_id(engine_with_incoming(vec![
            Message::with_header(header, &b"corrupt"[..]),
            tagged(OTHER, b"valid"),
        ]), MYSELF);

        assert_eq!(bus.recv().unwrap(), Message::new(&b"valid"[..]));
        assert_eq!(bus.statistics().dropped_malformed, 1);
    }

    #[test]
    fn test_recv_only_malformed_would_block() {
        let mut bus = Bus::with_node_id(engine_with_incoming(vec![
            Message::with_header(&b"abc"[..], &b"corrupt"[..]),
            Message::new(&b"untagged"[..]),
        ]), MYSELF);

        assert!(bus.recv().unwrap_err().is_would_block());
        assert_eq!(bus.statistics().dropped_malformed, 2);
    }

    #[test]
    #[should_panic(expected = "multicast engine failed on recv")]
    fn test_recv_engine_failure_is_fatal() {
        let mut engine = MockMulticastEngine::new();
        engine.expect_recv()
            .returning(|| Err(SocketError::Internal(anyhow::anyhow!("queue poisoned"))));

        let mut bus = Bus::with_node_id(engine, MYSELF);
        let _ = bus.recv();
    }

    #[test]
    fn test_set_header() {
        let bus = Bus::with_node_id(MockMulticastEngine::new(), MYSELF);
        let mut msg = Message::new(&b"body"[..]);

        bus.set_header(&mut msg, b"").unwrap();
        assert!(bus.get_header(&msg).is_empty());

        match bus.set_header(&mut msg, b"hdr") {
            Err(SocketError::InvalidArgument(_)) => {}
            other => panic!("expected invalid argument, was {:?}", other),
        }
        assert_eq!(msg, Message::new(&b"body"[..]));
    }

    #[test]
    fn test_get_header_hides_tag() {
        let bus = Bus::with_node_id(MockMulticastEngine::new(), MYSELF);
        assert!(bus.get_header(&tagged(OTHER, b"x")).is_empty());
    }

    #[test]
    fn test_options_are_passed_through() {
        let mut engine = MockMulticastEngine::new();
        engine.expect_set_option()
            .with(eq(SocketOption::MaxMessageSize(17)))
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_get_option()
            .with(eq(SocketOptionKey::RecvQueueCapacity))
            .times(1)
            .returning(|_| Ok(SocketOption::RecvQueueCapacity(5)));

        let mut bus = Bus::with_node_id(engine, MYSELF);
        bus.set_option(SocketOption::MaxMessageSize(17)).unwrap();
        assert_eq!(bus.get_option(SocketOptionKey::RecvQueueCapacity).unwrap(), SocketOption::RecvQueueCapacity(5));
    }

    #[test]
    fn test_pipes_are_passed_through() {
        let mut engine = MockMulticastEngine::new();
        engine.expect_add_pipe()
            .with(eq(PipeId(3)))
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_remove_pipe()
            .with(eq(PipeId(3)))
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_readiness()
            .returning(|| Readiness { readable: true, writable: false });

        let mut bus = Bus::with_node_id(engine, MYSELF);
        bus.add_pipe(PipeId(3)).unwrap();
        assert_eq!(bus.readiness(), Readiness { readable: true, writable: false });
        bus.remove_pipe(PipeId(3)).unwrap();
    }
}
