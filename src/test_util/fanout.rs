//! An in-memory [MulticastEngine]: engines created from the same [InProcHub] can be connected
//!  to each other (and to themselves) through pipes, and each message sent is copied to the
//!  inboxes of all connected peers.
//!
//! There is no flow control beyond bounded inboxes: a copy for a peer with a full inbox is
//!  dropped, and `send` only reports [SocketError::WouldBlock] if none of the peers has room.

use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::messaging::engine::{MulticastEngine, PipeId, Readiness};
use crate::messaging::error::SocketError;
use crate::messaging::message::Message;
use crate::messaging::options::{SocketOption, SocketOptionKey};

#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// number of messages an engine's inbox holds before further copies are dropped
    pub recv_queue_capacity: usize,
    /// maximum body size in bytes accepted on delivery
    pub max_message_size: usize,
}

impl FanoutConfig {
    pub fn new() -> FanoutConfig {
        FanoutConfig {
            recv_queue_capacity: 1024,
            max_message_size: 1024*1024,
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Eq, PartialEq)]
enum Delivery {
    Delivered,
    Full,
    TooLarge,
}

struct InboxQueue {
    messages: VecDeque<Message>,
    capacity: usize,
    max_message_size: usize,
}

struct Inbox {
    queue: Mutex<InboxQueue>,
    notify: Notify,
}

impl Inbox {
    fn new(config: &FanoutConfig) -> Inbox {
        Inbox {
            queue: Mutex::new(InboxQueue {
                messages: VecDeque::new(),
                capacity: config.recv_queue_capacity,
                max_message_size: config.max_message_size,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InboxQueue> {
        // the queue stays consistent even if a holder of the lock panicked
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, msg: Message) -> Delivery {
        {
            let mut queue = self.lock();
            if msg.body().len() > queue.max_message_size {
                return Delivery::TooLarge;
            }
            if queue.messages.len() >= queue.capacity {
                return Delivery::Full;
            }
            queue.messages.push_back(msg);
        }
        self.notify.notify_one();
        Delivery::Delivered
    }

    fn has_room(&self) -> bool {
        let queue = self.lock();
        queue.messages.len() < queue.capacity
    }

    fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    fn pop(&self) -> Option<Message> {
        self.lock().messages.pop_front()
    }
}

struct HubInner {
    config: FanoutConfig,
    next_id: AtomicU32,
    inboxes: Mutex<FxHashMap<PipeId, Weak<Inbox>>>,
}

/// Registry of in-process engines. Cloning a hub is cheap, clones share the registry.
#[derive(Clone)]
pub struct InProcHub {
    inner: Arc<HubInner>,
}

impl Debug for InProcHub {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "InProcHub{{config:{:?}}}", self.inner.config)
    }
}

impl InProcHub {
    pub fn new(config: FanoutConfig) -> InProcHub {
        InProcHub {
            inner: Arc::new(HubInner {
                config,
                next_id: AtomicU32::new(1),
                inboxes: Default::default(),
            }),
        }
    }

    /// Creates a new engine with no pipes. Other engines can connect to it through its
    ///  [InProcEngine::id].
    pub fn engine(&self) -> InProcEngine {
        let id = PipeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let inbox = Arc::new(Inbox::new(&self.inner.config));
        self.registry().insert(id, Arc::downgrade(&inbox));

        debug!(?id, "created in-process engine");
        InProcEngine {
            id,
            hub: self.clone(),
            inbox,
            pipes: Default::default(),
        }
    }

    /// Puts a raw message into an engine's inbox, bypassing any protocol. This simulates
    ///  traffic from a foreign or misbehaving peer.
    pub fn inject(&self, to: PipeId, msg: Message) -> Result<(), SocketError> {
        let inbox = self.lookup(to)
            .ok_or(SocketError::InvalidArgument("unknown engine"))?;
        match inbox.deliver(msg) {
            Delivery::Full => Err(SocketError::WouldBlock),
            Delivery::Delivered | Delivery::TooLarge => Ok(()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, FxHashMap<PipeId, Weak<Inbox>>> {
        self.inner.inboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, id: PipeId) -> Option<Arc<Inbox>> {
        self.registry().get(&id)
            .and_then(|inbox| inbox.upgrade())
    }

    fn unregister(&self, id: PipeId) {
        self.registry().remove(&id);
    }
}

pub struct InProcEngine {
    id: PipeId,
    hub: InProcHub,
    inbox: Arc<Inbox>,
    /// peers' inboxes - engines can be dropped while others still have pipes to them
    pipes: FxHashMap<PipeId, Weak<Inbox>>,
}

impl Debug for InProcEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "InProcEngine{{id:{:?}, pipes:{:?}}}", self.id, self.pipes.keys().collect::<Vec<_>>())
    }
}

impl Drop for InProcEngine {
    fn drop(&mut self) {
        debug!(id = ?self.id, "closing in-process engine");
        self.hub.unregister(self.id);
    }
}

impl InProcEngine {
    /// The id under which other engines can add a pipe to this engine
    pub fn id(&self) -> PipeId {
        self.id
    }

    fn live_peers(&mut self) -> Vec<Arc<Inbox>> {
        let own_id = self.id;
        self.pipes.retain(|pipe, inbox| {
            let is_alive = inbox.strong_count() > 0;
            if !is_alive {
                debug!(id = ?own_id, ?pipe, "peer is gone - removing pipe");
            }
            is_alive
        });
        self.pipes.values()
            .filter_map(|inbox| inbox.upgrade())
            .collect()
    }
}

#[async_trait]
impl MulticastEngine for InProcEngine {
    fn add_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        if self.pipes.contains_key(&pipe) {
            return Ok(());
        }
        let inbox = self.hub.lookup(pipe)
            .ok_or(SocketError::InvalidArgument("unknown peer"))?;
        self.pipes.insert(pipe, Arc::downgrade(&inbox));
        Ok(())
    }

    fn remove_pipe(&mut self, pipe: PipeId) -> Result<(), SocketError> {
        match self.pipes.remove(&pipe) {
            Some(_) => Ok(()),
            None => Err(SocketError::InvalidArgument("no such pipe")),
        }
    }

    fn readiness(&self) -> Readiness {
        let mut peers = self.pipes.values()
            .filter_map(|inbox| inbox.upgrade())
            .peekable();
        let writable = peers.peek().is_none() || peers.any(|inbox| inbox.has_room());

        Readiness {
            readable: !self.inbox.is_empty(),
            writable,
        }
    }

    async fn readable(&self) {
        if !self.inbox.is_empty() {
            return;
        }
        self.inbox.notify.notified().await;
    }

    fn send(&mut self, msg: &mut Message) -> Result<(), SocketError> {
        let peers = self.live_peers();
        if !peers.is_empty() && !peers.iter().any(|inbox| inbox.has_room()) {
            return Err(SocketError::WouldBlock);
        }

        let msg = std::mem::take(msg);
        if peers.is_empty() {
            trace!(id = ?self.id, "no pipes - dropping message");
        }
        for inbox in peers {
            match inbox.deliver(msg.clone()) {
                Delivery::Delivered => {}
                Delivery::Full => trace!(id = ?self.id, "peer inbox is full - dropping copy"),
                Delivery::TooLarge => trace!(id = ?self.id, len = msg.body().len(), "message exceeds peer's max message size - dropping copy"),
            }
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Message, SocketError> {
        self.inbox.pop()
            .ok_or(SocketError::WouldBlock)
    }

    fn set_option(&mut self, option: SocketOption) -> Result<(), SocketError> {
        let mut queue = self.inbox.lock();
        match option {
            SocketOption::RecvQueueCapacity(0) => Err(SocketError::InvalidArgument("receive queue capacity must be positive")),
            SocketOption::RecvQueueCapacity(n) => {
                queue.capacity = n;
                Ok(())
            }
            SocketOption::MaxMessageSize(0) => Err(SocketError::InvalidArgument("max message size must be positive")),
            SocketOption::MaxMessageSize(n) => {
                queue.max_message_size = n;
                Ok(())
            }
        }
    }

    fn get_option(&self, key: SocketOptionKey) -> Result<SocketOption, SocketError> {
        let queue = self.inbox.lock();
        Ok(match key {
            SocketOptionKey::RecvQueueCapacity => SocketOption::RecvQueueCapacity(queue.capacity),
            SocketOptionKey::MaxMessageSize => SocketOption::MaxMessageSize(queue.max_message_size),
        })
    }
}
