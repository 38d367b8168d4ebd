//! In-memory cluster transport and membership
//!
//! [`RecordingCommunicator`] stands in for the transport of a single store and
//! only records outgoing messages. [`LocalCluster`] wires several stores
//! together: sends are queued and nothing is delivered until a test calls
//! [`LocalCluster::deliver_all`] or [`LocalCluster::deliver_shuffled`], so
//! tests decide exactly when, in which order and whether messages arrive.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use topo_core::effects::{
    ClusterCommunicator, ClusterMembership, ClusterMessage, ClusterMessageHandler, MessageSubject,
};
use topo_core::{NetworkError, NodeId};

/// Fixed membership for single-node tests
#[derive(Debug, Clone)]
pub struct StaticMembership {
    local: NodeId,
    nodes: Vec<NodeId>,
}

impl StaticMembership {
    /// Cluster consisting of `local` only
    pub fn single(local: NodeId) -> Self {
        Self {
            nodes: vec![local.clone()],
            local,
        }
    }

    /// Cluster of `local` plus `others`
    pub fn with_peers(local: NodeId, others: impl IntoIterator<Item = NodeId>) -> Self {
        let mut nodes = vec![local.clone()];
        nodes.extend(others);
        Self { local, nodes }
    }
}

impl ClusterMembership for StaticMembership {
    fn local_node(&self) -> NodeId {
        self.local.clone()
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }
}

/// A message as handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sending node
    pub from: NodeId,
    /// Target node; `None` for broadcasts
    pub to: Option<NodeId>,
    /// Subject
    pub subject: MessageSubject,
    /// Encoded payload
    pub payload: Vec<u8>,
}

/// Transport that records sends instead of delivering them
#[derive(Default)]
pub struct RecordingCommunicator {
    local: Option<NodeId>,
    sent: Mutex<Vec<Envelope>>,
    handlers: Mutex<HashMap<MessageSubject, Arc<dyn ClusterMessageHandler>>>,
    failing: AtomicBool,
}

impl RecordingCommunicator {
    /// Recorder for sends from `local`
    pub fn new(local: NodeId) -> Self {
        Self {
            local: Some(local),
            ..Self::default()
        }
    }

    /// Make every later send fail
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every recorded send
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    /// Recorded broadcasts
    pub fn broadcasts(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|e| e.to.is_none())
            .cloned()
            .collect()
    }

    /// Recorded unicasts
    pub fn unicasts(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|e| e.to.is_some())
            .cloned()
            .collect()
    }

    /// Drain recorded sends
    pub fn take(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Subjects with a subscribed handler
    pub fn subscribed(&self) -> Vec<MessageSubject> {
        let mut subjects: Vec<_> = self.handlers.lock().keys().copied().collect();
        subjects.sort();
        subjects
    }

    /// Hand a message straight to the handler subscribed on its subject
    pub async fn inject(&self, message: ClusterMessage) -> bool {
        let handler = self.handlers.lock().get(&message.subject).cloned();
        match handler {
            Some(handler) => {
                handler.handle(message).await;
                true
            }
            None => false,
        }
    }

    fn record(&self, envelope: Envelope) -> Result<(), NetworkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(match &envelope.to {
                Some(peer) => NetworkError::send_failed(
                    peer.clone(),
                    envelope.subject.as_str(),
                    "injected failure",
                ),
                None => NetworkError::broadcast_failed(envelope.subject.as_str(), "injected failure"),
            });
        }
        self.sent.lock().push(envelope);
        Ok(())
    }

    fn local(&self) -> NodeId {
        self.local.clone().unwrap_or_else(|| NodeId::new("local"))
    }
}

impl ClusterCommunicator for RecordingCommunicator {
    fn broadcast(&self, subject: &MessageSubject, payload: Vec<u8>) -> Result<(), NetworkError> {
        self.record(Envelope {
            from: self.local(),
            to: None,
            subject: *subject,
            payload,
        })
    }

    fn unicast(
        &self,
        subject: &MessageSubject,
        payload: Vec<u8>,
        to: &NodeId,
    ) -> Result<(), NetworkError> {
        self.record(Envelope {
            from: self.local(),
            to: Some(to.clone()),
            subject: *subject,
            payload,
        })
    }

    fn subscribe(&self, subject: MessageSubject, handler: Arc<dyn ClusterMessageHandler>) {
        self.handlers.lock().insert(subject, handler);
    }

    fn unsubscribe(&self, subject: &MessageSubject) {
        self.handlers.lock().remove(subject);
    }
}

#[derive(Default)]
struct Hub {
    nodes: Vec<NodeId>,
    handlers: HashMap<(NodeId, MessageSubject), Arc<dyn ClusterMessageHandler>>,
    pending: VecDeque<Envelope>,
    delivered: usize,
}

/// In-memory cluster connecting several nodes
#[derive(Clone, Default)]
pub struct LocalCluster {
    hub: Arc<Mutex<Hub>>,
}

impl LocalCluster {
    /// Cluster with the given member names
    pub fn new(names: &[&str]) -> Self {
        let hub = Hub {
            nodes: names.iter().map(|n| NodeId::new(*n)).collect(),
            ..Hub::default()
        };
        Self {
            hub: Arc::new(Mutex::new(hub)),
        }
    }

    /// Member list
    pub fn nodes(&self) -> Vec<NodeId> {
        self.hub.lock().nodes.clone()
    }

    /// Transport and membership view of one member
    pub fn endpoint(&self, node: &NodeId) -> Arc<NodeEndpoint> {
        Arc::new(NodeEndpoint {
            node: node.clone(),
            hub: self.hub.clone(),
        })
    }

    /// Messages waiting for delivery
    pub fn pending(&self) -> usize {
        self.hub.lock().pending.len()
    }

    /// Messages delivered so far
    pub fn delivered(&self) -> usize {
        self.hub.lock().delivered
    }

    /// Pending messages, oldest first
    pub fn pending_envelopes(&self) -> Vec<Envelope> {
        self.hub.lock().pending.iter().cloned().collect()
    }

    /// Lose every pending message; returns how many were dropped
    pub fn drop_pending(&self) -> usize {
        let mut hub = self.hub.lock();
        let dropped = hub.pending.len();
        hub.pending.clear();
        dropped
    }

    /// Lose pending messages matching `predicate`
    pub fn drop_where(&self, predicate: impl Fn(&Envelope) -> bool) -> usize {
        let mut hub = self.hub.lock();
        let before = hub.pending.len();
        hub.pending.retain(|e| !predicate(e));
        before - hub.pending.len()
    }

    /// Deliver in send order until nothing is pending, including messages
    /// sent while handling earlier ones. Returns the number delivered.
    pub async fn deliver_all(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.hub.lock().pending.pop_front();
            let Some(envelope) = next else {
                break;
            };
            self.deliver(envelope).await;
            count += 1;
        }
        count
    }

    /// Like [`Self::deliver_all`], but each batch of pending messages is
    /// delivered in an order derived from `seed`
    pub async fn deliver_shuffled(&self, seed: u64) -> usize {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut count = 0;
        loop {
            let mut batch: Vec<Envelope> = self.hub.lock().pending.drain(..).collect();
            if batch.is_empty() {
                break;
            }
            batch.shuffle(&mut rng);
            for envelope in batch {
                self.deliver(envelope).await;
                count += 1;
            }
        }
        count
    }

    async fn deliver(&self, envelope: Envelope) {
        let Some(to) = envelope.to.clone() else {
            return;
        };
        let handler = {
            let mut hub = self.hub.lock();
            hub.delivered += 1;
            hub.handlers.get(&(to.clone(), envelope.subject)).cloned()
        };
        match handler {
            Some(handler) => {
                handler
                    .handle(ClusterMessage {
                        sender: envelope.from,
                        subject: envelope.subject,
                        payload: envelope.payload,
                    })
                    .await
            }
            None => {
                tracing::debug!(node = %to, subject = %envelope.subject, "No handler; message dropped")
            }
        }
    }
}

/// One member's view of a [`LocalCluster`]
pub struct NodeEndpoint {
    node: NodeId,
    hub: Arc<Mutex<Hub>>,
}

impl ClusterMembership for NodeEndpoint {
    fn local_node(&self) -> NodeId {
        self.node.clone()
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.hub.lock().nodes.clone()
    }
}

impl ClusterCommunicator for NodeEndpoint {
    fn broadcast(&self, subject: &MessageSubject, payload: Vec<u8>) -> Result<(), NetworkError> {
        let mut hub = self.hub.lock();
        let targets: Vec<NodeId> = hub
            .nodes
            .iter()
            .filter(|n| **n != self.node)
            .cloned()
            .collect();
        for to in targets {
            hub.pending.push_back(Envelope {
                from: self.node.clone(),
                to: Some(to),
                subject: *subject,
                payload: payload.clone(),
            });
        }
        Ok(())
    }

    fn unicast(
        &self,
        subject: &MessageSubject,
        payload: Vec<u8>,
        to: &NodeId,
    ) -> Result<(), NetworkError> {
        let mut hub = self.hub.lock();
        if !hub.nodes.contains(to) {
            return Err(NetworkError::PeerUnreachable { peer: to.clone() });
        }
        hub.pending.push_back(Envelope {
            from: self.node.clone(),
            to: Some(to.clone()),
            subject: *subject,
            payload,
        });
        Ok(())
    }

    fn subscribe(&self, subject: MessageSubject, handler: Arc<dyn ClusterMessageHandler>) {
        self.hub
            .lock()
            .handlers
            .insert((self.node.clone(), subject), handler);
    }

    fn unsubscribe(&self, subject: &MessageSubject) {
        self.hub.lock().handlers.remove(&(self.node.clone(), *subject));
    }
}
