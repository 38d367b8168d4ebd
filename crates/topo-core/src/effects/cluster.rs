//! Cluster membership and transport effects
//!
//! Transport is best-effort: messages may be lost, duplicated by retries of
//! the caller, or delivered in any order. `broadcast` and `unicast` only
//! enqueue, so they are safe to call while holding a per-device lock.

use crate::errors::NetworkError;
use crate::identifiers::NodeId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Topic a message is published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageSubject(&'static str);

impl MessageSubject {
    /// Create a subject
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Subject name
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MessageSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Message received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMessage {
    /// Node that sent the message
    pub sender: NodeId,
    /// Subject it was published under
    pub subject: MessageSubject,
    /// Encoded payload
    pub payload: Vec<u8>,
}

/// Receiver for messages on one subject
#[async_trait]
pub trait ClusterMessageHandler: Send + Sync {
    /// Handle one inbound message
    async fn handle(&self, message: ClusterMessage);
}

/// Local node identity and cluster member list
pub trait ClusterMembership: Send + Sync {
    /// This node
    fn local_node(&self) -> NodeId;

    /// All current members, the local node included
    fn nodes(&self) -> Vec<NodeId>;
}

/// Best-effort cluster transport
pub trait ClusterCommunicator: Send + Sync {
    /// Enqueue `payload` for every other member
    fn broadcast(&self, subject: &MessageSubject, payload: Vec<u8>) -> Result<(), NetworkError>;

    /// Enqueue `payload` for `to`
    fn unicast(
        &self,
        subject: &MessageSubject,
        payload: Vec<u8>,
        to: &NodeId,
    ) -> Result<(), NetworkError>;

    /// Route messages on `subject` to `handler`, replacing any previous one
    fn subscribe(&self, subject: MessageSubject, handler: Arc<dyn ClusterMessageHandler>);

    /// Stop routing messages on `subject`
    fn unsubscribe(&self, subject: &MessageSubject);
}
