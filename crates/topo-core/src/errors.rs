//! Collaborator error types
//!
//! Errors surfaced by the effect traits consumed by the device store.

use crate::identifiers::{DeviceId, NodeId};
use serde::{Deserialize, Serialize};

/// Failures of the device clock service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ClockError {
    /// No timestamp can be issued for the device, typically because this node
    /// holds no mastership term for it
    #[error("timestamp unavailable for device {device}")]
    Unavailable {
        /// The device a timestamp was requested for
        device: DeviceId,
    },
}

impl ClockError {
    /// Create an unavailable error
    pub fn unavailable(device: DeviceId) -> Self {
        Self::Unavailable { device }
    }
}

/// Failures of the cluster transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum NetworkError {
    /// Broadcast could not be enqueued
    #[error("broadcast on {subject} failed: {reason}")]
    BroadcastFailed {
        /// Message subject
        subject: String,
        /// Reason for the failure
        reason: String,
    },
    /// Unicast could not be enqueued
    #[error("send to {peer} on {subject} failed: {reason}")]
    SendFailed {
        /// Target node
        peer: NodeId,
        /// Message subject
        subject: String,
        /// Reason for the failure
        reason: String,
    },
    /// Target node is not a cluster member
    #[error("peer unreachable: {peer}")]
    PeerUnreachable {
        /// Target node
        peer: NodeId,
    },
}

impl NetworkError {
    /// Create a broadcast failure
    pub fn broadcast_failed(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BroadcastFailed {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Create a unicast failure
    pub fn send_failed(
        peer: NodeId,
        subject: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SendFailed {
            peer,
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}
