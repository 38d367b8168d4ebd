//! Replication wire format.
//!
//! Every message travels in a [`WireMessage`] envelope encoded with bincode.
//! Receivers reject envelopes carrying a different schema version.

use crate::errors::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use topo_core::effects::MessageSubject;
use topo_core::{DeviceDescription, DeviceId, NodeId, PortDescription, PortNumber, ProviderId, Timestamp};

pub const WIRE_SCHEMA_VERSION: u16 = 1;

/// Subjects the store publishes and subscribes to.
pub mod subjects {
    use super::MessageSubject;

    pub const DEVICE_UPDATE: MessageSubject = MessageSubject::new("peer-device-updates");
    pub const DEVICE_OFFLINE: MessageSubject = MessageSubject::new("peer-device-offline");
    pub const DEVICE_REMOVED: MessageSubject = MessageSubject::new("peer-device-removed");
    pub const DEVICE_REMOVE_REQ: MessageSubject = MessageSubject::new("peer-device-remove-request");
    pub const PORT_UPDATE: MessageSubject = MessageSubject::new("peer-port-updates");
    pub const PORT_STATUS_UPDATE: MessageSubject = MessageSubject::new("peer-port-status-updates");
    pub const DEVICE_ADVERTISE: MessageSubject = MessageSubject::new("peer-device-advertisements");

    /// Every subject handled by the store
    pub const ALL: [MessageSubject; 7] = [
        DEVICE_UPDATE,
        DEVICE_OFFLINE,
        DEVICE_REMOVED,
        DEVICE_REMOVE_REQ,
        PORT_UPDATE,
        PORT_STATUS_UPDATE,
        DEVICE_ADVERTISE,
    ];
}

/// A provider's merged device description as accepted by the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalDeviceChange {
    pub device_id: DeviceId,
    pub provider_id: ProviderId,
    pub timestamp: Timestamp,
    pub description: DeviceDescription,
}

/// Port descriptions stored by one bulk port update, tombstones included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalPortChange {
    pub device_id: DeviceId,
    pub provider_id: ProviderId,
    pub timestamp: Timestamp,
    pub descriptions: Vec<PortDescription>,
}

/// A single port description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalPortStatusChange {
    pub device_id: DeviceId,
    pub provider_id: ProviderId,
    pub timestamp: Timestamp,
    pub description: PortDescription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalDeviceOffline {
    pub device_id: DeviceId,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalDeviceRemoved {
    pub device_id: DeviceId,
    pub timestamp: Timestamp,
}

/// Ask the master of a device to remove it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalRemoveRequest {
    pub device_id: DeviceId,
}

/// Identifies one provider's device description
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceFragmentId {
    pub device_id: DeviceId,
    pub provider_id: ProviderId,
}

/// Identifies one provider's description of one port
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortFragmentId {
    pub device_id: DeviceId,
    pub provider_id: ProviderId,
    pub number: PortNumber,
}

/// Summary of every timestamp a node holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAdvertisement {
    pub sender: Option<NodeId>,
    /// Replies never trigger another reply
    pub is_reply: bool,
    pub devices: BTreeMap<DeviceFragmentId, Timestamp>,
    pub ports: BTreeMap<PortFragmentId, Timestamp>,
    pub offline: BTreeMap<DeviceId, Timestamp>,
    pub removed: BTreeMap<DeviceId, Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WirePayload {
    DeviceChange(InternalDeviceChange),
    PortChange(InternalPortChange),
    PortStatusChange(InternalPortStatusChange),
    DeviceOffline(InternalDeviceOffline),
    DeviceRemoved(InternalDeviceRemoved),
    RemoveRequest(InternalRemoveRequest),
    Advertisement(DeviceAdvertisement),
}

impl WirePayload {
    /// Subject this payload is published under
    pub fn subject(&self) -> MessageSubject {
        match self {
            WirePayload::DeviceChange(_) => subjects::DEVICE_UPDATE,
            WirePayload::PortChange(_) => subjects::PORT_UPDATE,
            WirePayload::PortStatusChange(_) => subjects::PORT_STATUS_UPDATE,
            WirePayload::DeviceOffline(_) => subjects::DEVICE_OFFLINE,
            WirePayload::DeviceRemoved(_) => subjects::DEVICE_REMOVED,
            WirePayload::RemoveRequest(_) => subjects::DEVICE_REMOVE_REQ,
            WirePayload::Advertisement(_) => subjects::DEVICE_ADVERTISE,
        }
    }

    /// Device the payload concerns, `None` for advertisements
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            WirePayload::DeviceChange(m) => Some(&m.device_id),
            WirePayload::PortChange(m) => Some(&m.device_id),
            WirePayload::PortStatusChange(m) => Some(&m.device_id),
            WirePayload::DeviceOffline(m) => Some(&m.device_id),
            WirePayload::DeviceRemoved(m) => Some(&m.device_id),
            WirePayload::RemoveRequest(m) => Some(&m.device_id),
            WirePayload::Advertisement(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            WirePayload::DeviceChange(_) => "device change",
            WirePayload::PortChange(_) => "port change",
            WirePayload::PortStatusChange(_) => "port status change",
            WirePayload::DeviceOffline(_) => "device offline",
            WirePayload::DeviceRemoved(_) => "device removed",
            WirePayload::RemoveRequest(_) => "remove request",
            WirePayload::Advertisement(_) => "advertisement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub schema_version: u16,
    pub payload: WirePayload,
}

impl WireMessage {
    pub fn new(payload: WirePayload) -> Self {
        Self {
            schema_version: WIRE_SCHEMA_VERSION,
            payload,
        }
    }
}

pub fn encode(payload: &WirePayload) -> StoreResult<Vec<u8>> {
    let message = WireMessage::new(payload.clone());
    bincode::serialize(&message).map_err(|e| StoreError::encode(payload.kind(), e))
}

pub fn decode(bytes: &[u8]) -> StoreResult<WirePayload> {
    let message: WireMessage = bincode::deserialize(bytes).map_err(StoreError::decode)?;
    if message.schema_version != WIRE_SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            found: message.schema_version,
            expected: WIRE_SCHEMA_VERSION,
        });
    }
    Ok(message.payload)
}
