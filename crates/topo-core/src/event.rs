//! Inventory change events

use crate::model::{Device, Port};
use serde::{Deserialize, Serialize};

/// Kind of inventory change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceEventKind {
    /// A device appeared
    DeviceAdded,
    /// A device's canonical attributes or annotations changed
    DeviceUpdated,
    /// A device was removed
    DeviceRemoved,
    /// A device became available or unavailable
    DeviceAvailabilityChanged,
    /// A port appeared
    PortAdded,
    /// A port's canonical view changed
    PortUpdated,
    /// A port disappeared
    PortRemoved,
}

/// Change notification carrying the affected canonical objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// What happened
    pub kind: DeviceEventKind,
    /// The device, as of the change (last known view for removals)
    pub device: Device,
    /// The port, for port events
    pub port: Option<Port>,
}

impl DeviceEvent {
    /// Device-level event
    pub fn device(kind: DeviceEventKind, device: Device) -> Self {
        Self {
            kind,
            device,
            port: None,
        }
    }

    /// Port-level event
    pub fn port(kind: DeviceEventKind, device: Device, port: Port) -> Self {
        Self {
            kind,
            device,
            port: Some(port),
        }
    }

    /// Whether the event concerns a single port
    pub fn is_port_event(&self) -> bool {
        matches!(
            self.kind,
            DeviceEventKind::PortAdded | DeviceEventKind::PortUpdated | DeviceEventKind::PortRemoved
        )
    }
}
