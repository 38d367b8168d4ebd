//! Raw provider descriptions
//!
//! Descriptions are what a provider reports about a device or one of its
//! ports. They are stored per provider and merged into canonical views by the
//! device store; they are never exposed to consumers as the canonical truth.

use crate::annotations::SparseAnnotations;
use crate::identifiers::{ChassisId, PortNumber};
use serde::{Deserialize, Serialize};

/// Broad class of a network device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Packet switch
    #[default]
    Switch,
    /// Router
    Router,
    /// Optical add/drop multiplexer
    Roadm,
    /// Anything else
    Other,
}

/// Physical medium of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Copper ethernet
    #[default]
    Copper,
    /// Fiber
    Fiber,
    /// Virtual port
    Virtual,
}

/// A provider's description of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescription {
    /// Device URI as reported by the provider
    pub uri: String,
    /// Device class
    pub device_type: DeviceType,
    /// Manufacturer name
    pub manufacturer: String,
    /// Hardware version
    pub hw_version: String,
    /// Software version
    pub sw_version: String,
    /// Serial number
    pub serial_number: String,
    /// Chassis identifier
    pub chassis_id: ChassisId,
    /// Whether a primary provider reporting this description makes the
    /// device available; `false` registers the device as present only
    pub default_available: bool,
    /// Sparse annotations contributed by this provider
    pub annotations: SparseAnnotations,
}

impl DeviceDescription {
    /// Create a default-available switch description without annotations
    pub fn new(
        uri: impl Into<String>,
        manufacturer: impl Into<String>,
        hw_version: impl Into<String>,
        sw_version: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            device_type: DeviceType::Switch,
            manufacturer: manufacturer.into(),
            hw_version: hw_version.into(),
            sw_version: sw_version.into(),
            serial_number: serial_number.into(),
            chassis_id: ChassisId::default(),
            default_available: true,
            annotations: SparseAnnotations::empty(),
        }
    }

    /// Replace the annotations
    pub fn with_annotations(mut self, annotations: SparseAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Replace the device type
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Replace the chassis identifier
    pub fn with_chassis_id(mut self, chassis_id: ChassisId) -> Self {
        self.chassis_id = chassis_id;
        self
    }

    /// Set whether the description makes the device available by default
    pub fn with_default_available(mut self, default_available: bool) -> Self {
        self.default_available = default_available;
        self
    }
}

/// A provider's description of one port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescription {
    /// Port number on the device
    pub number: PortNumber,
    /// Whether the provider sees the port as enabled
    pub enabled: bool,
    /// Provider-level tombstone: the provider no longer reports this port
    pub removed: bool,
    /// Port medium
    pub port_type: PortType,
    /// Port speed in Mbps
    pub port_speed: u64,
    /// Sparse annotations contributed by this provider
    pub annotations: SparseAnnotations,
}

impl PortDescription {
    /// Create a copper port description without annotations
    pub fn new(number: impl Into<PortNumber>, enabled: bool) -> Self {
        Self {
            number: number.into(),
            enabled,
            removed: false,
            port_type: PortType::Copper,
            port_speed: 1000,
            annotations: SparseAnnotations::empty(),
        }
    }

    /// Tombstone description for `number`
    pub fn removed(number: impl Into<PortNumber>) -> Self {
        Self {
            removed: true,
            ..Self::new(number, false)
        }
    }

    /// Replace the annotations
    pub fn with_annotations(mut self, annotations: SparseAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Replace medium and speed
    pub fn with_type(mut self, port_type: PortType, port_speed: u64) -> Self {
        self.port_type = port_type;
        self.port_speed = port_speed;
        self
    }

    /// Whether this description reports a live port
    pub fn is_live(&self) -> bool {
        !self.removed
    }
}
