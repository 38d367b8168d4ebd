//! Canonical inventory views
//!
//! `Device` and `Port` are derived from the descriptions held for every
//! provider; they are recomputed whenever the underlying facts change and are
//! never stored independently of them.

use crate::annotations::Annotations;
use crate::description::{DeviceType, PortType};
use crate::identifiers::{ChassisId, DeviceId, PortNumber, ProviderId};
use serde::{Deserialize, Serialize};

/// Canonical device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier
    pub id: DeviceId,
    /// Provider whose description supplied the base attributes
    pub provider_id: ProviderId,
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
    /// Merged annotations across all providers
    pub annotations: Annotations,
}

/// Canonical port of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port number
    pub number: PortNumber,
    /// Enabled only as reported by a primary provider
    pub enabled: bool,
    /// Port medium
    pub port_type: PortType,
    /// Port speed in Mbps
    pub port_speed: u64,
    /// Merged annotations across all providers
    pub annotations: Annotations,
}
