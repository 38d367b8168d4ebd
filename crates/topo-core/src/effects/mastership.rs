//! Mastership oracle effect

use crate::identifiers::{DeviceId, NodeId};

/// Answers which controller node currently masters a device
pub trait MastershipService: Send + Sync {
    /// Current master of `device`, if any
    fn master_for(&self, device: &DeviceId) -> Option<NodeId>;
}
