//! Settable mastership oracle

use parking_lot::Mutex;
use std::collections::HashMap;
use topo_core::effects::MastershipService;
use topo_core::{DeviceId, NodeId};

/// Mastership table set directly by tests
#[derive(Debug, Default)]
pub struct StaticMastership {
    masters: Mutex<HashMap<DeviceId, NodeId>>,
    fallback: Option<NodeId>,
}

impl StaticMastership {
    /// Oracle with no masters
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle answering `node` for every device without an explicit entry
    pub fn everything_on(node: NodeId) -> Self {
        Self {
            masters: Mutex::new(HashMap::new()),
            fallback: Some(node),
        }
    }

    /// Make `node` master of `device`
    pub fn set_master(&self, device: DeviceId, node: NodeId) {
        self.masters.lock().insert(device, node);
    }

    /// Forget the explicit master of `device`
    pub fn clear(&self, device: &DeviceId) {
        self.masters.lock().remove(device);
    }
}

impl MastershipService for StaticMastership {
    fn master_for(&self, device: &DeviceId) -> Option<NodeId> {
        self.masters
            .lock()
            .get(device)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}
