//! Event sink for inventory changes.

use crate::event::DeviceEvent;

/// Receives every event the store emits, for local and remote changes alike.
///
/// Called while the affected device is locked; implementations must not
/// block and must not write back to the store for the same device.
pub trait DeviceStoreDelegate: Send + Sync {
    /// Deliver one event
    fn notify(&self, event: DeviceEvent);
}
