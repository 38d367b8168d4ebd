//! Recording event sink

use parking_lot::Mutex;
use topo_core::{DeviceEvent, DeviceEventKind, DeviceStoreDelegate};

/// Delegate that keeps every event it is handed
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<DeviceEvent>>,
}

impl RecordingDelegate {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().clone()
    }

    /// Kinds of all events so far
    pub fn kinds(&self) -> Vec<DeviceEventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<DeviceEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl DeviceStoreDelegate for RecordingDelegate {
    fn notify(&self, event: DeviceEvent) {
        self.events.lock().push(event);
    }
}
