//! Topo device store prelude.
//!
//! Curated re-exports for wiring and driving a store.

pub use crate::{
    AntiEntropyConfig, DeviceStore, DeviceStoreConfig, DeviceStoreDelegate, GossipDeviceStore,
    StoreEffects, StoreError, StoreResult,
};
pub use topo_core::{
    DeviceDescription, DeviceEvent, DeviceEventKind, DeviceId, PortDescription, PortNumber,
    ProviderId, SparseAnnotations,
};
