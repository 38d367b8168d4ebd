//! # Topo Core - Layer 1: Inventory Foundation
//!
//! Shared vocabulary for the cluster-wide device/port inventory:
//! - Identifiers for devices, ports, providers and controller nodes
//! - Raw provider descriptions and sparse annotation sets
//! - Canonical `Device`/`Port` views and the events emitted when they change
//! - Logical timestamps used to order provider submissions
//! - Effect traits for the collaborators the store consumes (clock,
//!   mastership oracle, cluster membership and transport)
//!
//! This crate performs no I/O. Implementations of the effect traits live in
//! the runtime that hosts the store, or in `topo-testkit` for tests.

#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod annotations;
pub mod delegate;
pub mod description;
pub mod effects;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod model;
pub mod time;

pub use annotations::{Annotations, AnnotationsBuilder, SparseAnnotations};
pub use delegate::DeviceStoreDelegate;
pub use description::{DeviceDescription, DeviceType, PortDescription, PortType};
pub use errors::{ClockError, NetworkError};
pub use event::{DeviceEvent, DeviceEventKind};
pub use identifiers::{ChassisId, DeviceId, NodeId, PortNumber, ProviderId};
pub use model::{Device, Port};
pub use time::{Timestamp, Timestamped};
