#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(missing_docs)]
//! # Topo Device Store - gossip-replicated inventory
//!
//! Ingests device and port facts from independent providers, reconciles them
//! into one canonical view per device and disseminates changes to peer nodes
//! without a leader, quorum or acknowledgement:
//! - **Fact table**: latest timestamped description per provider
//! - **Compositor**: deterministic merge of provider facts
//! - **Engine**: acceptance gate, availability and event emission
//! - **Replication**: broadcast of accepted local changes, peer message intake
//! - **Anti-entropy**: periodic advertisement exchange repairing lost messages
//!
//! ## Design Principles
//!
//! - **Per-device serialization**: all work on one device runs under its lock
//! - **Last-writer-wins per provider**: ordered by the device clock timestamp
//! - **Best-effort transport**: lost messages are repaired by anti-entropy
//! - **Lock-free reads**: queries are served from published views

pub mod anti_entropy;
pub mod compose;
pub mod config;
pub mod engine;
pub mod errors;
pub mod facts;
pub mod prelude;
pub mod store;
pub mod wire;

pub use config::{AntiEntropyConfig, DeviceStoreConfig};
pub use errors::{StoreError, StoreResult};
pub use store::{DeviceStore, GossipDeviceStore, StoreEffects};
pub use topo_core::DeviceStoreDelegate;
pub use wire::{WirePayload, WIRE_SCHEMA_VERSION};
