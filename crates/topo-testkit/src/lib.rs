//! # Topo Testkit
//!
//! Deterministic fakes for every collaborator the device store consumes,
//! plus shared fixtures:
//! - [`TestDeviceClock`]: shared ticker, fixed term per device
//! - [`StaticMastership`]: settable mastership oracle
//! - [`RecordingCommunicator`] and [`StaticMembership`]: single-node transport
//!   that records what would have been sent
//! - [`LocalCluster`]: in-memory multi-node hub with explicit, optionally
//!   shuffled, delivery
//! - [`RecordingDelegate`]: captures emitted events

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod clock;
pub mod cluster;
pub mod delegate;
pub mod fixtures;
pub mod logging;
pub mod mastership;

pub use clock::TestDeviceClock;
pub use cluster::{Envelope, LocalCluster, NodeEndpoint, RecordingCommunicator, StaticMembership};
pub use delegate::RecordingDelegate;
pub use logging::init_test_tracing;
pub use mastership::StaticMastership;
