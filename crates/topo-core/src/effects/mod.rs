//! Collaborator effect traits
//!
//! The device store consumes four collaborators it never implements itself:
//! - **Clock**: issues logical timestamps per device ([`DeviceClockService`])
//! - **Mastership**: answers which node masters a device ([`MastershipService`])
//! - **Membership**: local node identity and the current member list
//!   ([`ClusterMembership`])
//! - **Transport**: best-effort broadcast/unicast with subject-based
//!   subscription ([`ClusterCommunicator`])
//!
//! Production handlers are supplied by the hosting controller runtime;
//! deterministic fakes live in `topo-testkit`.

pub mod clock;
pub mod cluster;
pub mod mastership;

pub use clock::DeviceClockService;
pub use cluster::{
    ClusterCommunicator, ClusterMembership, ClusterMessage, ClusterMessageHandler, MessageSubject,
};
pub use mastership::MastershipService;
