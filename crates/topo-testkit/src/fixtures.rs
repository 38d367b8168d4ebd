//! Shared inventory fixtures
//!
//! Two devices, one primary and one ancillary provider, and a few annotation
//! sets that add, overwrite and tombstone keys.

use topo_core::{
    DeviceDescription, DeviceId, NodeId, PortDescription, PortNumber, ProviderId,
    SparseAnnotations,
};

pub const MFR: &str = "whitebox";
pub const HW: &str = "1.1.x";
pub const SW1: &str = "3.8.1";
pub const SW2: &str = "3.9.5";
pub const SN: &str = "43311-12345";

pub const P1: PortNumber = PortNumber(1);
pub const P2: PortNumber = PortNumber(2);
pub const P3: PortNumber = PortNumber(3);

/// Primary provider
pub fn pid() -> ProviderId {
    ProviderId::new("of", "foo")
}

/// Ancillary provider
pub fn pida() -> ProviderId {
    ProviderId::ancillary("of", "bar")
}

pub fn did1() -> DeviceId {
    DeviceId::new("of:foo")
}

pub fn did2() -> DeviceId {
    DeviceId::new("of:bar")
}

pub fn node1() -> NodeId {
    NodeId::new("node1")
}

pub fn node2() -> NodeId {
    NodeId::new("node2")
}

/// `{A1: a1, B1: b1}`
pub fn a1() -> SparseAnnotations {
    SparseAnnotations::builder().set("A1", "a1").set("B1", "b1").build()
}

/// Removes `A1`, adds `B3`
pub fn a1_2() -> SparseAnnotations {
    SparseAnnotations::builder().remove("A1").set("B3", "b3").build()
}

/// `{A2: a2, B2: b2}`
pub fn a2() -> SparseAnnotations {
    SparseAnnotations::builder().set("A2", "a2").set("B2", "b2").build()
}

/// Removes `A2`, adds `B4`
pub fn a2_2() -> SparseAnnotations {
    SparseAnnotations::builder().remove("A2").set("B4", "b4").build()
}

/// Description of `device` with the given software version and annotations
pub fn device_description(
    device: &DeviceId,
    sw_version: &str,
    annotations: SparseAnnotations,
) -> DeviceDescription {
    DeviceDescription::new(device.uri(), MFR, HW, sw_version, SN).with_annotations(annotations)
}

/// Enabled or disabled port without annotations
pub fn port(number: PortNumber, enabled: bool) -> PortDescription {
    PortDescription::new(number, enabled)
}

/// Port carrying `annotations`
pub fn annotated_port(
    number: PortNumber,
    enabled: bool,
    annotations: SparseAnnotations,
) -> PortDescription {
    PortDescription::new(number, enabled).with_annotations(annotations)
}
