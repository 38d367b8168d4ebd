//! Compositor: derives canonical views from provider facts.
//!
//! Views are rebuilt from scratch on every call. Base attributes come only
//! from the base provider; annotations start from the base provider's set and
//! then take every other provider's set in `ProviderId` order, so later sets
//! overwrite or tombstone earlier keys.

use crate::facts::FactTable;
use std::collections::BTreeSet;
use topo_core::{Device, DeviceId, Port, PortDescription, PortNumber, SparseAnnotations};

/// Canonical device, `None` when no provider holds a description
pub fn compose_device(id: &DeviceId, facts: &FactTable) -> Option<Device> {
    let (base, base_facts) = facts.base_facts()?;
    let description = &base_facts.device().value;

    let annotations = facts
        .get_all()
        .iter()
        .filter(|(provider, _)| *provider != base)
        .fold(description.annotations.clone(), |acc, (_, other)| {
            acc.union(&other.device().value.annotations)
        });

    Some(Device {
        id: id.clone(),
        provider_id: base.clone(),
        device_type: description.device_type,
        manufacturer: description.manufacturer.clone(),
        hw_version: description.hw_version.clone(),
        sw_version: description.sw_version.clone(),
        serial_number: description.serial_number.clone(),
        chassis_id: description.chassis_id,
        annotations: annotations.to_annotations(),
    })
}

/// Canonical port, `None` unless some provider holds a live description
pub fn compose_port(facts: &FactTable, number: PortNumber) -> Option<Port> {
    let base = facts.base_provider()?;
    let base_live = facts.get(base).and_then(|f| f.live_port(number));

    let mut live = facts
        .get_all()
        .iter()
        .filter_map(|(provider, f)| f.live_port(number).map(|d| (provider, d)));
    let (_, first_live) = live.next()?;

    let enabled = match base_live {
        Some(desc) if !base.is_ancillary() => desc.enabled,
        _ => false,
    };
    let shape: &PortDescription = base_live.unwrap_or(first_live);

    let others = facts
        .get_all()
        .iter()
        .filter(|(provider, _)| *provider != base)
        .filter_map(|(_, f)| f.live_port(number))
        .map(|d| &d.annotations);
    let annotations = base_live
        .map(|d| d.annotations.clone())
        .unwrap_or_else(SparseAnnotations::empty);
    let annotations = others.fold(annotations, |acc, set| acc.union(set));

    Some(Port {
        number,
        enabled,
        port_type: shape.port_type,
        port_speed: shape.port_speed,
        annotations: annotations.to_annotations(),
    })
}

/// Every port number any provider holds a description for, tombstones included
pub fn known_port_numbers(facts: &FactTable) -> BTreeSet<PortNumber> {
    facts
        .get_all()
        .values()
        .flat_map(|f| f.ports().keys().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Merge;
    use topo_core::{DeviceDescription, PortType, ProviderId, Timestamp, Timestamped};

    fn put(table: &mut FactTable, provider: &ProviderId, sw: &str, annotations: SparseAnnotations) {
        let description = DeviceDescription::new("of:0001", "whitebox", "1.1.x", sw, "sn")
            .with_annotations(annotations);
        let submission = Timestamped::new(description, Timestamp::new(1, 1));
        table.put(provider, submission, Merge::Accumulate);
    }

    fn put_port(table: &mut FactTable, provider: &ProviderId, port: PortDescription) {
        let submission = Timestamped::new(port, Timestamp::new(1, 2));
        table.put_port(provider, submission, Merge::Accumulate);
    }

    #[test]
    fn base_attributes_come_from_primary_only() {
        let primary = ProviderId::new("of", "foo");
        let anc = ProviderId::ancillary("of", "bar");
        let mut table = FactTable::new();
        put(&mut table, &anc, "anc-sw", SparseAnnotations::builder().set("k", "anc").build());
        put(&mut table, &primary, "3.8.1", SparseAnnotations::builder().set("k", "pri").build());

        let device = compose_device(&DeviceId::new("of:0001"), &table).unwrap();
        assert_eq!(device.provider_id, primary);
        assert_eq!(device.sw_version, "3.8.1");
        // non-base providers are unioned after the base
        assert_eq!(device.annotations.value("k"), Some("anc"));
    }

    #[test]
    fn ancillary_only_port_is_disabled() {
        let anc = ProviderId::ancillary("of", "bar");
        let mut table = FactTable::new();
        put(&mut table, &anc, "sw", SparseAnnotations::empty());
        put_port(&mut table, &anc, PortDescription::new(1, true).with_type(PortType::Fiber, 10_000));

        let port = compose_port(&table, PortNumber(1)).unwrap();
        assert!(!port.enabled);
        assert_eq!(port.port_type, PortType::Fiber);
        assert_eq!(port.port_speed, 10_000);
    }

    #[test]
    fn tombstoned_port_does_not_exist() {
        let primary = ProviderId::new("of", "foo");
        let mut table = FactTable::new();
        put(&mut table, &primary, "sw", SparseAnnotations::empty());
        put_port(&mut table, &primary, PortDescription::removed(2));

        assert!(compose_port(&table, PortNumber(2)).is_none());
        assert!(known_port_numbers(&table).contains(&PortNumber(2)));
    }

    #[test]
    fn primary_port_sets_enabled_and_merges_ancillary_annotations() {
        let primary = ProviderId::new("of", "foo");
        let anc = ProviderId::ancillary("of", "bar");
        let mut table = FactTable::new();
        put(&mut table, &primary, "sw", SparseAnnotations::empty());
        put(&mut table, &anc, "sw", SparseAnnotations::empty());
        put_port(&mut table, &primary, PortDescription::new(1, true));
        put_port(
            &mut table,
            &anc,
            PortDescription::new(1, false)
                .with_annotations(SparseAnnotations::builder().set("A2", "a2").build()),
        );

        let port = compose_port(&table, PortNumber(1)).unwrap();
        assert!(port.enabled);
        assert_eq!(port.annotations.value("A2"), Some("a2"));
    }
}
