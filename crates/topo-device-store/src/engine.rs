//! Update engine: per-device state machine.
//!
//! [`DeviceState`] owns one device's fact table, its canonical views and its
//! availability. Every method is synchronous and side-effect free apart from
//! mutating the state; the store runs them under the device's lock and takes
//! care of publishing views, notifying the delegate and replicating.
//!
//! A device is ABSENT (no canonical view) or PRESENT, and a present device is
//! available or unavailable. Submissions pass an acceptance gate: they must
//! be strictly newer than whatever the same provider already holds for the
//! same device (or port), and strictly newer than the device's latest
//! removal.
//!
//! Local submissions accumulate annotations onto what the provider holds.
//! Replicated ones carry the sender's held description and replace it, and a
//! replicated removal forgets only the facts it supersedes, so the held state
//! depends on which messages arrived and not on their order.

use crate::compose::{compose_device, compose_port, known_port_numbers};
use crate::facts::{FactTable, Merge};
use std::collections::{BTreeMap, BTreeSet};
use topo_core::{
    Device, DeviceDescription, DeviceEvent, DeviceEventKind, DeviceId, Port, PortDescription,
    PortNumber, ProviderId, Timestamp, Timestamped,
};

/// Result of an accepted device description
#[derive(Debug, Clone)]
pub struct DeviceUpdate {
    /// `DeviceAdded` or `DeviceUpdated`, if the canonical view changed
    pub event: Option<DeviceEvent>,
    /// Emitted when a primary submission brought a known device back online
    pub availability: Option<DeviceEvent>,
    /// Port views that changed because the base provider changed
    pub port_events: Vec<DeviceEvent>,
    /// The provider's description as now held, annotations merged
    pub merged: Timestamped<DeviceDescription>,
    /// Whether the held description differs from the one it replaced
    pub held_changed: bool,
}

impl DeviceUpdate {
    /// Whether the update produced any event
    pub fn is_observable(&self) -> bool {
        self.event.is_some() || self.availability.is_some() || !self.port_events.is_empty()
    }

    /// Whether peers need to hear about this update
    pub fn needs_replication(&self) -> bool {
        self.is_observable() || self.held_changed
    }

    /// All events, in emission order
    pub fn events(&self) -> impl Iterator<Item = &DeviceEvent> {
        self.event
            .iter()
            .chain(self.availability.iter())
            .chain(self.port_events.iter())
    }
}

/// Result of applying port descriptions
#[derive(Debug, Clone, Default)]
pub struct PortUpdate {
    /// Port events in port-number order
    pub events: Vec<DeviceEvent>,
    /// Descriptions that passed the gate, as now held
    pub stored: Vec<PortDescription>,
}

#[derive(Debug, Clone)]
pub struct DeviceState {
    id: DeviceId,
    facts: FactTable,
    device: Option<Device>,
    ports: BTreeMap<PortNumber, Port>,
    available: bool,
    offline: Option<Timestamp>,
    removed: Option<Timestamp>,
}

impl DeviceState {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            facts: FactTable::new(),
            device: None,
            ports: BTreeMap::new(),
            available: false,
            offline: None,
            removed: None,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn facts(&self) -> &FactTable {
        &self.facts
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn ports(&self) -> &BTreeMap<PortNumber, Port> {
        &self.ports
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Latest accepted offline mark
    pub fn offline(&self) -> Option<Timestamp> {
        self.offline
    }

    /// Latest accepted removal
    pub fn removed(&self) -> Option<Timestamp> {
        self.removed
    }

    fn is_removed_at(&self, timestamp: &Timestamp) -> bool {
        self.removed.is_some_and(|removed| removed >= *timestamp)
    }

    /// Newest timestamp held by the base provider
    fn base_latest(&self) -> Option<Timestamp> {
        self.facts.base_facts().map(|(_, f)| f.latest_timestamp())
    }

    /// Availability implied by the held facts alone
    fn derived_availability(&self) -> bool {
        self.facts.get_all().iter().any(|(provider, facts)| {
            let device = facts.device();
            !provider.is_ancillary()
                && device.value.default_available
                && self.offline.map_or(true, |offline| device.timestamp > offline)
        })
    }

    /// Store a provider's device description and recompute the device.
    ///
    /// Returns `None` when the submission is stale.
    pub fn apply_device_description(
        &mut self,
        provider: &ProviderId,
        description: Timestamped<DeviceDescription>,
        merge: Merge,
    ) -> Option<DeviceUpdate> {
        let timestamp = description.timestamp;
        if self.is_removed_at(&timestamp) {
            tracing::trace!(device = %self.id, provider = %provider, %timestamp, "Ignoring description older than removal");
            return None;
        }
        if let Some(held) = self.facts.get(provider) {
            if !description.is_newer_than(&held.device().timestamp) {
                tracing::trace!(device = %self.id, provider = %provider, %timestamp, "Ignoring stale description");
                return None;
            }
        }

        let makes_available = !provider.is_ancillary() && description.value.default_available;
        let previous_held = self.facts.put(provider, description, merge);
        let merged = self.facts.get(provider)?.device().clone();
        let held_changed = previous_held.map_or(true, |held| held.value != merged.value);
        let composed = compose_device(&self.id, &self.facts)?;

        let previous = self.device.replace(composed.clone());
        let event = match &previous {
            None => Some(DeviceEvent::device(DeviceEventKind::DeviceAdded, composed.clone())),
            Some(old) if *old != composed => Some(DeviceEvent::device(
                DeviceEventKind::DeviceUpdated,
                composed.clone(),
            )),
            Some(_) => None,
        };

        let mut availability = None;
        let after_offline = self.offline.map_or(true, |offline| timestamp > offline);
        if makes_available && after_offline && !self.available {
            self.available = true;
            if previous.is_some() {
                availability = Some(DeviceEvent::device(
                    DeviceEventKind::DeviceAvailabilityChanged,
                    composed,
                ));
            }
        }

        let port_events = self.refresh_ports(known_port_numbers(&self.facts));

        Some(DeviceUpdate {
            event,
            availability,
            port_events,
            merged,
            held_changed,
        })
    }

    /// Record an offline mark.
    ///
    /// Accepted only when newer than everything the base provider holds.
    /// Returns the availability change, if the device was available.
    pub fn mark_offline(&mut self, timestamp: Timestamp) -> Option<DeviceEvent> {
        if self.is_removed_at(&timestamp) {
            return None;
        }
        let latest = self.base_latest()?;
        if timestamp <= latest {
            tracing::trace!(device = %self.id, %timestamp, %latest, "Ignoring stale offline mark");
            return None;
        }
        self.offline = Some(self.offline.map_or(timestamp, |o| o.max(timestamp)));

        let device = self.device.clone()?;
        if !self.available {
            return None;
        }
        self.available = false;
        Some(DeviceEvent::device(
            DeviceEventKind::DeviceAvailabilityChanged,
            device,
        ))
    }

    /// Mark a present device available again, clearing the offline mark.
    ///
    /// Requires a primary base provider and a timestamp newer than the last
    /// offline mark.
    pub fn mark_online(&mut self, timestamp: Timestamp) -> Option<DeviceEvent> {
        let device = self.device.clone()?;
        if device.provider_id.is_ancillary() || self.available {
            return None;
        }
        if self.offline.is_some_and(|offline| timestamp <= offline) {
            tracing::trace!(device = %self.id, %timestamp, "Ignoring online mark older than offline mark");
            return None;
        }
        self.available = true;
        self.offline = None;
        Some(DeviceEvent::device(
            DeviceEventKind::DeviceAvailabilityChanged,
            device,
        ))
    }

    /// Remove the device on behalf of a local caller.
    ///
    /// Accepted only when newer than everything the base provider holds. The
    /// removal is recorded even for a device without facts, so late
    /// descriptions cannot resurrect it. Returns `DeviceRemoved` carrying the
    /// last canonical view when the device was present.
    pub fn remove(&mut self, timestamp: Timestamp) -> Option<DeviceEvent> {
        if self.is_removed_at(&timestamp) {
            return None;
        }
        if let Some(latest) = self.base_latest() {
            if timestamp <= latest {
                tracing::trace!(device = %self.id, %timestamp, %latest, "Ignoring stale removal");
                return None;
            }
        }
        self.prune(timestamp).into_iter().next()
    }

    /// Apply a removal replicated from a peer.
    ///
    /// Facts newer than the removal survive it; they were issued after the
    /// removal and would have been accepted had it arrived first.
    pub fn apply_removal(&mut self, timestamp: Timestamp) -> Vec<DeviceEvent> {
        if self.is_removed_at(&timestamp) {
            tracing::trace!(device = %self.id, %timestamp, "Ignoring stale removal");
            return Vec::new();
        }
        self.prune(timestamp)
    }

    /// Record a removal and forget every fact it supersedes
    fn prune(&mut self, timestamp: Timestamp) -> Vec<DeviceEvent> {
        self.removed = Some(timestamp);
        self.offline = Some(self.offline.map_or(timestamp, |o| o.max(timestamp)));
        self.facts.prune_through(timestamp);

        let Some(composed) = compose_device(&self.id, &self.facts) else {
            self.ports.clear();
            self.available = false;
            return self
                .device
                .take()
                .map(|device| DeviceEvent::device(DeviceEventKind::DeviceRemoved, device))
                .into_iter()
                .collect();
        };

        let mut events = Vec::new();
        if self.device.as_ref() != Some(&composed) {
            self.device = Some(composed.clone());
            events.push(DeviceEvent::device(
                DeviceEventKind::DeviceUpdated,
                composed.clone(),
            ));
        }
        let available = self.derived_availability();
        if available != self.available {
            self.available = available;
            events.push(DeviceEvent::device(
                DeviceEventKind::DeviceAvailabilityChanged,
                composed,
            ));
        }
        let mut numbers: BTreeSet<PortNumber> = self.ports.keys().copied().collect();
        numbers.extend(known_port_numbers(&self.facts));
        events.extend(self.refresh_ports(numbers));
        events
    }

    /// Replace the full port list one provider reports.
    ///
    /// Ports the provider held but no longer lists get a provider tombstone
    /// at the same timestamp. Ports of other providers are left alone.
    pub fn apply_ports(
        &mut self,
        provider: &ProviderId,
        timestamp: Timestamp,
        descriptions: Vec<PortDescription>,
    ) -> PortUpdate {
        let Some(held) = self.facts.get(provider) else {
            return PortUpdate::default();
        };
        let listed: BTreeSet<PortNumber> = descriptions.iter().map(|d| d.number).collect();
        let tombstones: Vec<PortDescription> = held
            .ports()
            .iter()
            .filter(|(number, port)| port.value.is_live() && !listed.contains(number))
            .map(|(number, _)| PortDescription::removed(*number))
            .collect();

        let submissions = descriptions
            .into_iter()
            .chain(tombstones)
            .map(|d| Timestamped::new(d, timestamp))
            .collect();
        self.apply_port_descriptions(provider, submissions, Merge::Accumulate)
    }

    /// Store individual port descriptions, each behind its own gate.
    ///
    /// Local submissions need the device and the provider's description on
    /// file. Replicated ones for a provider not yet described are parked
    /// until its description arrives.
    pub fn apply_port_descriptions(
        &mut self,
        provider: &ProviderId,
        descriptions: Vec<Timestamped<PortDescription>>,
        merge: Merge,
    ) -> PortUpdate {
        let described = self.device.is_some() && self.facts.get(provider).is_some();
        if merge == Merge::Accumulate && !described {
            tracing::debug!(device = %self.id, provider = %provider, "Ignoring ports for unknown device or provider");
            return PortUpdate::default();
        }

        let mut stored = Vec::new();
        let mut affected = BTreeSet::new();
        for description in descriptions {
            let number = description.value.number;
            if self.is_removed_at(&description.timestamp) {
                continue;
            }
            let stale = self
                .facts
                .held_port(provider, number)
                .is_some_and(|held| !description.is_newer_than(&held.timestamp));
            if stale {
                tracing::trace!(device = %self.id, provider = %provider, port = %number, "Ignoring stale port description");
                continue;
            }
            if self.facts.get(provider).is_some() {
                self.facts.put_port(provider, description, merge);
            } else {
                tracing::trace!(device = %self.id, provider = %provider, port = %number, "Parking port until its provider is described");
                self.facts.park_port(provider, description);
            }
            if let Some(now) = self.facts.held_port(provider, number) {
                stored.push(now.value.clone());
            }
            affected.insert(number);
        }

        PortUpdate {
            events: self.refresh_ports(affected),
            stored,
        }
    }

    /// Recompute the given ports and diff them against the published ones.
    fn refresh_ports(&mut self, numbers: BTreeSet<PortNumber>) -> Vec<DeviceEvent> {
        let Some(device) = self.device.clone() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for number in numbers {
            let composed = compose_port(&self.facts, number);
            let event = match (self.ports.get(&number), composed) {
                (None, Some(port)) => {
                    self.ports.insert(number, port.clone());
                    Some(DeviceEvent::port(DeviceEventKind::PortAdded, device.clone(), port))
                }
                (Some(old), Some(port)) if *old != port => {
                    self.ports.insert(number, port.clone());
                    Some(DeviceEvent::port(DeviceEventKind::PortUpdated, device.clone(), port))
                }
                (Some(_), None) => self.ports.remove(&number).map(|old| {
                    DeviceEvent::port(DeviceEventKind::PortRemoved, device.clone(), old)
                }),
                _ => None,
            };
            events.extend(event);
        }
        events
    }
}
