//! Provider fact table.
//!
//! Holds, for one device, the latest timestamped description each provider
//! submitted for the device and for each of its ports. The table is owned by
//! the per-device state, so every mutation of one device's facts runs under
//! that device's lock.
//!
//! Port descriptions replicated ahead of their provider's device description
//! are parked until that description arrives. Parked ports take no part in
//! composition.

use std::collections::BTreeMap;
use topo_core::{
    DeviceDescription, PortDescription, PortNumber, ProviderId, Timestamp, Timestamped,
};

type PortFacts = BTreeMap<PortNumber, Timestamped<PortDescription>>;

/// How a submission combines with what the provider already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Local provider input: annotations accumulate onto the held set
    Accumulate,
    /// Peer replication: the message carries the sender's held state as is
    Replace,
}

/// Everything one provider has reported about one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFacts {
    device: Timestamped<DeviceDescription>,
    ports: PortFacts,
}

impl ProviderFacts {
    fn new(device: Timestamped<DeviceDescription>, ports: PortFacts) -> Self {
        Self { device, ports }
    }

    pub fn device(&self) -> &Timestamped<DeviceDescription> {
        &self.device
    }

    pub fn ports(&self) -> &PortFacts {
        &self.ports
    }

    pub fn port(&self, number: PortNumber) -> Option<&Timestamped<PortDescription>> {
        self.ports.get(&number)
    }

    /// Live (non-tombstoned) description of `number`
    pub fn live_port(&self, number: PortNumber) -> Option<&PortDescription> {
        self.ports
            .get(&number)
            .map(|p| &p.value)
            .filter(|p| p.is_live())
    }

    /// Newest timestamp across the device description and all ports
    pub fn latest_timestamp(&self) -> Timestamp {
        self.ports
            .values()
            .map(|p| p.timestamp)
            .fold(self.device.timestamp, Timestamp::max)
    }

    /// Replace the device description. Returns the previous description.
    fn put_device(
        &mut self,
        mut description: Timestamped<DeviceDescription>,
        merge: Merge,
    ) -> Timestamped<DeviceDescription> {
        if merge == Merge::Accumulate {
            description.value.annotations = self
                .device
                .value
                .annotations
                .union(&description.value.annotations);
        }
        std::mem::replace(&mut self.device, description)
    }

    /// Store a port description. Accumulated annotations carry over between
    /// live descriptions; a tombstone, or a description following one,
    /// starts over.
    fn put_port(
        &mut self,
        mut description: Timestamped<PortDescription>,
        merge: Merge,
    ) -> Option<Timestamped<PortDescription>> {
        if merge == Merge::Accumulate {
            if let Some(previous) = self.ports.get(&description.value.number) {
                if previous.value.is_live() && description.value.is_live() {
                    description.value.annotations = previous
                        .value
                        .annotations
                        .union(&description.value.annotations);
                }
            }
        }
        self.ports.insert(description.value.number, description)
    }
}

/// Per-device table of provider facts, iterated in `ProviderId` order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactTable {
    providers: BTreeMap<ProviderId, ProviderFacts>,
    parked: BTreeMap<ProviderId, PortFacts>,
}

impl FactTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a provider's device description; returns the previous one.
    ///
    /// A provider's first description adopts the ports parked for it.
    pub fn put(
        &mut self,
        provider: &ProviderId,
        description: Timestamped<DeviceDescription>,
        merge: Merge,
    ) -> Option<Timestamped<DeviceDescription>> {
        match self.providers.get_mut(provider) {
            Some(facts) => Some(facts.put_device(description, merge)),
            None => {
                let ports = self.parked.remove(provider).unwrap_or_default();
                self.providers
                    .insert(provider.clone(), ProviderFacts::new(description, ports));
                None
            }
        }
    }

    /// Store a provider's port description. Returns `None` without storing
    /// when the provider has no device description on file.
    pub fn put_port(
        &mut self,
        provider: &ProviderId,
        description: Timestamped<PortDescription>,
        merge: Merge,
    ) -> Option<Option<Timestamped<PortDescription>>> {
        self.providers
            .get_mut(provider)
            .map(|facts| facts.put_port(description, merge))
    }

    /// Hold a replicated port description for a provider not yet described
    pub fn park_port(
        &mut self,
        provider: &ProviderId,
        description: Timestamped<PortDescription>,
    ) -> Option<Timestamped<PortDescription>> {
        self.parked
            .entry(provider.clone())
            .or_default()
            .insert(description.value.number, description)
    }

    /// Held or parked description of one provider's port
    pub fn held_port(
        &self,
        provider: &ProviderId,
        number: PortNumber,
    ) -> Option<&Timestamped<PortDescription>> {
        match self.providers.get(provider) {
            Some(facts) => facts.port(number),
            None => self.parked.get(provider)?.get(&number),
        }
    }

    pub fn get(&self, provider: &ProviderId) -> Option<&ProviderFacts> {
        self.providers.get(provider)
    }

    pub fn get_all(&self) -> &BTreeMap<ProviderId, ProviderFacts> {
        &self.providers
    }

    /// Ports waiting for their provider's device description
    pub fn parked(&self) -> &BTreeMap<ProviderId, PortFacts> {
        &self.parked
    }

    /// Every held and parked port description
    pub fn all_ports(
        &self,
    ) -> impl Iterator<Item = (&ProviderId, PortNumber, &Timestamped<PortDescription>)> {
        let held = self
            .providers
            .iter()
            .flat_map(|(provider, facts)| facts.ports.iter().map(move |(n, p)| (provider, *n, p)));
        let parked = self
            .parked
            .iter()
            .flat_map(|(provider, ports)| ports.iter().map(move |(n, p)| (provider, *n, p)));
        held.chain(parked)
    }

    /// Forget every fact issued at or before `timestamp`.
    ///
    /// A provider whose device description goes keeps its newer ports
    /// parked: they belong to a later description that has yet to arrive.
    pub fn prune_through(&mut self, timestamp: Timestamp) {
        let providers = std::mem::take(&mut self.providers);
        for (provider, mut facts) in providers {
            facts.ports.retain(|_, p| p.timestamp > timestamp);
            if facts.device.timestamp > timestamp {
                self.providers.insert(provider, facts);
            } else if !facts.ports.is_empty() {
                self.parked.entry(provider).or_default().extend(facts.ports);
            }
        }
        for ports in self.parked.values_mut() {
            ports.retain(|_, p| p.timestamp > timestamp);
        }
        self.parked.retain(|_, ports| !ports.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First primary provider in order, else the first ancillary one
    pub fn base_provider(&self) -> Option<&ProviderId> {
        self.providers
            .keys()
            .find(|p| !p.is_ancillary())
            .or_else(|| self.providers.keys().next())
    }

    /// Facts of the base provider
    pub fn base_facts(&self) -> Option<(&ProviderId, &ProviderFacts)> {
        let base = self.base_provider()?;
        self.providers.get_key_value(base)
    }
}
