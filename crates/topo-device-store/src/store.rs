//! Gossip-replicated device store.
//!
//! [`GossipDeviceStore`] serializes all work on one device behind that
//! device's lock: the acceptance gate, merge, diff, event emission and the
//! broadcast to peers happen as one step. Reads never take device locks; they
//! are served from published views refreshed under the device lock.
//!
//! Locally originated changes are broadcast after they are accepted. Changes
//! received from peers run through the same engine and are never re-broadcast.

use crate::config::DeviceStoreConfig;
use crate::engine::DeviceState;
use crate::facts::Merge;
use crate::wire::{
    self, subjects, InternalDeviceChange, InternalDeviceOffline, InternalDeviceRemoved,
    InternalPortChange, InternalPortStatusChange, InternalRemoveRequest, WirePayload,
};
use async_lock::Mutex as AsyncMutex;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use topo_core::effects::{
    ClusterCommunicator, ClusterMembership, ClusterMessage, ClusterMessageHandler,
    DeviceClockService, MastershipService,
};
use topo_core::{
    Device, DeviceDescription, DeviceEvent, DeviceId, DeviceStoreDelegate, NodeId, Port,
    PortDescription, PortNumber, ProviderId, Timestamp, Timestamped,
};

/// Inventory store contract consumed by the controller core
#[async_trait]
pub trait DeviceStore: Send + Sync {
    fn device_count(&self) -> usize;

    fn devices(&self) -> Vec<Device>;

    fn available_devices(&self) -> Vec<Device>;

    fn device(&self, device_id: &DeviceId) -> Option<Device>;

    fn is_available(&self, device_id: &DeviceId) -> bool;

    /// Canonical ports of a device, in port-number order
    fn ports(&self, device_id: &DeviceId) -> Vec<Port>;

    fn port(&self, device_id: &DeviceId, number: PortNumber) -> Option<Port>;

    /// Live port descriptions one provider holds for a device
    async fn port_descriptions(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
    ) -> Vec<PortDescription>;

    async fn port_description(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        number: PortNumber,
    ) -> Option<PortDescription>;

    /// Submit a provider's device description.
    ///
    /// Returns `DeviceAdded`/`DeviceUpdated` when the canonical view changed.
    async fn create_or_update_device(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        description: DeviceDescription,
    ) -> Option<DeviceEvent>;

    async fn mark_offline(&self, device_id: &DeviceId) -> Option<DeviceEvent>;

    /// Mark a known device available; returns whether availability changed
    async fn mark_online(&self, device_id: &DeviceId) -> bool;

    /// Replace the full port list reported by one provider
    async fn update_ports(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        descriptions: Vec<PortDescription>,
    ) -> Vec<DeviceEvent>;

    async fn update_port_status(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        description: PortDescription,
    ) -> Option<DeviceEvent>;

    async fn remove_device(&self, device_id: &DeviceId) -> Option<DeviceEvent>;

    fn set_delegate(&self, delegate: Arc<dyn DeviceStoreDelegate>);

    fn unset_delegate(&self);
}

/// Collaborators the store runs against
#[derive(Clone)]
pub struct StoreEffects {
    pub clock: Arc<dyn DeviceClockService>,
    pub mastership: Arc<dyn MastershipService>,
    pub membership: Arc<dyn ClusterMembership>,
    pub communicator: Arc<dyn ClusterCommunicator>,
}

#[derive(Debug, Default)]
struct InventoryView {
    devices: BTreeMap<DeviceId, Device>,
    ports: BTreeMap<DeviceId, BTreeMap<PortNumber, Port>>,
    available: BTreeSet<DeviceId>,
}

type DeviceHandle = Arc<AsyncMutex<DeviceState>>;

pub struct GossipDeviceStore {
    config: DeviceStoreConfig,
    effects: StoreEffects,
    states: Mutex<HashMap<DeviceId, DeviceHandle>>,
    view: RwLock<InventoryView>,
    delegate: RwLock<Option<Arc<dyn DeviceStoreDelegate>>>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl GossipDeviceStore {
    pub fn new(config: DeviceStoreConfig, effects: StoreEffects) -> Self {
        Self {
            config,
            effects,
            states: Mutex::new(HashMap::new()),
            view: RwLock::new(InventoryView::default()),
            delegate: RwLock::new(None),
            background: Mutex::new(None),
        }
    }

    /// Subscribe to peer messages and start periodic anti-entropy.
    ///
    /// Must be called from within a tokio runtime when anti-entropy is enabled.
    pub fn activate(self: &Arc<Self>) {
        let handler: Arc<dyn ClusterMessageHandler> = Arc::new(InboundHandler {
            store: Arc::downgrade(self),
        });
        for subject in subjects::ALL {
            self.effects.communicator.subscribe(subject, handler.clone());
        }
        if self.config.anti_entropy.enabled {
            let task = crate::anti_entropy::spawn_periodic(
                Arc::downgrade(self),
                self.config.anti_entropy.clone(),
            );
            if let Some(previous) = self.background.lock().replace(task) {
                previous.abort();
            }
        }
        tracing::info!(node = %self.local_node(), "Device store started");
    }

    /// Stop anti-entropy and unsubscribe from peer messages
    pub fn deactivate(&self) {
        if let Some(task) = self.background.lock().take() {
            task.abort();
        }
        for subject in subjects::ALL {
            self.effects.communicator.unsubscribe(&subject);
        }
        tracing::info!(node = %self.local_node(), "Device store stopped");
    }

    pub fn config(&self) -> &DeviceStoreConfig {
        &self.config
    }

    pub fn local_node(&self) -> NodeId {
        self.effects.membership.local_node()
    }

    pub(crate) fn effects(&self) -> &StoreEffects {
        &self.effects
    }

    /// Whether this node currently masters the device
    pub fn is_local_master(&self, device_id: &DeviceId) -> bool {
        self.effects
            .mastership
            .master_for(device_id)
            .is_some_and(|master| master == self.local_node())
    }

    /// Handle one message from a peer.
    ///
    /// Undecodable messages are logged and dropped. Nothing received here is
    /// re-broadcast.
    pub async fn handle_message(&self, message: ClusterMessage) {
        let payload = match wire::decode(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(peer = %message.sender, subject = %message.subject, error = %e, "Dropping undecodable peer message");
                return;
            }
        };
        tracing::debug!(peer = %message.sender, subject = %message.subject, "Received peer message");

        match payload {
            WirePayload::DeviceChange(change) => {
                let handle = self.state_for(&change.device_id);
                let mut state = handle.lock().await;
                self.apply_remote_device_change(&mut state, change);
            }
            WirePayload::PortChange(change) => {
                let handle = self.state_for(&change.device_id);
                let mut state = handle.lock().await;
                let descriptions = change
                    .descriptions
                    .into_iter()
                    .map(|d| Timestamped::new(d, change.timestamp))
                    .collect();
                self.apply_remote_ports(&mut state, &change.provider_id, descriptions);
            }
            WirePayload::PortStatusChange(change) => {
                let handle = self.state_for(&change.device_id);
                let mut state = handle.lock().await;
                self.apply_remote_port_status(&mut state, change);
            }
            WirePayload::DeviceOffline(offline) => {
                let Some(handle) = self.existing_state(&offline.device_id) else {
                    tracing::debug!(device = %offline.device_id, "Ignoring offline mark for unknown device");
                    return;
                };
                let mut state = handle.lock().await;
                self.apply_remote_offline(&mut state, offline.timestamp);
            }
            WirePayload::DeviceRemoved(removed) => {
                let handle = self.state_for(&removed.device_id);
                let mut state = handle.lock().await;
                self.apply_remote_removal(&mut state, removed.timestamp);
            }
            WirePayload::RemoveRequest(request) => {
                tracing::debug!(device = %request.device_id, peer = %message.sender, "Removal requested by peer");
                self.remove_device_locally(&request.device_id).await;
            }
            WirePayload::Advertisement(advertisement) => {
                self.handle_advertisement(message.sender, advertisement)
                    .await;
            }
        }
    }

    pub(crate) fn apply_remote_device_change(
        &self,
        state: &mut DeviceState,
        change: InternalDeviceChange,
    ) {
        let submission = Timestamped::new(change.description, change.timestamp);
        match state.apply_device_description(&change.provider_id, submission, Merge::Replace) {
            Some(update) => {
                self.publish(state);
                self.emit(update.events().cloned());
            }
            None => {
                tracing::debug!(device = %change.device_id, provider = %change.provider_id, "Ignoring stale peer device change");
            }
        }
    }

    pub(crate) fn apply_remote_ports(
        &self,
        state: &mut DeviceState,
        provider: &ProviderId,
        descriptions: Vec<Timestamped<PortDescription>>,
    ) {
        let update = state.apply_port_descriptions(provider, descriptions, Merge::Replace);
        if !update.stored.is_empty() {
            self.publish(state);
        }
        self.emit(update.events);
    }

    pub(crate) fn apply_remote_port_status(
        &self,
        state: &mut DeviceState,
        change: InternalPortStatusChange,
    ) {
        let submission = Timestamped::new(change.description, change.timestamp);
        self.apply_remote_ports(state, &change.provider_id, vec![submission]);
    }

    pub(crate) fn apply_remote_offline(&self, state: &mut DeviceState, timestamp: Timestamp) {
        if let Some(event) = state.mark_offline(timestamp) {
            self.publish(state);
            self.emit([event]);
        }
    }

    pub(crate) fn apply_remote_removal(&self, state: &mut DeviceState, timestamp: Timestamp) {
        let events = state.apply_removal(timestamp);
        self.publish(state);
        self.emit(events);
    }

    /// Remove a device on this node and tell peers
    async fn remove_device_locally(&self, device_id: &DeviceId) -> Option<DeviceEvent> {
        let timestamp = self.fresh_timestamp(device_id)?;
        let handle = self.existing_state(device_id)?;
        let mut state = handle.lock().await;
        let event = state.remove(timestamp)?;
        self.publish(&state);
        self.notify_peers(&WirePayload::DeviceRemoved(InternalDeviceRemoved {
            device_id: device_id.clone(),
            timestamp,
        }));
        self.emit([event.clone()]);
        Some(event)
    }

    pub(crate) fn state_for(&self, device_id: &DeviceId) -> DeviceHandle {
        self.states
            .lock()
            .entry(device_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(DeviceState::new(device_id.clone()))))
            .clone()
    }

    pub(crate) fn existing_state(&self, device_id: &DeviceId) -> Option<DeviceHandle> {
        self.states.lock().get(device_id).cloned()
    }

    /// Every device handle, in device-id order
    pub(crate) fn state_handles(&self) -> Vec<(DeviceId, DeviceHandle)> {
        let mut handles: Vec<_> = self
            .states
            .lock()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }

    /// Refresh the read views from a device's state
    pub(crate) fn publish(&self, state: &DeviceState) {
        let id = state.id();
        let mut view = self.view.write();
        match state.device() {
            Some(device) => {
                view.devices.insert(id.clone(), device.clone());
            }
            None => {
                view.devices.remove(id);
            }
        }
        if state.ports().is_empty() {
            view.ports.remove(id);
        } else {
            view.ports.insert(id.clone(), state.ports().clone());
        }
        if state.is_available() {
            view.available.insert(id.clone());
        } else {
            view.available.remove(id);
        }
    }

    pub(crate) fn emit(&self, events: impl IntoIterator<Item = DeviceEvent>) {
        let delegate = self.delegate.read().clone();
        if let Some(delegate) = delegate {
            for event in events {
                delegate.notify(event);
            }
        }
    }

    pub(crate) fn notify_peers(&self, payload: &WirePayload) {
        let subject = payload.subject();
        let bytes = match wire::encode(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Failed to encode peer notification");
                return;
            }
        };
        tracing::debug!(subject = %subject, device = ?payload.device_id(), "Notifying peers");
        if let Err(e) = self.effects.communicator.broadcast(&subject, bytes) {
            tracing::warn!(subject = %subject, error = %e, "Failed to notify peers");
        }
    }

    pub(crate) fn send_to(&self, payload: &WirePayload, peer: &NodeId) {
        let subject = payload.subject();
        let bytes = match wire::encode(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(subject = %subject, peer = %peer, error = %e, "Failed to encode peer message");
                return;
            }
        };
        tracing::debug!(subject = %subject, peer = %peer, "Sending to peer");
        if let Err(e) = self.effects.communicator.unicast(&subject, bytes, peer) {
            tracing::warn!(subject = %subject, peer = %peer, error = %e, "Failed to send to peer");
        }
    }

    fn fresh_timestamp(&self, device_id: &DeviceId) -> Option<Timestamp> {
        match self.effects.clock.timestamp_for(device_id) {
            Ok(timestamp) => Some(timestamp),
            Err(e) => {
                tracing::info!(device = %device_id, error = %e, "Ignoring local write without timestamp");
                None
            }
        }
    }

    fn local_write_allowed(&self, device_id: &DeviceId, operation: &'static str) -> bool {
        if !self.config.require_mastership || self.is_local_master(device_id) {
            return true;
        }
        tracing::debug!(device = %device_id, operation, "Not master; ignoring local write");
        false
    }
}

#[async_trait]
impl DeviceStore for GossipDeviceStore {
    fn device_count(&self) -> usize {
        self.view.read().devices.len()
    }

    fn devices(&self) -> Vec<Device> {
        self.view.read().devices.values().cloned().collect()
    }

    fn available_devices(&self) -> Vec<Device> {
        let view = self.view.read();
        view.devices
            .iter()
            .filter(|(id, _)| view.available.contains(*id))
            .map(|(_, device)| device.clone())
            .collect()
    }

    fn device(&self, device_id: &DeviceId) -> Option<Device> {
        self.view.read().devices.get(device_id).cloned()
    }

    fn is_available(&self, device_id: &DeviceId) -> bool {
        self.view.read().available.contains(device_id)
    }

    fn ports(&self, device_id: &DeviceId) -> Vec<Port> {
        self.view
            .read()
            .ports
            .get(device_id)
            .map(|ports| ports.values().cloned().collect())
            .unwrap_or_default()
    }

    fn port(&self, device_id: &DeviceId, number: PortNumber) -> Option<Port> {
        self.view
            .read()
            .ports
            .get(device_id)
            .and_then(|ports| ports.get(&number))
            .cloned()
    }

    async fn port_descriptions(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
    ) -> Vec<PortDescription> {
        let Some(handle) = self.existing_state(device_id) else {
            return Vec::new();
        };
        let state = handle.lock().await;
        state
            .facts()
            .get(provider)
            .map(|facts| {
                facts
                    .ports()
                    .values()
                    .filter(|p| p.value.is_live())
                    .map(|p| p.value.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn port_description(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        number: PortNumber,
    ) -> Option<PortDescription> {
        let handle = self.existing_state(device_id)?;
        let state = handle.lock().await;
        state.facts().get(provider)?.live_port(number).cloned()
    }

    async fn create_or_update_device(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        description: DeviceDescription,
    ) -> Option<DeviceEvent> {
        if !self.local_write_allowed(device_id, "create_or_update_device") {
            return None;
        }
        let timestamp = self.fresh_timestamp(device_id)?;
        let handle = self.state_for(device_id);
        let mut state = handle.lock().await;
        let submission = Timestamped::new(description, timestamp);
        let update = state.apply_device_description(provider, submission, Merge::Accumulate)?;
        self.publish(&state);
        if update.needs_replication() {
            self.notify_peers(&WirePayload::DeviceChange(InternalDeviceChange {
                device_id: device_id.clone(),
                provider_id: provider.clone(),
                timestamp,
                description: update.merged.value.clone(),
            }));
        }
        self.emit(update.events().cloned());
        update.event
    }

    async fn mark_offline(&self, device_id: &DeviceId) -> Option<DeviceEvent> {
        if !self.local_write_allowed(device_id, "mark_offline") {
            return None;
        }
        let timestamp = self.fresh_timestamp(device_id)?;
        let handle = self.existing_state(device_id)?;
        let mut state = handle.lock().await;
        let event = state.mark_offline(timestamp)?;
        self.publish(&state);
        self.notify_peers(&WirePayload::DeviceOffline(InternalDeviceOffline {
            device_id: device_id.clone(),
            timestamp,
        }));
        self.emit([event.clone()]);
        Some(event)
    }

    async fn mark_online(&self, device_id: &DeviceId) -> bool {
        if !self.local_write_allowed(device_id, "mark_online") {
            return false;
        }
        let Some(timestamp) = self.fresh_timestamp(device_id) else {
            return false;
        };
        let Some(handle) = self.existing_state(device_id) else {
            return false;
        };
        let mut state = handle.lock().await;
        match state.mark_online(timestamp) {
            Some(event) => {
                self.publish(&state);
                self.emit([event]);
                true
            }
            None => false,
        }
    }

    async fn update_ports(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        descriptions: Vec<PortDescription>,
    ) -> Vec<DeviceEvent> {
        if !self.local_write_allowed(device_id, "update_ports") {
            return Vec::new();
        }
        let Some(timestamp) = self.fresh_timestamp(device_id) else {
            return Vec::new();
        };
        let Some(handle) = self.existing_state(device_id) else {
            return Vec::new();
        };
        let mut state = handle.lock().await;
        let update = state.apply_ports(provider, timestamp, descriptions);
        if update.stored.is_empty() {
            return Vec::new();
        }
        self.publish(&state);
        if !update.events.is_empty() {
            self.notify_peers(&WirePayload::PortChange(InternalPortChange {
                device_id: device_id.clone(),
                provider_id: provider.clone(),
                timestamp,
                descriptions: update.stored,
            }));
        }
        self.emit(update.events.iter().cloned());
        update.events
    }

    async fn update_port_status(
        &self,
        provider: &ProviderId,
        device_id: &DeviceId,
        description: PortDescription,
    ) -> Option<DeviceEvent> {
        if !self.local_write_allowed(device_id, "update_port_status") {
            return None;
        }
        let timestamp = self.fresh_timestamp(device_id)?;
        let handle = self.existing_state(device_id)?;
        let mut state = handle.lock().await;
        let update = state.apply_port_descriptions(
            provider,
            vec![Timestamped::new(description, timestamp)],
            Merge::Accumulate,
        );
        let stored = update.stored.into_iter().next()?;
        self.publish(&state);
        let event = update.events.into_iter().next()?;
        self.notify_peers(&WirePayload::PortStatusChange(InternalPortStatusChange {
            device_id: device_id.clone(),
            provider_id: provider.clone(),
            timestamp,
            description: stored,
        }));
        self.emit([event.clone()]);
        Some(event)
    }

    async fn remove_device(&self, device_id: &DeviceId) -> Option<DeviceEvent> {
        if !self.is_local_master(device_id) {
            let master = self.effects.mastership.master_for(device_id);
            let must_forward = self.config.require_mastership
                || !self.effects.clock.is_timestamp_available(device_id);
            if let (Some(master), true) = (master, must_forward) {
                tracing::info!(device = %device_id, master = %master, "Forwarding removal to master");
                self.send_to(
                    &WirePayload::RemoveRequest(InternalRemoveRequest {
                        device_id: device_id.clone(),
                    }),
                    &master,
                );
                return None;
            }
            if self.config.require_mastership {
                tracing::debug!(device = %device_id, "No master known; ignoring removal");
                return None;
            }
        }
        self.remove_device_locally(device_id).await
    }

    fn set_delegate(&self, delegate: Arc<dyn DeviceStoreDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    fn unset_delegate(&self) {
        *self.delegate.write() = None;
    }
}

/// Routes peer messages to a store without keeping it alive
struct InboundHandler {
    store: Weak<GossipDeviceStore>,
}

#[async_trait]
impl ClusterMessageHandler for InboundHandler {
    async fn handle(&self, message: ClusterMessage) {
        match self.store.upgrade() {
            Some(store) => store.handle_message(message).await,
            None => tracing::debug!(subject = %message.subject, "Device store gone; dropping peer message"),
        }
    }
}
