//! Anti-entropy for the device store.
//!
//! Each round sends an advertisement of every timestamp this node holds to
//! one random peer. The receiver pushes back, as regular replication
//! messages, every fragment the advertisement lacks or holds an older
//! version of, and applies offline and removal marks that are newer than its
//! own. When the advertisement shows fragments the receiver lacks, it replies
//! with its own advertisement so the sender can push them. Replies never
//! trigger further replies.

use crate::config::AntiEntropyConfig;
use crate::store::GossipDeviceStore;
use crate::wire::{
    DeviceAdvertisement, DeviceFragmentId, InternalDeviceChange, InternalDeviceOffline,
    InternalDeviceRemoved, InternalPortStatusChange, PortFragmentId, WirePayload,
};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use topo_core::{DeviceId, NodeId, Timestamp};

/// Run anti-entropy rounds until the store is dropped or the task aborted
pub(crate) fn spawn_periodic(
    store: Weak<GossipDeviceStore>,
    config: AntiEntropyConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(config.initial_delay()).await;
        let mut ticker = tokio::time::interval(config.period().max(Duration::from_millis(1)));
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            store.run_anti_entropy_round().await;
        }
    })
}

/// `true` when `remote` beats `local`, treating a missing local mark as oldest
fn remote_is_newer(local: Option<Timestamp>, remote: Timestamp) -> bool {
    local.map_or(true, |local| remote > local)
}

impl GossipDeviceStore {
    /// Advertisement of every fragment, offline mark and removal held locally
    pub async fn create_advertisement(&self) -> DeviceAdvertisement {
        self.advertisement(false).await
    }

    async fn advertisement(&self, is_reply: bool) -> DeviceAdvertisement {
        let mut advertisement = DeviceAdvertisement {
            sender: Some(self.local_node()),
            is_reply,
            ..DeviceAdvertisement::default()
        };
        for (device_id, handle) in self.state_handles() {
            let state = handle.lock().await;
            for (provider, facts) in state.facts().get_all() {
                advertisement.devices.insert(
                    DeviceFragmentId {
                        device_id: device_id.clone(),
                        provider_id: provider.clone(),
                    },
                    facts.device().timestamp,
                );
            }
            for (provider, number, port) in state.facts().all_ports() {
                advertisement.ports.insert(
                    PortFragmentId {
                        device_id: device_id.clone(),
                        provider_id: provider.clone(),
                        number,
                    },
                    port.timestamp,
                );
            }
            if let Some(offline) = state.offline() {
                advertisement.offline.insert(device_id.clone(), offline);
            }
            if let Some(removed) = state.removed() {
                advertisement.removed.insert(device_id, removed);
            }
        }
        advertisement
    }

    /// Send an advertisement to one random peer.
    ///
    /// Returns the chosen peer, or `None` when this node is alone.
    pub async fn run_anti_entropy_round(&self) -> Option<NodeId> {
        let local = self.local_node();
        let peers: Vec<NodeId> = self
            .effects()
            .membership
            .nodes()
            .into_iter()
            .filter(|node| *node != local)
            .collect();
        let Some(peer) = peers.choose(&mut rand::thread_rng()).cloned() else {
            tracing::trace!(node = %local, "No peers; skipping anti-entropy round");
            return None;
        };

        let advertisement = self.create_advertisement().await;
        tracing::debug!(
            peer = %peer,
            devices = advertisement.devices.len(),
            ports = advertisement.ports.len(),
            "Sending anti-entropy advertisement"
        );
        self.send_to(&WirePayload::Advertisement(advertisement), &peer);
        Some(peer)
    }

    /// Reconcile local state against a peer's advertisement
    pub(crate) async fn handle_advertisement(
        &self,
        sender: NodeId,
        advertisement: DeviceAdvertisement,
    ) {
        let peer = advertisement.sender.clone().unwrap_or(sender);
        if peer == self.local_node() {
            return;
        }

        let handles = self.state_handles();
        let known: BTreeSet<DeviceId> = handles.iter().map(|(id, _)| id.clone()).collect();
        let mut wanted = false;
        let mut pushed = 0usize;

        for (device_id, handle) in &handles {
            let mut state = handle.lock().await;

            let remote_removed = advertisement.removed.get(device_id).copied();
            match (state.removed(), remote_removed) {
                (local, Some(remote)) if remote_is_newer(local, remote) => {
                    self.apply_remote_removal(&mut state, remote);
                }
                (Some(local), remote) if remote.map_or(true, |remote| local > remote) => {
                    self.send_to(
                        &WirePayload::DeviceRemoved(InternalDeviceRemoved {
                            device_id: device_id.clone(),
                            timestamp: local,
                        }),
                        &peer,
                    );
                    pushed += 1;
                }
                _ => {}
            }

            for (provider, facts) in state.facts().get_all() {
                let key = DeviceFragmentId {
                    device_id: device_id.clone(),
                    provider_id: provider.clone(),
                };
                let local_ts = facts.device().timestamp;
                match advertisement.devices.get(&key) {
                    Some(remote) if *remote > local_ts => wanted = true,
                    Some(remote) if *remote == local_ts => {}
                    _ => {
                        self.send_to(
                            &WirePayload::DeviceChange(InternalDeviceChange {
                                device_id: device_id.clone(),
                                provider_id: provider.clone(),
                                timestamp: local_ts,
                                description: facts.device().value.clone(),
                            }),
                            &peer,
                        );
                        pushed += 1;
                    }
                }
            }

            for (provider, number, port) in state.facts().all_ports() {
                let key = PortFragmentId {
                    device_id: device_id.clone(),
                    provider_id: provider.clone(),
                    number,
                };
                match advertisement.ports.get(&key) {
                    Some(remote) if *remote > port.timestamp => wanted = true,
                    Some(remote) if *remote == port.timestamp => {}
                    _ => {
                        self.send_to(
                            &WirePayload::PortStatusChange(InternalPortStatusChange {
                                device_id: device_id.clone(),
                                provider_id: provider.clone(),
                                timestamp: port.timestamp,
                                description: port.value.clone(),
                            }),
                            &peer,
                        );
                        pushed += 1;
                    }
                }
            }

            let remote_offline = advertisement.offline.get(device_id).copied();
            match (state.offline(), remote_offline) {
                (local, Some(remote)) if remote_is_newer(local, remote) => {
                    self.apply_remote_offline(&mut state, remote);
                }
                (Some(local), remote) if remote.map_or(true, |remote| local > remote) => {
                    self.send_to(
                        &WirePayload::DeviceOffline(InternalDeviceOffline {
                            device_id: device_id.clone(),
                            timestamp: local,
                        }),
                        &peer,
                    );
                    pushed += 1;
                }
                _ => {}
            }

            // fragments the peer holds that we lack entirely
            let removed = state.removed();
            let facts = state.facts();
            let lacks_device = advertisement
                .devices
                .iter()
                .filter(|(key, _)| key.device_id == *device_id)
                .any(|(key, remote)| {
                    facts.get(&key.provider_id).is_none() && remote_is_newer(removed, *remote)
                });
            let lacks_port = advertisement
                .ports
                .iter()
                .filter(|(key, _)| key.device_id == *device_id)
                .any(|(key, remote)| {
                    facts.held_port(&key.provider_id, key.number).is_none()
                        && remote_is_newer(removed, *remote)
                });
            wanted |= lacks_device || lacks_port;
        }

        wanted |= advertisement
            .devices
            .keys()
            .map(|key| &key.device_id)
            .chain(advertisement.removed.keys())
            .any(|device_id| !known.contains(device_id));

        tracing::debug!(peer = %peer, pushed, wanted, "Handled anti-entropy advertisement");
        if wanted && !advertisement.is_reply {
            let reply = self.advertisement(true).await;
            self.send_to(&WirePayload::Advertisement(reply), &peer);
        }
    }
}
