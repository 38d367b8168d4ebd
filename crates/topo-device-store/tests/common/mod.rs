//! Shared wiring for device store integration tests

#![allow(dead_code)]

use std::sync::Arc;
use topo_core::effects::ClusterMessage;
use topo_core::NodeId;
use topo_device_store::wire::{self, WirePayload};
use topo_device_store::{DeviceStore, DeviceStoreConfig, GossipDeviceStore, StoreEffects};
use topo_testkit::fixtures::{did1, did2, node1, node2};
use topo_testkit::{
    init_test_tracing, Envelope, LocalCluster, RecordingCommunicator, RecordingDelegate,
    StaticMastership, StaticMembership, TestDeviceClock,
};

/// One store on `node1` whose transport only records sends
pub struct SingleNode {
    pub store: Arc<GossipDeviceStore>,
    pub clock: Arc<TestDeviceClock>,
    pub mastership: Arc<StaticMastership>,
    pub comm: Arc<RecordingCommunicator>,
    pub delegate: Arc<RecordingDelegate>,
}

impl SingleNode {
    pub fn new() -> Self {
        Self::with_config(DeviceStoreConfig::for_testing())
    }

    pub fn with_config(config: DeviceStoreConfig) -> Self {
        init_test_tracing();
        let clock = Arc::new(
            TestDeviceClock::new()
                .with_term(did1(), 1)
                .with_term(did2(), 2),
        );
        let mastership = Arc::new(StaticMastership::everything_on(node1()));
        let comm = Arc::new(RecordingCommunicator::new(node1()));
        let membership = Arc::new(StaticMembership::with_peers(node1(), [node2()]));
        let store = Arc::new(GossipDeviceStore::new(
            config,
            StoreEffects {
                clock: clock.clone(),
                mastership: mastership.clone(),
                membership,
                communicator: comm.clone(),
            },
        ));
        store.activate();
        let delegate = Arc::new(RecordingDelegate::new());
        store.set_delegate(delegate.clone());
        Self {
            store,
            clock,
            mastership,
            comm,
            delegate,
        }
    }

    /// Decoded broadcasts since the last call
    pub fn take_broadcasts(&self) -> Vec<WirePayload> {
        self.comm
            .take()
            .into_iter()
            .filter(|e| e.to.is_none())
            .map(|e| decode(&e))
            .collect()
    }

    /// Feed a payload to the store as if `node2` had sent it
    pub async fn receive(&self, payload: WirePayload) {
        self.store
            .handle_message(ClusterMessage {
                sender: node2(),
                subject: payload.subject(),
                payload: wire::encode(&payload).unwrap(),
            })
            .await;
    }
}

pub fn decode(envelope: &Envelope) -> WirePayload {
    let payload = wire::decode(&envelope.payload).unwrap();
    assert_eq!(payload.subject(), envelope.subject);
    payload
}

/// Several stores connected through a [`LocalCluster`], sharing one clock
pub struct Cluster {
    pub hub: LocalCluster,
    pub clock: Arc<TestDeviceClock>,
    pub mastership: Arc<StaticMastership>,
    pub stores: Vec<Arc<GossipDeviceStore>>,
    pub delegates: Vec<Arc<RecordingDelegate>>,
}

impl Cluster {
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, DeviceStoreConfig::for_testing())
    }

    pub fn with_config(names: &[&str], config: DeviceStoreConfig) -> Self {
        init_test_tracing();
        let hub = LocalCluster::new(names);
        let clock = Arc::new(
            TestDeviceClock::new()
                .with_term(did1(), 1)
                .with_term(did2(), 2),
        );
        let mastership = Arc::new(StaticMastership::everything_on(NodeId::new(names[0])));
        let mut stores = Vec::new();
        let mut delegates = Vec::new();
        for node in hub.nodes() {
            let endpoint = hub.endpoint(&node);
            let store = Arc::new(GossipDeviceStore::new(
                config.clone(),
                StoreEffects {
                    clock: clock.clone(),
                    mastership: mastership.clone(),
                    membership: endpoint.clone(),
                    communicator: endpoint,
                },
            ));
            store.activate();
            let delegate = Arc::new(RecordingDelegate::new());
            store.set_delegate(delegate.clone());
            stores.push(store);
            delegates.push(delegate);
        }
        Self {
            hub,
            clock,
            mastership,
            stores,
            delegates,
        }
    }

    pub fn node(&self, index: usize) -> &Arc<GossipDeviceStore> {
        &self.stores[index]
    }

    /// Run one anti-entropy round on every node, delivering after each
    pub async fn anti_entropy(&self) {
        for store in &self.stores {
            store.run_anti_entropy_round().await;
            self.hub.deliver_all().await;
        }
    }

    /// Whether every node serves the same devices, ports and availability
    pub fn converged(&self) -> bool {
        let first = &self.stores[0];
        self.stores.iter().skip(1).all(|other| {
            first.devices() == other.devices()
                && first.available_devices() == other.available_devices()
                && first
                    .devices()
                    .iter()
                    .all(|d| first.ports(&d.id) == other.ports(&d.id))
        })
    }
}
