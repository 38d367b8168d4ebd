//! Anti-entropy repairs replication messages lost in transit.

mod common;

use common::Cluster;
use std::sync::Arc;
use std::time::Duration;
use topo_core::{DeviceEventKind, SparseAnnotations};
use topo_device_store::wire::subjects;
use topo_device_store::{
    AntiEntropyConfig, DeviceStore, DeviceStoreConfig, GossipDeviceStore, StoreEffects,
};
use topo_testkit::fixtures::*;
use topo_testkit::{RecordingCommunicator, StaticMastership, StaticMembership, TestDeviceClock};

#[tokio::test]
async fn lost_device_and_ports_are_repaired() {
    let cluster = Cluster::new(&["node1", "node2"]);
    let origin = cluster.node(0);
    origin
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    origin
        .update_ports(&pid(), &did1(), vec![port(P1, true), port(P2, true)])
        .await;
    assert_eq!(cluster.hub.drop_pending(), 2);
    assert!(cluster.node(1).device(&did1()).is_none());

    cluster.anti_entropy().await;

    assert!(cluster.converged());
    let device = cluster.node(1).device(&did1()).unwrap();
    assert_eq!(device.sw_version, SW1);
    assert!(cluster.node(1).is_available(&did1()));
    assert_eq!(cluster.node(1).ports(&did1()).len(), 2);
    assert_eq!(
        cluster.delegates[1].kinds(),
        vec![
            DeviceEventKind::DeviceAdded,
            DeviceEventKind::PortAdded,
            DeviceEventKind::PortAdded
        ]
    );
}

#[tokio::test]
async fn newer_fragments_replace_older_ones() {
    let cluster = Cluster::new(&["node1", "node2"]);
    let origin = cluster.node(0);
    origin
        .create_or_update_device(
            &pid(),
            &did1(),
            device_description(&did1(), SW1, SparseAnnotations::empty()),
        )
        .await;
    origin
        .update_ports(&pid(), &did1(), vec![port(P1, true)])
        .await;
    cluster.hub.deliver_all().await;

    origin
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW2, a2()))
        .await;
    origin
        .update_port_status(&pid(), &did1(), port(P1, false))
        .await;
    cluster.hub.drop_pending();

    cluster.anti_entropy().await;

    assert!(cluster.converged());
    assert_eq!(cluster.node(1).device(&did1()).unwrap().sw_version, SW2);
    assert!(!cluster.node(1).port(&did1(), P1).unwrap().enabled);
}

#[tokio::test]
async fn lost_offline_mark_is_repaired() {
    let cluster = Cluster::new(&["node1", "node2"]);
    cluster
        .node(0)
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    cluster.hub.deliver_all().await;
    cluster.node(0).mark_offline(&did1()).await;
    cluster.hub.drop_pending();
    assert!(cluster.node(1).is_available(&did1()));

    cluster.anti_entropy().await;

    assert!(!cluster.node(1).is_available(&did1()));
    assert!(cluster.converged());
}

#[tokio::test]
async fn lost_removal_is_repaired() {
    let cluster = Cluster::new(&["node1", "node2"]);
    cluster
        .node(0)
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    cluster.hub.deliver_all().await;
    cluster.node(0).remove_device(&did1()).await;
    cluster.hub.drop_pending();
    assert!(cluster.node(1).device(&did1()).is_some());

    cluster.anti_entropy().await;

    assert!(cluster.node(1).device(&did1()).is_none());
    assert!(cluster.converged());
    assert_eq!(
        cluster.delegates[1].kinds(),
        vec![DeviceEventKind::DeviceAdded, DeviceEventKind::DeviceRemoved]
    );
}

#[tokio::test]
async fn removed_device_is_not_resurrected_by_stale_peer() {
    let cluster = Cluster::new(&["node1", "node2"]);
    cluster
        .node(0)
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    cluster.hub.deliver_all().await;
    cluster.node(0).remove_device(&did1()).await;
    cluster.hub.drop_pending();

    // the stale holder advertises first
    cluster.node(1).run_anti_entropy_round().await;
    cluster.hub.deliver_all().await;

    assert!(cluster.node(0).device(&did1()).is_none());
    assert!(cluster.node(1).device(&did1()).is_none());
}

#[tokio::test]
async fn synchronized_peers_exchange_only_advertisements() {
    let cluster = Cluster::new(&["node1", "node2"]);
    cluster
        .node(0)
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    cluster.hub.deliver_all().await;
    let before = cluster.hub.delivered();

    assert_eq!(cluster.node(0).run_anti_entropy_round().await, Some(node2()));
    let pending = cluster.hub.pending_envelopes();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].subject, subjects::DEVICE_ADVERTISE);
    cluster.hub.deliver_all().await;

    assert_eq!(cluster.hub.delivered(), before + 1);
}

#[tokio::test]
async fn advertisement_lists_fragments_and_marks() {
    let cluster = Cluster::new(&["node1", "node2"]);
    let origin = cluster.node(0);
    origin
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    origin
        .create_or_update_device(
            &pida(),
            &did1(),
            device_description(&did1(), SW1, SparseAnnotations::empty()),
        )
        .await;
    origin
        .update_ports(&pid(), &did1(), vec![port(P1, true)])
        .await;
    origin.mark_offline(&did1()).await;
    origin
        .create_or_update_device(
            &pid(),
            &did2(),
            device_description(&did2(), SW1, SparseAnnotations::empty()),
        )
        .await;
    origin.remove_device(&did2()).await;

    let advertisement = origin.create_advertisement().await;
    assert_eq!(advertisement.sender, Some(node1()));
    assert!(!advertisement.is_reply);
    assert_eq!(advertisement.devices.len(), 2);
    assert_eq!(advertisement.ports.len(), 1);
    assert!(advertisement.offline.contains_key(&did1()));
    assert!(advertisement.removed.contains_key(&did2()));
    assert!(!advertisement.removed.contains_key(&did1()));
}

#[tokio::test]
async fn lone_node_skips_rounds() {
    let store = Arc::new(GossipDeviceStore::new(
        DeviceStoreConfig::for_testing(),
        StoreEffects {
            clock: Arc::new(TestDeviceClock::new()),
            mastership: Arc::new(StaticMastership::everything_on(node1())),
            membership: Arc::new(StaticMembership::single(node1())),
            communicator: Arc::new(RecordingCommunicator::new(node1())),
        },
    ));
    assert_eq!(store.run_anti_entropy_round().await, None);
}

#[tokio::test]
async fn periodic_task_repairs_without_being_driven() {
    let config = DeviceStoreConfig {
        anti_entropy: AntiEntropyConfig {
            enabled: true,
            initial_delay_ms: 10,
            period_ms: 10,
        },
        ..DeviceStoreConfig::for_testing()
    };
    let cluster = Cluster::with_config(&["node1", "node2"], config);
    cluster
        .node(0)
        .create_or_update_device(&pid(), &did1(), device_description(&did1(), SW1, a1()))
        .await;
    cluster.hub.drop_pending();

    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cluster.hub.deliver_all().await;
        if cluster.node(1).device(&did1()).is_some() {
            break;
        }
    }
    assert!(cluster.converged());
    assert!(cluster.node(1).device(&did1()).is_some());

    for store in &cluster.stores {
        store.deactivate();
    }
    cluster.hub.drop_pending();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cluster.hub.pending(), 0);
}
