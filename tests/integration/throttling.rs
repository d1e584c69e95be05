use std::time::Duration;

use bluem_core::profile::Profile;
use bluem_services::{DeviceAddress, Discovery, PeerEventKind};
use tokio::time;

use crate::*;

#[tokio::test(start_paused = true)]
async fn steady_pings_are_coalesced() {
    let air = Air::new();
    let alice = air.join("fe80::a", None, full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();

    // Pings every 500 ms against a 2 s window: after the first sighting at
    // t=0, updates get through at 2.5 s and 5.0 s.
    alice.advertiser.start();
    time::sleep(Duration::from_millis(5200)).await;

    let kinds: Vec<_> = drain(&mut events).into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            PeerEventKind::Discovered,
            PeerEventKind::Updated,
            PeerEventKind::Updated
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn coalesced_updates_still_refresh_the_registry() {
    let air = Air::new();
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();
    let address = DeviceAddress::new("fe80::c");

    for rssi in [-80, -65, -50] {
        bob.inject(Discovery {
            address: address.clone(),
            rssi,
            name: None,
            manufacturer_data: None,
        })
        .await;
    }

    let kinds: Vec<_> = drain(&mut events).into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![PeerEventKind::Discovered]);
    assert_eq!(bob.tracker.registry().get(&address).unwrap().rssi, -50);
}
