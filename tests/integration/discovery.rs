use bluem_core::display::BloodGroup;
use bluem_core::profile::Profile;
use bluem_services::{DeviceAddress, Discovery, PeerEventKind};

use crate::*;

#[tokio::test(start_paused = true)]
async fn advertised_profile_is_discovered() {
    let air = Air::new();
    let alice = air.join("fe80::a", Some("alice"), full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();

    assert!(alice.advertiser.start());
    assert!(alice.link.current().advertising);

    let event = next_event(&mut events).await;
    assert_eq!(event.kind, PeerEventKind::Discovered);
    assert_eq!(event.peer.address, alice.address);
    assert_eq!(event.peer.display_name(), "alice");
    assert_eq!(event.peer.rssi, AIR_RSSI);
    assert!(event.peer.active);

    let ping = event.peer.ping.expect("profile should decode");
    assert_eq!(BloodGroup::from(ping.blood_group_index).to_string(), "O+");
    assert_eq!(ping.location(), Some((51.5, -0.12)));
    assert_eq!(ping.phone_hint().as_deref(), Some("0123"));

    // A node never hears itself.
    assert!(alice.tracker.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_profile_decodes_as_unknowns() {
    let air = Air::new();
    let alice = air.join("fe80::a", None, Profile::default());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();

    alice.advertiser.start();
    let event = next_event(&mut events).await;
    let ping = event.peer.ping.expect("profile should decode");

    assert_eq!(BloodGroup::from(ping.blood_group_index), BloodGroup::Unknown);
    assert_eq!(ping.location(), None);
    assert_eq!(ping.phone_hint(), None);
    assert_eq!(event.peer.display_name(), "fe80::a");
}

#[tokio::test(start_paused = true)]
async fn three_nodes_see_each_other() {
    let air = Air::new();
    let nodes = [
        air.join("fe80::1", None, full_profile()),
        air.join("fe80::2", None, full_profile()),
        air.join("fe80::3", None, full_profile()),
    ];
    for node in &nodes {
        node.advertiser.start();
    }

    tokio::time::sleep(ADVERTISE_INTERVAL * 3).await;

    for node in &nodes {
        let seen: Vec<_> = node
            .tracker
            .registry()
            .snapshot()
            .into_iter()
            .map(|p| p.address)
            .collect();
        assert_eq!(seen.len(), 2, "{} should see both others", node.address);
        assert!(!seen.contains(&node.address));
    }
}

#[tokio::test(start_paused = true)]
async fn foreign_payloads_still_count_for_presence() {
    let air = Air::new();
    let bob = air.join("fe80::b", None, Profile::default());
    let stranger = DeviceAddress::new("fe80::99");
    let sighting = |data: Vec<u8>| Discovery {
        address: stranger.clone(),
        rssi: -70,
        name: None,
        manufacturer_data: Some(data),
    };

    // Wrong protocol marker: present, no profile.
    bob.inject(sighting(vec![0x02; 11])).await;
    let entry = bob.tracker.registry().get(&stranger).unwrap();
    assert!(entry.active);
    assert!(entry.ping.is_none());

    // A valid ping fills in the profile.
    let valid = bluem_core::wire::encode(&full_profile().snapshot(), || 9);
    bob.inject(sighting(valid.as_bytes().to_vec())).await;
    let entry = bob.tracker.registry().get(&stranger).unwrap();
    assert_eq!(entry.ping.map(|p| p.sequence), Some(9));

    // A truncated one keeps the last good profile.
    bob.inject(sighting(vec![0x01, 0x06, 0x1E])).await;
    let entry = bob.tracker.registry().get(&stranger).unwrap();
    assert_eq!(entry.ping.map(|p| p.sequence), Some(9));
    assert_eq!(bob.tracker.registry().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn profile_edits_reach_peers() {
    let air = Air::new();
    let alice = air.join("fe80::a", None, full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();

    alice.advertiser.start();
    next_event_of(&mut events, PeerEventKind::Discovered).await;

    alice
        .profile
        .replace(Profile {
            blood_group: Some(1),
            ..full_profile()
        })
        .unwrap();

    loop {
        let event = next_event_of(&mut events, PeerEventKind::Updated).await;
        let blood = event.peer.ping.map(|p| p.blood_group_index);
        if blood == Some(1) {
            break;
        }
    }
}
