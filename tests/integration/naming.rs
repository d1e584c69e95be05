use bluem_core::profile::Profile;
use bluem_services::PeerEventKind;
use tokio::time::Instant;

use crate::*;

#[tokio::test(start_paused = true)]
async fn name_assigned_before_first_sighting_is_applied() {
    let air = Air::new();
    let alice = air.join("fe80::a", Some("alice"), full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();

    let unseen = bob
        .tracker
        .set_custom_name(&alice.address, Some("Trail partner"), Instant::now());
    assert!(unseen.is_none());

    alice.advertiser.start();
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, PeerEventKind::Discovered);
    assert_eq!(event.peer.display_name(), "Trail partner");
}

#[tokio::test(start_paused = true)]
async fn renaming_a_known_peer_is_announced_immediately() {
    let air = Air::new();
    let alice = air.join("fe80::a", Some("alice"), full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();

    alice.advertiser.start();
    next_event_of(&mut events, PeerEventKind::Discovered).await;

    let entry = bob
        .tracker
        .set_custom_name(&alice.address, Some("Base camp"), Instant::now())
        .expect("alice is known");
    assert_eq!(entry.display_name(), "Base camp");

    let event = next_event(&mut events).await;
    assert_eq!(event.kind, PeerEventKind::Renamed);
    assert_eq!(event.peer.display_name(), "Base camp");

    // Clearing falls back to the name in the advertisement.
    bob.tracker
        .set_custom_name(&alice.address, Some("   "), Instant::now());
    let event = next_event_of(&mut events, PeerEventKind::Renamed).await;
    assert_eq!(event.peer.display_name(), "alice");
}
