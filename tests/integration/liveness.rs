use std::time::Duration;

use bluem_core::profile::Profile;
use bluem_services::PeerEventKind;
use tokio::time::{self, Instant};

use crate::*;

#[tokio::test(start_paused = true)]
async fn silent_peer_goes_inactive_and_comes_back() {
    let air = Air::new();
    let alice = air.join("fe80::a", None, full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();
    bob.sweeper.start();

    alice.advertiser.start();
    next_event_of(&mut events, PeerEventKind::Discovered).await;

    alice.advertiser.stop();
    let stopped_at = Instant::now();

    let event = next_event_of(&mut events, PeerEventKind::Inactive).await;
    assert_eq!(event.peer.address, alice.address);
    assert!(!event.peer.active);
    assert!(event.peer.ping.is_some(), "profile is kept while inactive");
    assert!(Instant::now() - stopped_at >= Duration::from_secs(29));
    assert_eq!(bob.tracker.registry().active_count(), 0);

    // Comes back right away, without waiting out the debounce window.
    alice.advertiser.start();
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, PeerEventKind::Reactivated);
    assert!(event.peer.active);
    assert_eq!(bob.tracker.registry().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pinging_peer_stays_active() {
    let air = Air::new();
    let alice = air.join("fe80::a", None, full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    let mut events = bob.tracker.subscribe();
    bob.sweeper.start();

    alice.advertiser.start();
    time::sleep(Duration::from_secs(90)).await;

    let inactive = drain(&mut events)
        .into_iter()
        .filter(|e| e.kind == PeerEventKind::Inactive)
        .count();
    assert_eq!(inactive, 0);
    assert_eq!(bob.tracker.registry().active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopped_sweeper_never_expires() {
    let air = Air::new();
    let alice = air.join("fe80::a", None, full_profile());
    let bob = air.join("fe80::b", None, Profile::default());
    bob.sweeper.start();
    assert!(bob.sweeper.stop());

    alice.advertiser.start();
    time::sleep(Duration::from_secs(1)).await;
    alice.advertiser.stop();

    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(bob.tracker.registry().active_count(), 1);
}
