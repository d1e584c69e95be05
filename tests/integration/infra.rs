use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use bluem_core::config::TrackingConfig;
use bluem_core::profile::Profile;
use bluem_services::{
    scan_worker, Advertiser, CustomNames, DeviceAddress, Discovery, LinkStatus, LivenessSweeper,
    MemoryProfileStore, PeerEvent, PeerEventKind, PeerEvents, PingTracker, RadioAdapter, ScanReport,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

pub const ADVERTISE_INTERVAL: Duration = Duration::from_millis(500);

/// Signal strength every receiver reports, in dBm.
pub const AIR_RSSI: i16 = -60;

struct Receiver {
    address: DeviceAddress,
    scans: mpsc::Sender<ScanReport>,
}

/// Shared medium connecting the nodes of one test.
#[derive(Clone, Default)]
pub struct Air {
    receivers: Arc<Mutex<Vec<Receiver>>>,
}

/// Transmit half for one node.
struct LoopbackRadio {
    air: Air,
    address: DeviceAddress,
    name: Option<String>,
}

impl RadioAdapter for LoopbackRadio {
    fn transmit(&self, manufacturer_id: u16, payload: &[u8]) -> Result<()> {
        anyhow::ensure!(
            manufacturer_id == bluem_core::wire::MANUFACTURER_ID,
            "unexpected manufacturer id 0x{manufacturer_id:04x}"
        );
        let receivers = self.air.receivers.lock().unwrap();
        for rx in receivers.iter().filter(|r| r.address != self.address) {
            let _ = rx.scans.try_send(ScanReport::Single(Discovery {
                address: self.address.clone(),
                rssi: AIR_RSSI,
                name: self.name.clone(),
                manufacturer_data: Some(payload.to_vec()),
            }));
        }
        Ok(())
    }
}

pub struct Node {
    pub address: DeviceAddress,
    pub tracker: PingTracker,
    pub profile: MemoryProfileStore,
    pub advertiser: Advertiser,
    pub sweeper: LivenessSweeper,
    pub link: LinkStatus,
    scans: mpsc::Sender<ScanReport>,
}

impl Air {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring up a node with default tracking settings.
    pub fn join(&self, address: &str, name: Option<&str>, profile: Profile) -> Node {
        self.join_with(address, name, profile, TrackingConfig::default())
    }

    pub fn join_with(
        &self,
        address: &str,
        name: Option<&str>,
        profile: Profile,
        tracking: TrackingConfig,
    ) -> Node {
        let address = DeviceAddress::new(address);
        let tracker = PingTracker::from_config(&tracking, CustomNames::new());
        let profile = MemoryProfileStore::new(profile);
        let link = LinkStatus::new();

        let (scans, scan_rx) = mpsc::channel(256);
        tokio::spawn(scan_worker(scan_rx, tracker.clone()));
        self.receivers.lock().unwrap().push(Receiver {
            address: address.clone(),
            scans: scans.clone(),
        });

        let radio = Arc::new(LoopbackRadio {
            air: self.clone(),
            address: address.clone(),
            name: name.map(str::to_string),
        });
        let advertiser = Advertiser::new(
            radio,
            Arc::new(profile.clone()),
            ADVERTISE_INTERVAL,
            link.clone(),
        );
        let sweeper = LivenessSweeper::new(tracker.clone(), tracking.sweep_interval());

        Node {
            address,
            tracker,
            profile,
            advertiser,
            sweeper,
            link,
            scans,
        }
    }
}

impl Node {
    /// Feed a sighting straight into this node's scan queue, bypassing the air.
    pub async fn inject(&self, discovery: Discovery) {
        self.scans
            .send(ScanReport::Single(discovery))
            .await
            .expect("scan worker should be running");
        // Let the scan worker drain the queue.
        time::sleep(Duration::from_millis(1)).await;
    }
}

/// A profile with every field populated.
pub fn full_profile() -> Profile {
    Profile {
        phone_number: "+44 7700 900123".into(),
        blood_group: Some(6),
        latitude: Some(51.5),
        longitude: Some(-0.12),
    }
}

/// Next event, failing the test if none arrives within a minute of
/// (paused) time.
pub async fn next_event(events: &mut PeerEvents) -> PeerEvent {
    time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("timed out waiting for a peer event")
        .expect("event channel closed or lagged")
}

/// Next event of the given kind, skipping others.
pub async fn next_event_of(events: &mut PeerEvents, kind: PeerEventKind) -> PeerEvent {
    loop {
        let event = next_event(events).await;
        if event.kind == kind {
            return event;
        }
    }
}

/// Everything already queued, without waiting.
pub fn drain(events: &mut PeerEvents) -> Vec<PeerEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(e) => out.push(e),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}
