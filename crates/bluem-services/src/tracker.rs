//! Ping tracker: turns radio sightings into registry updates and
//! observer notifications.
//!
//! All mutation goes through [`PeerRegistry`] and [`UpdateThrottle`], whose
//! per-entry locks serialize concurrent callers. Events for one address are
//! applied in the order they are handed in.

use bluem_core::config::TrackingConfig;
use bluem_core::wire::{self, DecodeError, DecodedPing};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::events::{PeerEvent, PeerEventKind, PeerEvents, PEER_EVENT_CAPACITY};
use crate::names::CustomNames;
use crate::peer::{DeviceAddress, PeerEntry, PeerRegistry, Sighting};
use crate::throttle::UpdateThrottle;

/// One device seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub address: DeviceAddress,
    pub rssi: i16,
    pub name: Option<String>,
    /// Manufacturer data stored under `MANUFACTURER_ID`, if any.
    pub manufacturer_data: Option<Vec<u8>>,
}

/// What the scanner hands to [`scan_worker`]: single results or a batch
/// delivered at once.
#[derive(Debug, Clone)]
pub enum ScanReport {
    Single(Discovery),
    Batch(Vec<Discovery>),
}

#[derive(Clone)]
pub struct PingTracker {
    registry: PeerRegistry,
    throttle: UpdateThrottle,
    names: CustomNames,
    events: broadcast::Sender<PeerEvent>,
}

impl PingTracker {
    pub fn new(registry: PeerRegistry, throttle: UpdateThrottle, names: CustomNames) -> Self {
        let (events, _) = broadcast::channel(PEER_EVENT_CAPACITY);
        Self {
            registry,
            throttle,
            names,
            events,
        }
    }

    pub fn from_config(config: &TrackingConfig, names: CustomNames) -> Self {
        Self::new(
            PeerRegistry::new(config.liveness_timeout()),
            UpdateThrottle::new(config.debounce()),
            names,
        )
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn names(&self) -> &CustomNames {
        &self.names
    }

    /// Subscribe to peer events. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> PeerEvents {
        self.events.subscribe()
    }

    /// Apply one sighting. Returns the event emitted, if the throttle let
    /// one through.
    ///
    /// The throttle decision and the notification happen under the entry's
    /// lock, so events for one peer go out in the order its state changed.
    pub fn handle_discovery(&self, discovery: Discovery, now: Instant) -> Option<PeerEvent> {
        let Discovery {
            address,
            rssi,
            name,
            manufacturer_data,
        } = discovery;

        let ping = manufacturer_data
            .as_deref()
            .and_then(|data| decode_profile(&address, data));

        let sighting = Sighting {
            rssi,
            observed_name: name,
            ping,
            custom_name: self.names.get(&address),
        };

        self.registry.upsert_then(&address, sighting, now, |result| {
            if result.is_new {
                let entry = result.entry;
                tracing::info!(
                    address = %address,
                    rssi,
                    name = entry.display_name(),
                    has_profile = entry.ping.is_some(),
                    "peer discovered"
                );
                self.throttle.record(&address, now);
                return Some(self.emit(PeerEventKind::Discovered, entry));
            }

            if !self.throttle.try_acquire(&address, now, result.reactivated) {
                tracing::trace!(address = %address, rssi, "update coalesced");
                return None;
            }

            let kind = if result.reactivated {
                tracing::info!(address = %address, rssi, "peer active again");
                PeerEventKind::Reactivated
            } else {
                PeerEventKind::Updated
            };
            Some(self.emit(kind, result.entry))
        })
    }

    /// Apply a batch in delivery order. Returns the number of events emitted.
    pub fn handle_batch(&self, batch: Vec<Discovery>, now: Instant) -> usize {
        batch
            .into_iter()
            .filter_map(|d| self.handle_discovery(d, now))
            .count()
    }

    /// Time out silent peers. Returns the addresses that went inactive.
    ///
    /// Inactive notifications bypass the throttle, and the peer's debounce
    /// timestamp is dropped so its return is reported immediately.
    pub fn sweep(&self, now: Instant) -> Vec<DeviceAddress> {
        let mut transitioned = Vec::new();
        for address in self.registry.expired(now) {
            let timed_out = self.registry.mark_inactive_then(&address, now, |entry| {
                self.throttle.forget(&address);
                tracing::info!(address = %address, "peer timed out");
                self.emit(PeerEventKind::Inactive, entry.clone());
            });
            if timed_out.is_some() {
                transitioned.push(address);
            }
        }
        if !transitioned.is_empty() {
            tracing::debug!(count = transitioned.len(), "peers marked inactive");
        }
        transitioned
    }

    /// Set or clear the custom name of a device.
    ///
    /// The name is stored even for devices not seen yet. A known peer is
    /// re-announced right away with a `Renamed` event, and its debounce
    /// window restarts.
    pub fn set_custom_name(
        &self,
        address: &DeviceAddress,
        name: Option<&str>,
        now: Instant,
    ) -> Option<PeerEntry> {
        let stored = self.names.set(address, name);
        self.registry.set_custom_name_then(address, stored, |entry| {
            self.throttle.record(address, now);
            self.emit(PeerEventKind::Renamed, entry.clone());
            entry.clone()
        })
    }

    fn emit(&self, kind: PeerEventKind, peer: PeerEntry) -> PeerEvent {
        let event = PeerEvent { kind, peer };
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        event
    }
}

/// Decode manufacturer data, degrading to "no profile" on any failure.
fn decode_profile(address: &DeviceAddress, data: &[u8]) -> Option<DecodedPing> {
    match wire::decode_manufacturer_data(data) {
        Ok(ping) => {
            tracing::trace!(
                address = %address,
                blood_group = ping.blood_group_index,
                sequence = ping.sequence,
                "profile ping decoded"
            );
            Some(ping)
        }
        Err(DecodeError::UnrecognizedMarker(marker)) => {
            tracing::debug!(address = %address, marker, "foreign manufacturer data ignored");
            None
        }
        Err(e) => {
            tracing::warn!(address = %address, error = %e, "failed to decode profile ping");
            None
        }
    }
}

/// Drain scanner reports into the tracker, one at a time, in order.
///
/// Runs until every sender is dropped.
pub async fn scan_worker(mut reports: mpsc::Receiver<ScanReport>, tracker: PingTracker) {
    tracing::info!("scan worker starting");
    while let Some(report) = reports.recv().await {
        let now = Instant::now();
        match report {
            ScanReport::Single(discovery) => {
                tracker.handle_discovery(discovery, now);
            }
            ScanReport::Batch(batch) => {
                tracker.handle_batch(batch, now);
            }
        }
    }
    tracing::info!("scan worker stopped");
}
