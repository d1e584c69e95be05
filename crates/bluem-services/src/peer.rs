//! Peer registry: every device that has pinged us, and whether it still is.
//!
//! Entries are never removed. A peer that stops pinging is marked inactive
//! by the sweeper and comes back to life on its next ping.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bluem_core::wire::DecodedPing;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Stable identifier of a remote device (BLE address, or link-local IP
/// for the UDP radio).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Latest known state of one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    pub address: DeviceAddress,
    /// Name seen in the advertisement or scan record.
    pub observed_name: Option<String>,
    /// Name the user assigned. Wins over `observed_name`.
    pub custom_name: Option<String>,
    /// When the most recent ping was accepted.
    pub last_seen: Instant,
    /// Signal strength of the most recent ping, in dBm.
    pub rssi: i16,
    /// False once the sweeper has timed the peer out.
    pub active: bool,
    /// Profile from the most recent ping that carried one.
    pub ping: Option<DecodedPing>,
}

impl PeerEntry {
    /// Custom name, else observed name, else the address.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .or(self.observed_name.as_deref())
            .unwrap_or(self.address.as_str())
    }
}

/// One sighting as applied by [`PeerRegistry::upsert_then`].
#[derive(Debug, Clone, Default)]
pub struct Sighting {
    pub rssi: i16,
    pub observed_name: Option<String>,
    pub ping: Option<DecodedPing>,
    /// User-assigned name, set only when this sighting creates the entry.
    pub custom_name: Option<String>,
}

/// Outcome of [`PeerRegistry::upsert`].
#[derive(Debug, Clone)]
pub struct UpsertResult {
    /// First ping ever seen from this address.
    pub is_new: bool,
    /// The entry was inactive before this ping.
    pub reactivated: bool,
    /// The entry as it stands after the update.
    pub entry: PeerEntry,
}

/// The peer registry, shared between the scan worker, the sweeper and
/// the API.
///
/// Keyed on device address. Each mutation holds only the shard lock of
/// its own entry, so readers never see a half-applied update. The `*_then`
/// variants run a callback under that lock; notifications sent from it are
/// ordered with every other mutation of the same entry.
#[derive(Clone)]
pub struct PeerRegistry {
    peers: Arc<DashMap<DeviceAddress, PeerEntry>>,
    timeout: Duration,
}

impl PeerRegistry {
    /// Create an empty registry with the given liveness timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            peers: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a ping.
    ///
    /// An unknown address gets a fresh active entry. A known address is
    /// refreshed and reactivated; its name and profile are replaced only
    /// when this ping carries them, so a bare sighting never erases what an
    /// earlier ping told us.
    pub fn upsert(
        &self,
        address: &DeviceAddress,
        rssi: i16,
        observed_name: Option<String>,
        ping: Option<DecodedPing>,
        now: Instant,
    ) -> UpsertResult {
        let sighting = Sighting {
            rssi,
            observed_name,
            ping,
            custom_name: None,
        };
        self.upsert_then(address, sighting, now, |result| result)
    }

    /// [`upsert`](Self::upsert), then run `then` on the result while the
    /// entry is still locked.
    ///
    /// `then` must not call back into the registry.
    pub fn upsert_then<R>(
        &self,
        address: &DeviceAddress,
        sighting: Sighting,
        now: Instant,
        then: impl FnOnce(UpsertResult) -> R,
    ) -> R {
        let Sighting {
            rssi,
            observed_name,
            ping,
            custom_name,
        } = sighting;

        match self.peers.entry(address.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let reactivated = !entry.active;

                entry.last_seen = now;
                entry.active = true;
                entry.rssi = rssi;
                if observed_name.is_some() {
                    entry.observed_name = observed_name;
                }
                if ping.is_some() {
                    entry.ping = ping;
                }

                then(UpsertResult {
                    is_new: false,
                    reactivated,
                    entry: entry.clone(),
                })
            }
            Entry::Vacant(vacant) => {
                let entry = PeerEntry {
                    address: address.clone(),
                    observed_name,
                    custom_name,
                    last_seen: now,
                    rssi,
                    active: true,
                    ping,
                };
                let _locked = vacant.insert(entry.clone());

                then(UpsertResult {
                    is_new: true,
                    reactivated: false,
                    entry,
                })
            }
        }
    }

    /// Mark a peer inactive if it is still active and has been silent longer
    /// than the timeout as of `now`. Returns whether it transitioned.
    pub fn mark_inactive(&self, address: &DeviceAddress, now: Instant) -> bool {
        self.mark_inactive_then(address, now, |_| ()).is_some()
    }

    /// [`mark_inactive`](Self::mark_inactive), running `then` on the updated
    /// entry under its lock when a transition happens.
    pub fn mark_inactive_then<R>(
        &self,
        address: &DeviceAddress,
        now: Instant,
        then: impl FnOnce(&PeerEntry) -> R,
    ) -> Option<R> {
        let mut entry = self.peers.get_mut(address)?;
        if !entry.active || !self.is_expired(&entry, now) {
            return None;
        }
        entry.active = false;
        Some(then(&*entry))
    }

    /// Addresses of active peers silent for longer than the timeout.
    pub fn expired(&self, now: Instant) -> Vec<DeviceAddress> {
        self.peers
            .iter()
            .filter(|e| e.active && self.is_expired(e.value(), now))
            .map(|e| e.key().clone())
            .collect()
    }

    fn is_expired(&self, entry: &PeerEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) > self.timeout
    }

    /// Set or clear the user-assigned name. Returns the updated entry, or
    /// None if the address has never been seen.
    pub fn set_custom_name(&self, address: &DeviceAddress, name: Option<String>) -> Option<PeerEntry> {
        self.set_custom_name_then(address, name, PeerEntry::clone)
    }

    /// [`set_custom_name`](Self::set_custom_name), running `then` on the
    /// updated entry under its lock.
    pub fn set_custom_name_then<R>(
        &self,
        address: &DeviceAddress,
        name: Option<String>,
        then: impl FnOnce(&PeerEntry) -> R,
    ) -> Option<R> {
        let mut entry = self.peers.get_mut(address)?;
        entry.custom_name = name;
        Some(then(&*entry))
    }

    /// Copy of one entry.
    pub fn get(&self, address: &DeviceAddress) -> Option<PeerEntry> {
        self.peers.get(address).map(|e| e.value().clone())
    }

    /// Point-in-time copy of every entry, most recently seen first.
    pub fn snapshot(&self) -> Vec<PeerEntry> {
        let mut peers: Vec<PeerEntry> = self.peers.iter().map(|e| e.value().clone()).collect();
        peers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.peers.iter().filter(|e| e.active).count()
    }
}
