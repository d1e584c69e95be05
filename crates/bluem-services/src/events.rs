//! Observer plumbing: per-peer notifications and the radio link state.
//!
//! Both are owned channels. Subscribing hands out a receiver; dropping the
//! receiver unsubscribes. Nothing here is process-global.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::peer::PeerEntry;

/// Capacity of the peer event channel. Slow observers see `Lagged` and
/// should re-read the registry snapshot.
pub const PEER_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEventKind {
    /// First ping from this address. Display at the top.
    Discovered,
    /// New data for a peer already shown.
    Updated,
    /// A timed-out peer pinged again.
    Reactivated,
    /// The sweeper timed the peer out.
    Inactive,
    /// The user changed the peer's custom name.
    Renamed,
}

/// A notification for observers, carrying a copy of the entry.
#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub kind: PeerEventKind,
    pub peer: PeerEntry,
}

/// Subscription to peer events.
pub type PeerEvents = broadcast::Receiver<PeerEvent>;

/// Whether the radio is currently advertising and scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkState {
    pub advertising: bool,
    pub scanning: bool,
}

/// Publisher of [`LinkState`]. Observers are only woken on actual changes.
#[derive(Clone)]
pub struct LinkStatus {
    tx: Arc<watch::Sender<LinkState>>,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStatus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LinkState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LinkState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.tx.subscribe()
    }

    pub fn set_advertising(&self, advertising: bool) {
        self.update(|s| s.advertising = advertising);
    }

    pub fn set_scanning(&self, scanning: bool) {
        self.update(|s| s.scanning = scanning);
    }

    fn update(&self, apply: impl FnOnce(&mut LinkState)) {
        let changed = self.tx.send_if_modified(|state| {
            let before = *state;
            apply(state);
            *state != before
        });
        if changed {
            let state = self.current();
            tracing::info!(
                advertising = state.advertising,
                scanning = state.scanning,
                "link state changed"
            );
        }
    }
}
