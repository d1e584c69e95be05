//! Update throttle: bounds how often one peer's updates reach observers.
//!
//! The registry is always updated; only the notification is coalesced.
//! A peer coming back from inactive always notifies at once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::peer::DeviceAddress;

#[derive(Clone)]
pub struct UpdateThrottle {
    last_notified: Arc<DashMap<DeviceAddress, Instant>>,
    window: Duration,
}

impl UpdateThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            last_notified: Arc::new(DashMap::new()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Would an update at `now` be passed on? Does not record anything.
    pub fn should_notify(&self, address: &DeviceAddress, now: Instant, force: bool) -> bool {
        if force {
            return true;
        }
        match self.last_notified.get(address) {
            Some(last) => self.window_elapsed(*last, now),
            None => true,
        }
    }

    /// Record that observers were notified about `address` at `now`.
    pub fn record(&self, address: &DeviceAddress, now: Instant) {
        self.last_notified.insert(address.clone(), now);
    }

    /// Decide and record in one step, under the entry's lock.
    pub fn try_acquire(&self, address: &DeviceAddress, now: Instant, force: bool) -> bool {
        match self.last_notified.entry(address.clone()) {
            Entry::Occupied(mut occupied) => {
                if force || self.window_elapsed(*occupied.get(), now) {
                    occupied.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    /// Drop the debounce timestamp, so the next update is not held back.
    pub fn forget(&self, address: &DeviceAddress) {
        self.last_notified.remove(address);
    }

    fn window_elapsed(&self, last: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last) > self.window
    }
}
