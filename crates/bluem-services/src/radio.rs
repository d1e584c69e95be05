//! Seams to the platform: the radio that carries advertisements and the
//! store that holds the local profile.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use bluem_core::profile::{Profile, ProfileError, ProfileSnapshot};

/// The broadcast half of a BLE radio.
///
/// Discovery runs the other way: the platform scanner produces
/// [`Discovery`](crate::tracker::Discovery) events and feeds them to the
/// tracker.
pub trait RadioAdapter: Send + Sync {
    /// Broadcast `payload` as manufacturer-specific data under
    /// `manufacturer_id`. Fire-and-forget.
    fn transmit(&self, manufacturer_id: u16, payload: &[u8]) -> Result<()>;
}

/// Source of the local profile, read once per advertisement cycle.
pub trait ProfileStore: Send + Sync {
    fn current_snapshot(&self) -> ProfileSnapshot;
}

/// In-memory profile, replaceable at runtime.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profile: Arc<RwLock<Profile>>,
}

impl MemoryProfileStore {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile: Arc::new(RwLock::new(profile)),
        }
    }

    pub fn get(&self) -> Profile {
        self.profile
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the profile after checking it encodes faithfully.
    pub fn replace(&self, profile: Profile) -> Result<(), ProfileError> {
        profile.validate()?;
        *self
            .profile
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = profile;
        tracing::info!("profile updated");
        Ok(())
    }
}

impl ProfileStore for MemoryProfileStore {
    fn current_snapshot(&self) -> ProfileSnapshot {
        self.get().snapshot()
    }
}
