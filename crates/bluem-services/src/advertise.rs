//! Profile advertisement: periodically re-encodes the local profile and
//! hands it to the radio.
//!
//! Re-encoding every cycle picks up profile edits and refreshes the
//! sequence byte, so observers can tell consecutive transmissions apart.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use bluem_core::config::RadioConfig;
use bluem_core::wire::{self, EncodedPayload, MANUFACTURER_ID};
use tokio::task::JoinHandle;
use tokio::time;

use crate::events::LinkStatus;
use crate::radio::{ProfileStore, RadioAdapter};

/// Encode the current profile and transmit it once.
pub fn advertise_once(radio: &dyn RadioAdapter, profile: &dyn ProfileStore) -> Result<EncodedPayload> {
    let snapshot = profile.current_snapshot();
    let payload = wire::encode(&snapshot, wire::wall_clock_sequence);
    radio
        .transmit(MANUFACTURER_ID, payload.as_bytes())
        .context("radio transmit failed")?;
    Ok(payload)
}

/// Owns the repeating advertisement task.
pub struct Advertiser {
    radio: Arc<dyn RadioAdapter>,
    profile: Arc<dyn ProfileStore>,
    interval: Duration,
    link: LinkStatus,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Advertiser {
    /// A zero `interval` falls back to the default advertise interval.
    pub fn new(
        radio: Arc<dyn RadioAdapter>,
        profile: Arc<dyn ProfileStore>,
        interval: Duration,
        link: LinkStatus,
    ) -> Self {
        let interval = if interval.is_zero() {
            let fallback = RadioConfig::default().advertise_interval();
            tracing::warn!(fallback_ms = fallback.as_millis() as u64, "zero advertise interval");
            fallback
        } else {
            interval
        };
        Self {
            radio,
            profile,
            interval,
            link,
            task: Mutex::new(None),
        }
    }

    /// Begin advertising. Must be called from within a tokio runtime.
    /// Returns false if already advertising.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }
        let radio = self.radio.clone();
        let profile = self.profile.clone();
        *task = Some(tokio::spawn(advertise_loop(radio, profile, self.interval)));
        self.link.set_advertising(true);
        tracing::info!(
            manufacturer_id = format!("0x{MANUFACTURER_ID:04x}"),
            interval_ms = self.interval.as_millis() as u64,
            "advertising started"
        );
        true
    }

    /// Stop advertising. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        let Some(handle) = task.take() else {
            return false;
        };
        handle.abort();
        self.link.set_advertising(false);
        tracing::info!("advertising stopped");
        true
    }

    pub fn is_advertising(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Transmit immediately, then every `interval`. Send failures are logged
/// and retried next cycle.
async fn advertise_loop(radio: Arc<dyn RadioAdapter>, profile: Arc<dyn ProfileStore>, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match advertise_once(radio.as_ref(), profile.as_ref()) {
            Ok(payload) => tracing::trace!(payload = ?payload.as_bytes(), "advertisement sent"),
            Err(e) => tracing::warn!(error = %e, "advertisement failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluem_core::profile::Profile;
    use bluem_core::wire::PROTOCOL_MARKER;

    use crate::radio::MemoryProfileStore;

    #[derive(Default)]
    struct RecordingRadio {
        sent: Mutex<Vec<(u16, Vec<u8>)>>,
        fail: bool,
    }

    impl RadioAdapter for RecordingRadio {
        fn transmit(&self, manufacturer_id: u16, payload: &[u8]) -> Result<()> {
            if self.fail {
                anyhow::bail!("radio off");
            }
            self.sent.lock().unwrap().push((manufacturer_id, payload.to_vec()));
            Ok(())
        }
    }

    fn profile() -> Arc<MemoryProfileStore> {
        Arc::new(MemoryProfileStore::new(Profile {
            phone_number: "555 0199".into(),
            blood_group: Some(7),
            latitude: None,
            longitude: None,
        }))
    }

    #[test]
    fn advertise_once_sends_encoded_profile() {
        let radio = RecordingRadio::default();
        let payload = advertise_once(&radio, profile().as_ref()).unwrap();

        let sent = radio.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, MANUFACTURER_ID);
        assert_eq!(sent[0].1, payload.as_bytes());
        assert_eq!(sent[0].1[0], PROTOCOL_MARKER);
        assert_eq!(sent[0].1[1], 0x17, "O- with phone flag");
    }

    #[test]
    fn transmit_error_is_reported() {
        let radio = RecordingRadio {
            fail: true,
            ..RecordingRadio::default()
        };
        assert!(advertise_once(&radio, profile().as_ref()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn advertiser_repeats_and_tracks_link_state() {
        let radio = Arc::new(RecordingRadio::default());
        let link = LinkStatus::new();
        let advertiser = Advertiser::new(radio.clone(), profile(), Duration::from_secs(1), link.clone());

        assert!(advertiser.start());
        assert!(!advertiser.start());
        assert!(link.current().advertising);

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(radio.sent.lock().unwrap().len(), 3, "t=0, 1s, 2s");

        assert!(advertiser.stop());
        assert!(!advertiser.stop());
        assert!(!link.current().advertising);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(radio.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_radio_keeps_loop_alive() {
        let radio = Arc::new(RecordingRadio {
            fail: true,
            ..RecordingRadio::default()
        });
        let advertiser = Advertiser::new(radio, profile(), Duration::from_secs(1), LinkStatus::new());
        advertiser.start();
        time::sleep(Duration::from_secs(3)).await;
        assert!(advertiser.is_advertising());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_advertises_at_default_rate() {
        let radio = Arc::new(RecordingRadio::default());
        let advertiser = Advertiser::new(radio.clone(), profile(), Duration::ZERO, LinkStatus::new());

        assert!(advertiser.start());
        time::sleep(Duration::from_millis(2500)).await;
        assert!(advertiser.is_advertising());
        assert_eq!(radio.sent.lock().unwrap().len(), 3, "t=0, 1s, 2s");
    }
}
