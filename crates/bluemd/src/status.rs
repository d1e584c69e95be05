//! HTTP API: daemon state as JSON, plus the few controls the app exposes.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use bluem_core::display::{estimate_distance, BloodGroup};
use bluem_core::profile::Profile;
use bluem_services::{Advertiser, DeviceAddress, LinkStatus, MemoryProfileStore, PeerEntry, PingTracker};

#[derive(Clone)]
pub struct ApiState {
    pub tracker: PingTracker,
    pub advertiser: Arc<Advertiser>,
    pub profile: MemoryProfileStore,
    pub link: LinkStatus,
    pub started_at: Instant,
}

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub advertising: bool,
    pub scanning: bool,
    pub peers_known: usize,
    pub peers_active: usize,
    pub custom_names: usize,
    pub uptime_secs: u64,
}

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let link = state.link.current();
    let registry = state.tracker.registry();
    Json(StatusResponse {
        advertising: link.advertising,
        scanning: link.scanning,
        peers_known: registry.len(),
        peers_active: registry.active_count(),
        custom_names: state.tracker.names().len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfo>,
}

#[derive(Serialize, Deserialize)]
pub struct PeerInfo {
    pub address: String,
    pub display_name: String,
    pub active: bool,
    pub rssi: i16,
    pub distance_m: Option<f64>,
    pub last_seen_secs: u64,
    pub blood_group: Option<String>,
    pub location: Option<(f64, f64)>,
    pub phone_hint: Option<String>,
    pub sequence: Option<u8>,
}

impl From<&PeerEntry> for PeerInfo {
    fn from(p: &PeerEntry) -> Self {
        let ping = p.ping.as_ref();
        Self {
            address: p.address.to_string(),
            display_name: p.display_name().to_string(),
            active: p.active,
            rssi: p.rssi,
            distance_m: estimate_distance(p.rssi),
            last_seen_secs: p.last_seen.elapsed().as_secs(),
            blood_group: ping.map(|d| BloodGroup::from(d.blood_group_index).to_string()),
            location: ping.and_then(|d| d.location()),
            phone_hint: ping.and_then(|d| d.phone_hint()),
            sequence: ping.map(|d| d.sequence),
        }
    }
}

/// Most recently seen first.
async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let peers = state
        .tracker
        .registry()
        .snapshot()
        .iter()
        .map(PeerInfo::from)
        .collect();
    Json(PeersResponse { peers })
}

// ── /peers/{address}/name ─────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct NameRequest {
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct NameResponse {
    pub address: String,
    pub name: Option<String>,
    /// Whether the device is already in the registry. Names for unseen
    /// devices are stored and applied on first sighting.
    pub known: bool,
}

async fn handle_set_name(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<NameRequest>,
) -> Json<NameResponse> {
    let address = DeviceAddress::new(address);
    let entry = state.tracker.set_custom_name(
        &address,
        req.name.as_deref(),
        tokio::time::Instant::now(),
    );
    Json(NameResponse {
        name: state.tracker.names().get(&address),
        address: address.to_string(),
        known: entry.is_some(),
    })
}

// ── /advertise ────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct AdvertiseResponse {
    pub advertising: bool,
    /// False when the request asked for the state already in effect.
    pub changed: bool,
}

async fn handle_advertise_start(State(state): State<ApiState>) -> Json<AdvertiseResponse> {
    let changed = state.advertiser.start();
    Json(AdvertiseResponse {
        advertising: state.advertiser.is_advertising(),
        changed,
    })
}

async fn handle_advertise_stop(State(state): State<ApiState>) -> Json<AdvertiseResponse> {
    let changed = state.advertiser.stop();
    Json(AdvertiseResponse {
        advertising: state.advertiser.is_advertising(),
        changed,
    })
}

// ── /profile ──────────────────────────────────────────────────────────────────

async fn handle_get_profile(State(state): State<ApiState>) -> Json<Profile> {
    Json(state.profile.get())
}

async fn handle_put_profile(
    State(state): State<ApiState>,
    Json(profile): Json<Profile>,
) -> Result<Json<Profile>, (StatusCode, String)> {
    state
        .profile
        .replace(profile)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(state.profile.get()))
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/peers", get(handle_peers))
        .route("/peers/{address}/name", post(handle_set_name))
        .route("/advertise/start", post(handle_advertise_start))
        .route("/advertise/stop", post(handle_advertise_stop))
        .route("/profile", get(handle_get_profile).put(handle_put_profile))
        .with_state(state)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bluem_core::config::TrackingConfig;
    use bluem_core::wire;
    use bluem_services::{CustomNames, Discovery, RadioAdapter};

    use super::*;

    struct NullRadio;

    impl RadioAdapter for NullRadio {
        fn transmit(&self, _: u16, _: &[u8]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn state() -> ApiState {
        let profile = MemoryProfileStore::new(Profile::default());
        let link = LinkStatus::new();
        ApiState {
            tracker: PingTracker::from_config(&TrackingConfig::default(), CustomNames::new()),
            advertiser: Arc::new(Advertiser::new(
                Arc::new(NullRadio),
                Arc::new(profile.clone()),
                Duration::from_secs(1),
                link.clone(),
            )),
            profile,
            link,
            started_at: Instant::now(),
        }
    }

    fn seed_peer(state: &ApiState, address: &str) {
        let profile = Profile {
            phone_number: "0612345678".into(),
            blood_group: Some(2),
            latitude: Some(45.5),
            longitude: Some(-73.25),
        };
        let data = wire::encode(&profile.snapshot(), || 3).as_bytes().to_vec();
        state.tracker.handle_discovery(
            Discovery {
                address: address.into(),
                rssi: -69,
                name: Some("Phone".into()),
                manufacturer_data: Some(data),
            },
            tokio::time::Instant::now(),
        );
    }

    #[tokio::test]
    async fn peers_are_display_ready() {
        let state = state();
        seed_peer(&state, "fe80::2");

        let Json(resp) = handle_peers(State(state)).await;
        assert_eq!(resp.peers.len(), 1);
        let p = &resp.peers[0];
        assert_eq!(p.display_name, "Phone");
        assert_eq!(p.blood_group.as_deref(), Some("B+"));
        assert_eq!(p.location, Some((45.5, -73.25)));
        assert_eq!(p.phone_hint.as_deref(), Some("5678"));
        assert_eq!(p.sequence, Some(3));
        assert!((p.distance_m.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rename_applies_to_known_peer() {
        let state = state();
        seed_peer(&state, "fe80::2");

        let Json(resp) = handle_set_name(
            State(state.clone()),
            Path("fe80::2".to_string()),
            Json(NameRequest {
                name: Some("  Base camp ".into()),
            }),
        )
        .await;
        assert!(resp.known);
        assert_eq!(resp.name.as_deref(), Some("Base camp"));

        let Json(peers) = handle_peers(State(state)).await;
        assert_eq!(peers.peers[0].display_name, "Base camp");
    }

    #[tokio::test]
    async fn rename_of_unseen_device_is_stored() {
        let state = state();
        let Json(resp) = handle_set_name(
            State(state.clone()),
            Path("fe80::9".to_string()),
            Json(NameRequest { name: Some("Later".into()) }),
        )
        .await;
        assert!(!resp.known);
        assert_eq!(resp.name.as_deref(), Some("Later"));
        assert_eq!(state.tracker.names().len(), 1);
    }

    #[tokio::test]
    async fn advertise_toggle_reports_changes() {
        let state = state();
        let Json(first) = handle_advertise_start(State(state.clone())).await;
        assert!(first.advertising && first.changed);
        let Json(again) = handle_advertise_start(State(state.clone())).await;
        assert!(again.advertising && !again.changed);

        let Json(status) = handle_status(State(state.clone())).await;
        assert!(status.advertising);

        let Json(stopped) = handle_advertise_stop(State(state)).await;
        assert!(!stopped.advertising && stopped.changed);
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected() {
        let state = state();
        let bad = Profile {
            latitude: Some(120.0),
            longitude: Some(0.0),
            ..Profile::default()
        };
        let err = handle_put_profile(State(state.clone()), Json(bad)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let good = Profile {
            phone_number: "555 0100".into(),
            ..Profile::default()
        };
        let Json(stored) = handle_put_profile(State(state), Json(good.clone())).await.unwrap();
        assert_eq!(stored, good);
    }
}
