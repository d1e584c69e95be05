//! bluemd: Bluem SOS beacon daemon.
//!
//! Advertises the local profile, scans for nearby beacons, and serves the
//! peer list over HTTP on 127.0.0.1.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use bluem_core::config::{BluemConfig, RadioConfig, TrackingConfig};
use bluem_core::profile::Profile;
use bluem_services::{
    scan_worker, Advertiser, CustomNames, LinkStatus, LivenessSweeper, MemoryProfileStore,
    PeerEventKind, PeerEvents, PingTracker,
};

mod radio;
mod status;

use radio::listener::{self, ListenerSettings};
use radio::udp::UdpRadio;

/// Scanner reports buffered ahead of the scan worker.
const SCAN_QUEUE_DEPTH: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = BluemConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = BluemConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BluemConfig::default()
    });
    if let Err(e) = config.tracking.validate() {
        tracing::warn!(error = %e, "using default sweep interval");
        config.tracking.sweep_interval_ms = TrackingConfig::default().sweep_interval_ms;
    }
    if let Err(e) = config.radio.validate() {
        tracing::warn!(error = %e, "using default advertise interval");
        config.radio.advertise_interval_ms = RadioConfig::default().advertise_interval_ms;
    }

    let interface = std::env::args()
        .nth(1)
        .or_else(|| Some(config.radio.interface.clone()).filter(|i| !i.is_empty()))
        .unwrap_or_else(|| "veth-a".to_string());
    tracing::info!(interface, "bluemd starting");

    let interface_index = radio::if_index(&interface)?;
    let local_addr = radio::local_link_addr(interface_index, config.radio.port)?;
    tracing::info!(addr = %local_addr, "local link-local address");

    // Profile
    let initial_profile = match config.profile.validate() {
        Ok(()) => config.profile.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "configured profile is invalid, starting empty");
            Profile::default()
        }
    };
    let profile = MemoryProfileStore::new(initial_profile);

    // Shared state
    let names = CustomNames::with_persistence(config.storage.names_path.clone());
    tracing::info!(
        path = %config.storage.names_path.display(),
        count = names.len(),
        "custom names loaded"
    );
    let tracker = PingTracker::from_config(&config.tracking, names);
    let link = LinkStatus::new();

    let radio = Arc::new(UdpRadio::new(
        interface_index,
        config.radio.port,
        config.radio.device_name.clone(),
    )?);
    let advertiser = Arc::new(Advertiser::new(
        radio,
        Arc::new(profile.clone()),
        config.radio.advertise_interval(),
        link.clone(),
    ));
    if config.radio.advertise_on_start {
        advertiser.start();
    }

    let sweeper = LivenessSweeper::new(tracker.clone(), config.tracking.sweep_interval());
    sweeper.start();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let (scan_tx, scan_rx) = mpsc::channel(SCAN_QUEUE_DEPTH);
    let scan_task = tokio::spawn(scan_worker(scan_rx, tracker.clone()));

    let listener_task = tokio::spawn(listener::listener_loop(
        scan_tx,
        ListenerSettings {
            interface_index,
            port: config.radio.port,
            local_addr,
            rssi: config.radio.simulated_rssi,
        },
        link.clone(),
    ));

    let event_logger = tokio::spawn(log_events(tracker.subscribe()));

    let api_task = {
        let state = status::ApiState {
            tracker: tracker.clone(),
            advertiser: advertiser.clone(),
            profile,
            link,
            started_at: Instant::now(),
        };
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = status::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = listener_task       => tracing::error!("radio listener exited: {:?}", r),
        r = scan_task           => tracing::error!("scan worker exited: {:?}", r),
        r = event_logger        => tracing::error!("event logger exited: {:?}", r),
        r = api_task            => tracing::error!("API server exited: {:?}", r),
    }

    advertiser.stop();
    sweeper.stop();
    Ok(())
}

/// One line per peer event, the daemon's stand-in for the app's list view.
async fn log_events(mut events: PeerEvents) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let peer = &event.peer;
                match event.kind {
                    PeerEventKind::Discovered | PeerEventKind::Reactivated => tracing::info!(
                        kind = ?event.kind,
                        address = %peer.address,
                        name = peer.display_name(),
                        rssi = peer.rssi,
                        "peer"
                    ),
                    _ => tracing::debug!(
                        kind = ?event.kind,
                        address = %peer.address,
                        name = peer.display_name(),
                        rssi = peer.rssi,
                        active = peer.active,
                        "peer"
                    ),
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
