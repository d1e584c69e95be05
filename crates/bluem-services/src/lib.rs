//! bluem-services: peer presence tracking and the advertise/scan plumbing
//! around the wire codec.
//!
//! Control flow:
//!   ProfileStore → encode → RadioAdapter::transmit          (Advertiser)
//!   Discovery → decode → PeerRegistry → UpdateThrottle → PeerEvent  (PingTracker)
//!   LivenessSweeper → PingTracker::sweep                    (every few seconds)

pub mod advertise;
pub mod events;
pub mod names;
pub mod peer;
pub mod radio;
pub mod sweeper;
pub mod throttle;
pub mod tracker;

pub use advertise::Advertiser;
pub use events::{LinkState, LinkStatus, PeerEvent, PeerEventKind, PeerEvents};
pub use names::CustomNames;
pub use peer::{DeviceAddress, PeerEntry, PeerRegistry, Sighting, UpsertResult};
pub use radio::{MemoryProfileStore, ProfileStore, RadioAdapter};
pub use sweeper::LivenessSweeper;
pub use throttle::UpdateThrottle;
pub use tracker::{scan_worker, Discovery, PingTracker, ScanReport};
