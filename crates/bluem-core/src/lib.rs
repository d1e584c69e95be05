//! bluem-core: shared types, the beacon wire format, and configuration.
//! All other Bluem crates depend on this one.

pub mod config;
pub mod display;
pub mod profile;
pub mod wire;

pub use profile::{Profile, ProfileSnapshot};
pub use wire::{DecodeError, DecodedPing, EncodedPayload};
