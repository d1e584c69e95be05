//! Bluem integration test harness.
//!
//! Several nodes share an in-process "air": every advertisement one node
//! transmits is delivered to the scan queue of every other node, the way
//! beacons in radio range hear each other. Each node runs the real
//! advertiser, scan worker and sweeper on tokio's paused clock.
//!
//!   cargo test --test integration

mod infra;

mod discovery;
mod liveness;
mod naming;
mod throttling;

pub use infra::*;
