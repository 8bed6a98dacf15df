//! Capture–transcription bridge.
//!
//! The coordinator that sequences the two leaves, relays audio between
//! them, and guarantees clean teardown on every exit path.

mod bridge;
mod state;

pub use bridge::Bridge;
pub use state::BridgeState;
