//! Microphone capture leaf.
//!
//! [`CaptureDevice`] owns exclusive access to one audio input and enforces
//! the `NotSetup → SettingUp → Ready → Opening/Open ⇄ Pausing/Paused`
//! lifecycle around a pluggable [`CaptureBackend`].

pub mod backend;
pub mod device;
pub mod synthetic;

pub use backend::{AudioChunk, CaptureBackend, CaptureEvent, CaptureEventKind};
pub use device::{CaptureDevice, CaptureState};
pub use synthetic::SyntheticBackend;
