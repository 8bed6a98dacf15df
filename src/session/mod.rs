//! Voice session facade
//!
//! This module provides the `VoiceSession` abstraction that composes:
//! - The capture–transcription bridge (audio in, transcripts out)
//! - The query dispatcher (questions against the active document)
//! - The observable session snapshot the UI renders
//! - User-visible error surfacing through a notification sink

mod config;
mod notify;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use notify::{NotificationSink, TracingNotifier};
pub use session::VoiceSession;
pub use state::{SessionSnapshot, SessionState};
pub use stats::SessionStats;
