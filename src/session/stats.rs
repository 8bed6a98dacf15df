use chrono::{DateTime, Utc};
use serde::Serialize;

/// Statistics about a voice session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Whether the session is currently listening
    pub listening: bool,

    /// When the session object was created
    pub started_at: DateTime<Utc>,

    /// Total lifetime in seconds
    pub duration_secs: f64,

    /// Audio chunks relayed to the transcription backend
    pub chunks_relayed: usize,

    /// Transcript events received (partial and final)
    pub transcripts_seen: usize,
}
