use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transcribe::ConnectOptions;

/// Configuration for one voice session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier.
    pub session_id: String,

    /// Delivery cadence for capture chunks.
    pub chunk_interval: Duration,

    /// Recognition options passed to the transcription backend.
    pub connect: ConnectOptions,

    /// Upper bound on one document-analysis request. The service may be
    /// slow (seconds); this is a backstop, not an expectation.
    pub analysis_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("voice-{}", uuid::Uuid::new_v4()),
            chunk_interval: Duration::from_millis(250),
            connect: ConnectOptions::default(),
            analysis_timeout: Duration::from_secs(60),
        }
    }
}
