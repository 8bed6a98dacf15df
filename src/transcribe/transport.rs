use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::capture::AudioChunk;
use crate::error::VoiceError;

/// Enumerated configuration for a streaming recognition session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// BCP-47 language tag, e.g. "en-US".
    pub language: String,
    /// Backend model identifier.
    pub model: String,
    /// Insert punctuation into transcripts.
    pub punctuate: bool,
    /// Emit partial (non-final) transcript events.
    pub interim_results: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            model: "general".to_string(),
            punctuate: true,
            interim_results: true,
        }
    }
}

/// Short-lived token authorizing one streaming session. Fetched fresh on
/// every connect; never cached across sessions.
#[derive(Debug, Clone)]
pub struct Credential(pub String);

/// External authentication collaborator.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn transcription_credential(&self) -> Result<Credential, VoiceError>;
}

/// Event kinds a consumer can subscribe to on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEventKind {
    Open,
    Close,
    Error,
    Transcript,
}

/// Events emitted by the transcription connection, decoded once at the
/// boundary so internal code never re-inspects raw vendor payloads.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Open,
    Close,
    Error { cause: String },
    /// Partial (`is_final == false`) events may precede one final event for
    /// the same utterance; each final event starts a new utterance.
    Transcript { text: String, is_final: bool },
}

impl ConnectionEvent {
    pub fn kind(&self) -> ConnectionEventKind {
        match self {
            ConnectionEvent::Open => ConnectionEventKind::Open,
            ConnectionEvent::Close => ConnectionEventKind::Close,
            ConnectionEvent::Error { .. } => ConnectionEventKind::Error,
            ConnectionEvent::Transcript { .. } => ConnectionEventKind::Transcript,
        }
    }
}

/// Live wire handles for one acknowledged recognition session.
pub struct TransportSession {
    /// Outbound audio. Fire-and-forget; dropping the sender requests close.
    pub audio_tx: mpsc::Sender<AudioChunk>,
    /// Inbound events. The stream ends when the backend closes the session.
    pub events: BoxStream<'static, ConnectionEvent>,
}

/// Vendor boundary for streaming speech recognition.
#[async_trait::async_trait]
pub trait TranscriptionTransport: Send + Sync {
    /// Open a session. Resolves only after the backend acknowledges it; a
    /// rejection must leave nothing half-open behind.
    async fn open(
        &self,
        credential: Credential,
        options: &ConnectOptions,
    ) -> Result<TransportSession, VoiceError>;
}
