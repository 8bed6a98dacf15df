use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::VoiceError;

/// One discrete unit of captured audio, handed from the capture device to
/// the transcription connection. Ownership moves downstream; nobody retains
/// a chunk after forwarding it.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw encoded audio bytes, opaque to this subsystem.
    pub bytes: Vec<u8>,
    /// Milliseconds since the capture stream opened.
    pub timestamp_ms: u64,
}

/// Event kinds a consumer can subscribe to on the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureEventKind {
    /// Audio chunk delivery.
    Data,
    /// Device-level failure (permission revoked mid-stream, hardware gone).
    Error,
}

/// Events emitted by the capture device, decoded once at the boundary.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Chunk(AudioChunk),
    Error { cause: String },
}

impl CaptureEvent {
    pub fn kind(&self) -> CaptureEventKind {
        match self {
            CaptureEvent::Chunk(_) => CaptureEventKind::Data,
            CaptureEvent::Error { .. } => CaptureEventKind::Error,
        }
    }
}

/// Microphone access backend trait.
///
/// Platform implementations wrap the operating system's capture API; the
/// synthetic implementation drives demos and tests without hardware.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire the underlying device (permission prompt, hardware probe).
    /// Must not open an audio stream yet.
    async fn acquire(&mut self) -> Result<(), VoiceError>;

    /// Open the audio stream and start delivering events on the returned
    /// channel at roughly `chunk_interval` cadence. Valid only after a
    /// successful `acquire`. The channel closes when the stream closes.
    async fn open_stream(
        &mut self,
        chunk_interval: Duration,
    ) -> Result<mpsc::Receiver<CaptureEvent>, VoiceError>;

    /// Close the audio stream and release the live handle. Must be safe to
    /// call when no stream is open.
    async fn close_stream(&mut self);

    /// Backend name for logging.
    fn name(&self) -> &str;
}
