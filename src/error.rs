use thiserror::Error;

/// Error taxonomy for the voice session subsystem.
///
/// Each variant maps to a distinct user-facing failure class, so callers can
/// tell apart "re-grant microphone permission", "retry the question", and
/// "wait for the service".
#[derive(Debug, Clone, Error)]
pub enum VoiceError {
    /// Microphone permission denied or no capture hardware present.
    /// Fatal to the current session; the device handle is released.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Credential fetch failed or the transcription backend rejected the
    /// session during connect. The connection is left absent, not half-open.
    #[error("transcription connect rejected: {0}")]
    ConnectionAuthFailed(String),

    /// The transcription connection errored or closed mid-session.
    #[error("transcription connection dropped: {0}")]
    ConnectionDropped(String),

    /// Document analysis request failed. Local to the query; the audio
    /// pipeline is unaffected.
    #[error("document analysis failed: {0}")]
    AnalysisFailed(String),

    /// `send_message` was called with no active document selected.
    #[error("no active document")]
    NoActiveDocument,

    /// An operation was invoked in a state that does not permit it.
    /// This is a programming error, not a recoverable runtime condition.
    #[error("invalid state: {0}")]
    InvalidState(String),
}
