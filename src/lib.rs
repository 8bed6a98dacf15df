pub mod bridge;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod session;
pub mod transcribe;

pub use bridge::{Bridge, BridgeState};
pub use capture::{
    AudioChunk, CaptureBackend, CaptureDevice, CaptureEvent, CaptureEventKind, CaptureState,
    SyntheticBackend,
};
pub use config::Config;
pub use dispatch::{
    AnalysisRequest, AnalysisResponse, DocumentAnalysis, DocumentContext, DocumentContextProvider,
    QueryDispatcher, SharedDocumentContext,
};
pub use error::VoiceError;
pub use events::{ListenerHandle, ListenerTable};
pub use session::{
    NotificationSink, SessionConfig, SessionSnapshot, SessionState, SessionStats, TracingNotifier,
    VoiceSession,
};
pub use transcribe::{
    ConnectOptions, ConnectionEvent, ConnectionEventKind, ConnectionState, Credential,
    CredentialProvider, LoopbackTransport, StaticCredentials, TranscriptionConnection,
    TranscriptionTransport, TransportSession,
};
