//! Streaming speech-recognition leaf.
//!
//! [`TranscriptionConnection`] maintains one session against a pluggable
//! [`TranscriptionTransport`], translating inbound audio into transcript
//! and error events for registered listeners.

pub mod connection;
pub mod loopback;
pub mod transport;

pub use connection::{AudioFeed, ConnectionState, TranscriptionConnection};
pub use loopback::{LoopbackTransport, StaticCredentials};
pub use transport::{
    ConnectOptions, ConnectionEvent, ConnectionEventKind, Credential, CredentialProvider,
    TranscriptionTransport, TransportSession,
};
