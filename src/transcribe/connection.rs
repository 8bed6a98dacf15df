use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::transport::{
    ConnectOptions, ConnectionEvent, ConnectionEventKind, CredentialProvider,
    TranscriptionTransport,
};
use crate::capture::AudioChunk;
use crate::error::VoiceError;
use crate::events::{ListenerHandle, ListenerTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

type ConnectionListeners = ListenerTable<ConnectionEventKind, ConnectionEvent>;

/// One streaming recognition session against a [`TranscriptionTransport`].
///
/// Holds the outbound audio half and fans inbound transport events out to
/// registered listeners. A fresh credential is fetched on every `connect`;
/// a rejected connect leaves the connection `Closed` with no session handle
/// behind, never half-open.
pub struct TranscriptionConnection {
    transport: Arc<dyn TranscriptionTransport>,
    credentials: Arc<dyn CredentialProvider>,
    listeners: Arc<Mutex<ConnectionListeners>>,
    open: Arc<AtomicBool>,
    audio_tx: Option<mpsc::Sender<AudioChunk>>,
    fanout: Option<JoinHandle<()>>,
}

impl TranscriptionConnection {
    pub fn new(
        transport: Arc<dyn TranscriptionTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            credentials,
            listeners: Arc::new(Mutex::new(ListenerTable::new())),
            open: Arc::new(AtomicBool::new(false)),
            audio_tx: None,
            fanout: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.open.load(Ordering::SeqCst) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Open the session. Resolves `Open` only after the backend acknowledges.
    /// No-op when already open.
    pub async fn connect(&mut self, options: &ConnectOptions) -> Result<(), VoiceError> {
        if self.state() == ConnectionState::Open {
            warn!("connect ignored: connection already open");
            return Ok(());
        }

        // Credentials are per-session; never reuse one across connects.
        let credential = self
            .credentials
            .transcription_credential()
            .await
            .map_err(auth_failure)?;

        let session = self
            .transport
            .open(credential, options)
            .await
            .map_err(auth_failure)?;

        self.audio_tx = Some(session.audio_tx);
        self.open.store(true, Ordering::SeqCst);

        let listeners = Arc::clone(&self.listeners);
        let open = Arc::clone(&self.open);
        let mut events = session.events;

        // Fan-out: dispatches transport events to listeners until the
        // backend ends the stream.
        self.fanout = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match &event {
                    ConnectionEvent::Close | ConnectionEvent::Error { .. } => {
                        open.store(false, Ordering::SeqCst);
                    }
                    _ => {}
                }
                listeners.lock().await.dispatch(event.kind(), event);
            }
            // Stream ended without an explicit close frame.
            if open.swap(false, Ordering::SeqCst) {
                listeners
                    .lock()
                    .await
                    .dispatch(ConnectionEventKind::Close, ConnectionEvent::Close);
            }
        }));

        info!(
            "transcription connection open (lang={}, model={})",
            options.language, options.model
        );
        self.listeners
            .lock()
            .await
            .dispatch(ConnectionEventKind::Open, ConnectionEvent::Open);
        Ok(())
    }

    /// Forward one chunk to the backend. Fire-and-forget, valid only while
    /// `Open`; sending on a closed connection is a programming error.
    pub async fn send(&self, chunk: AudioChunk) -> Result<(), VoiceError> {
        if self.state() != ConnectionState::Open {
            return Err(VoiceError::InvalidState(
                "send on closed transcription connection".into(),
            ));
        }
        let tx = self.audio_tx.as_ref().ok_or_else(|| {
            VoiceError::InvalidState("send on closed transcription connection".into())
        })?;
        tx.send(chunk)
            .await
            .map_err(|_| VoiceError::ConnectionDropped("transcription backend went away".into()))
    }

    /// Detached outbound-audio handle for relay tasks, valid while the
    /// connection stays open. Only obtainable after `connect` resolves.
    pub fn audio_feed(&self) -> Result<AudioFeed, VoiceError> {
        if self.state() != ConnectionState::Open {
            return Err(VoiceError::InvalidState(
                "audio feed requested on closed connection".into(),
            ));
        }
        let tx = self.audio_tx.as_ref().ok_or_else(|| {
            VoiceError::InvalidState("audio feed requested on closed connection".into())
        })?;
        Ok(AudioFeed {
            tx: tx.clone(),
            open: Arc::clone(&self.open),
        })
    }

    /// Request an orderly close. Buffered outbound audio is discarded; the
    /// backend does not guarantee draining before close.
    pub async fn finish(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        // Dropping the sender signals the transport to close the session.
        self.audio_tx = None;
        if let Some(fanout) = self.fanout.take() {
            fanout.abort();
            let _ = fanout.await;
        }
        info!("transcription connection closed");
    }

    /// Register a listener for `kind`. Listeners are additive.
    pub async fn add_listener(
        &self,
        kind: ConnectionEventKind,
    ) -> (
        ListenerHandle<ConnectionEventKind>,
        mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        self.listeners.lock().await.add(kind)
    }

    /// Deregister by exact handle.
    pub async fn remove_listener(&self, handle: ListenerHandle<ConnectionEventKind>) {
        if !self.listeners.lock().await.remove(handle) {
            warn!("connection listener already removed");
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.lock().await.len()
    }
}

/// Cloneable outbound-audio handle. Checks connection liveness on every
/// send so a relay never writes into a torn-down session.
#[derive(Clone)]
pub struct AudioFeed {
    tx: mpsc::Sender<AudioChunk>,
    open: Arc<AtomicBool>,
}

impl AudioFeed {
    pub async fn send(&self, chunk: AudioChunk) -> Result<(), VoiceError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(VoiceError::InvalidState(
                "send on closed transcription connection".into(),
            ));
        }
        self.tx
            .send(chunk)
            .await
            .map_err(|_| VoiceError::ConnectionDropped("transcription backend went away".into()))
    }
}

fn auth_failure(e: VoiceError) -> VoiceError {
    match e {
        VoiceError::ConnectionAuthFailed(_) => e,
        other => VoiceError::ConnectionAuthFailed(other.to_string()),
    }
}
