use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::config::SessionConfig;
use super::notify::NotificationSink;
use super::state::{SessionSnapshot, SessionState};
use super::stats::SessionStats;
use crate::bridge::Bridge;
use crate::capture::{CaptureBackend, CaptureDevice};
use crate::dispatch::{DocumentAnalysis, DocumentContextProvider, QueryDispatcher};
use crate::error::VoiceError;
use crate::transcribe::{CredentialProvider, TranscriptionConnection, TranscriptionTransport};

/// The one object the UI touches.
///
/// Composes the capture–transcription bridge and the query dispatcher into
/// `start_listening` / `stop_listening` / `send_message`, plus the
/// observable [`SessionSnapshot`]. Every error that reaches the user goes
/// through the [`NotificationSink`] with a failure-class-specific message.
pub struct VoiceSession {
    config: SessionConfig,
    started_at: chrono::DateTime<Utc>,
    state: SessionState,
    bridge: Bridge,
    dispatcher: QueryDispatcher,
    notifier: Arc<dyn NotificationSink>,
    fault_task: JoinHandle<()>,
    closed: AtomicBool,
}

impl VoiceSession {
    /// Build a session over its collaborators. The leaves are constructed
    /// and owned here; no ambient or global state is consulted.
    ///
    /// Must be called within a tokio runtime: a background task is spawned
    /// to surface mid-session faults through the notification sink.
    pub fn new(
        config: SessionConfig,
        capture: Box<dyn CaptureBackend>,
        transport: Arc<dyn TranscriptionTransport>,
        credentials: Arc<dyn CredentialProvider>,
        analysis: Arc<dyn DocumentAnalysis>,
        context: Arc<dyn DocumentContextProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        info!("creating voice session: {}", config.session_id);

        let state = SessionState::new();
        let device = CaptureDevice::new(capture);
        let connection = TranscriptionConnection::new(transport, credentials);

        let (bridge, mut faults) = Bridge::new(
            device,
            connection,
            state.clone(),
            config.connect.clone(),
            config.chunk_interval,
        );

        let dispatcher =
            QueryDispatcher::new(analysis, context, state.clone(), config.analysis_timeout);

        let fault_notifier = Arc::clone(&notifier);
        let fault_task = tokio::spawn(async move {
            while let Some(err) = faults.recv().await {
                fault_notifier.notify_error(&user_message(&err));
            }
        });

        Self {
            config,
            started_at: Utc::now(),
            state,
            bridge,
            dispatcher,
            notifier,
            fault_task,
            closed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Begin a listening session. Idempotent while one is already starting
    /// or running.
    pub async fn start_listening(&self) -> Result<(), VoiceError> {
        match self.bridge.start_listening().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.notifier.notify_error(&user_message(&e));
                Err(e)
            }
        }
    }

    /// Stop listening and release both leaves. Safe when already idle.
    pub async fn stop_listening(&self) {
        self.bridge.stop_listening().await;
    }

    /// Gate audio flow without tearing the session down (push-to-talk).
    pub async fn pause(&self) -> Result<(), VoiceError> {
        self.bridge.pause().await
    }

    pub async fn resume(&self) -> Result<(), VoiceError> {
        self.bridge.resume().await
    }

    /// Ask a question about the active document. Voice and typed input take
    /// the same path; a failure here never disturbs the audio pipeline.
    pub async fn send_message(&self, text: &str) -> Result<(), VoiceError> {
        match self.dispatcher.send_message(text).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.notifier.notify_error(&user_message(&e));
                Err(e)
            }
        }
    }

    /// Watch the observable session fields.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn is_listening(&self) -> bool {
        self.state.snapshot().listening
    }

    pub fn is_processing(&self) -> bool {
        self.state.snapshot().processing
    }

    pub fn transcript(&self) -> String {
        self.state.snapshot().transcript
    }

    pub fn last_response(&self) -> String {
        self.state.snapshot().last_response
    }

    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionStats {
            session_id: self.config.session_id.clone(),
            listening: self.is_listening(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            chunks_relayed: self.bridge.chunks_relayed(),
            transcripts_seen: self.bridge.transcripts_seen(),
        }
    }

    /// Top-level cleanup contract: runs the bridge stop sequence exactly
    /// once, regardless of session state. Safe to call when already idle,
    /// and a no-op on repeated calls.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down voice session: {}", self.config.session_id);
        self.bridge.stop_listening().await;
        self.fault_task.abort();
    }
}

/// Distinct, specific messages per failure class, so the user knows whether
/// to re-grant microphone permission, retry the question, or wait.
fn user_message(e: &VoiceError) -> String {
    match e {
        VoiceError::DeviceUnavailable(_) => {
            "Microphone unavailable. Check the permission and try again.".to_string()
        }
        VoiceError::ConnectionAuthFailed(_) => {
            "Could not start live transcription. Please try again later.".to_string()
        }
        VoiceError::ConnectionDropped(_) => {
            "Live transcription connection lost. Listening stopped.".to_string()
        }
        VoiceError::AnalysisFailed(_) => {
            "Could not analyze the document. Please retry your question.".to_string()
        }
        VoiceError::NoActiveDocument => "Open a document before asking a question.".to_string(),
        VoiceError::InvalidState(_) => "The voice session is busy. Try again.".to_string(),
    }
}
