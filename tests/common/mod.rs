// Shared mock collaborators for the integration tests.
//
// Everything here is scripted and observable: backends record how often
// they were acquired/closed, transports record every chunk they were sent,
// and event taps let tests inject mid-session transcript/error events.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voxquery::{
    AnalysisRequest, AnalysisResponse, AudioChunk, CaptureBackend, CaptureEvent, ConnectOptions,
    ConnectionEvent, Credential, CredentialProvider, DocumentAnalysis, NotificationSink,
    TranscriptionTransport, TransportSession, VoiceError,
};

/// Capture backend fed by test-side channels, one per start/stop cycle.
pub struct ScriptedBackend {
    pub fail_acquire: bool,
    pub acquire_delay: Duration,
    pub acquires: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    sources: VecDeque<mpsc::Receiver<CaptureEvent>>,
    forwarder: Option<JoinHandle<()>>,
}

impl ScriptedBackend {
    /// Backend good for `cycles` open/close cycles. The returned senders
    /// feed the capture stream of each cycle in order.
    pub fn with_cycles(cycles: usize) -> (Self, Vec<mpsc::Sender<CaptureEvent>>) {
        let mut sources = VecDeque::new();
        let mut feeds = Vec::new();
        for _ in 0..cycles {
            let (tx, rx) = mpsc::channel(64);
            feeds.push(tx);
            sources.push_back(rx);
        }
        (
            Self {
                fail_acquire: false,
                acquire_delay: Duration::ZERO,
                acquires: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
                sources,
                forwarder: None,
            },
            feeds,
        )
    }

    pub fn single() -> (Self, mpsc::Sender<CaptureEvent>) {
        let (backend, mut feeds) = Self::with_cycles(1);
        (backend, feeds.remove(0))
    }

    pub fn failing() -> Self {
        let (mut backend, _) = Self::with_cycles(0);
        backend.fail_acquire = true;
        backend
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn acquire(&mut self) -> Result<(), VoiceError> {
        tokio::time::sleep(self.acquire_delay).await;
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire {
            return Err(VoiceError::DeviceUnavailable("permission denied".into()));
        }
        Ok(())
    }

    async fn open_stream(
        &mut self,
        _chunk_interval: Duration,
    ) -> Result<mpsc::Receiver<CaptureEvent>, VoiceError> {
        let mut source = self.sources.pop_front().ok_or_else(|| {
            VoiceError::DeviceUnavailable("scripted backend out of cycles".into())
        })?;
        let (tx, rx) = mpsc::channel(64);
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = source.recv().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }));
        Ok(rx)
    }

    async fn close_stream(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(forwarder) = self.forwarder.take() {
            // Dropping the forwarder's sender closes the stream channel.
            forwarder.abort();
            let _ = forwarder.await;
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Transport that records every chunk sent to it and exposes a per-session
/// event tap for injecting transcript/error events.
pub struct RecordingTransport {
    pub fail_open: bool,
    pub open_delay: Duration,
    pub opens: Arc<AtomicUsize>,
    pub sent: Arc<Mutex<Vec<AudioChunk>>>,
    pub event_taps: Arc<Mutex<Vec<mpsc::UnboundedSender<ConnectionEvent>>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            fail_open: false,
            open_delay: Duration::ZERO,
            opens: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
            event_taps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rejecting() -> Self {
        let mut transport = Self::new();
        transport.fail_open = true;
        transport
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Event injector for the most recently opened session.
    pub fn latest_tap(&self) -> mpsc::UnboundedSender<ConnectionEvent> {
        self.event_taps.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TranscriptionTransport for RecordingTransport {
    async fn open(
        &self,
        _credential: Credential,
        _options: &ConnectOptions,
    ) -> Result<TransportSession, VoiceError> {
        tokio::time::sleep(self.open_delay).await;
        if self.fail_open {
            return Err(VoiceError::ConnectionAuthFailed(
                "backend rejected session".into(),
            ));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        let (audio_tx, mut audio_rx) = mpsc::channel(64);
        let sent = Arc::clone(&self.sent);
        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                sent.lock().unwrap().push(chunk);
            }
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.event_taps.lock().unwrap().push(event_tx);
        let events = futures::stream::unfold(event_rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed();

        Ok(TransportSession { audio_tx, events })
    }
}

/// Credential provider that counts fetches; optionally failing.
pub struct CountingCredentials {
    pub fail: bool,
    pub fetched: Arc<AtomicUsize>,
}

impl CountingCredentials {
    pub fn new() -> Self {
        Self {
            fail: false,
            fetched: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        let mut credentials = Self::new();
        credentials.fail = true;
        credentials
    }
}

#[async_trait::async_trait]
impl CredentialProvider for CountingCredentials {
    async fn transcription_credential(&self) -> Result<Credential, VoiceError> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::ConnectionAuthFailed(
                "credential fetch failed".into(),
            ));
        }
        Ok(Credential("test-token".into()))
    }
}

/// Analysis stub with scripted latency/failure; records every request.
pub struct StubAnalysis {
    pub fail: bool,
    pub delay: Duration,
    pub requests: Arc<Mutex<Vec<AnalysisRequest>>>,
}

impl StubAnalysis {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        let mut analysis = Self::new();
        analysis.fail = true;
        analysis
    }

    pub fn slow(delay: Duration) -> Self {
        let mut analysis = Self::new();
        analysis.delay = delay;
        analysis
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DocumentAnalysis for StubAnalysis {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, VoiceError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(VoiceError::AnalysisFailed("server error".into()));
        }
        Ok(AnalysisResponse {
            summary: format!("summary: {}", request.question),
            annotations: None,
        })
    }
}

/// Notification sink that collects messages for assertions.
#[derive(Default)]
pub struct CollectingNotifier {
    pub errors: Arc<Mutex<Vec<String>>>,
    pub infos: Arc<Mutex<Vec<String>>>,
}

impl CollectingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn notify_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }
}

/// Convenience chunk constructor.
pub fn chunk(byte: u8, len: usize, timestamp_ms: u64) -> AudioChunk {
    AudioChunk {
        bytes: vec![byte; len],
        timestamp_ms,
    }
}
