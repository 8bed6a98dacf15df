use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::state::BridgeState;
use crate::capture::{CaptureDevice, CaptureEvent, CaptureEventKind};
use crate::error::VoiceError;
use crate::events::ListenerHandle;
use crate::session::SessionState;
use crate::transcribe::{
    AudioFeed, ConnectOptions, ConnectionEvent, ConnectionEventKind, ConnectionState,
    TranscriptionConnection,
};

/// The four subscriptions the bridge holds while a session is live.
/// Stored as exact handles so removal is precise across start/stop cycles.
struct RegisteredHandlers {
    conn_transcript: ListenerHandle<ConnectionEventKind>,
    conn_error: ListenerHandle<ConnectionEventKind>,
    device_data: ListenerHandle<CaptureEventKind>,
    device_error: ListenerHandle<CaptureEventKind>,
}

/// Relay counters, read by session stats.
#[derive(Debug, Default)]
pub struct RelayCounters {
    chunks_relayed: AtomicUsize,
    transcripts_seen: AtomicUsize,
}

struct BridgeInner {
    device: CaptureDevice,
    connection: TranscriptionConnection,
    state: BridgeState,
    // Bumped on every transition into Listening. Relay tasks carry the
    // generation that spawned them, so a relay that outlives its session
    // cannot tear down a successor.
    generation: u64,
    handlers: Option<RegisteredHandlers>,
    relay: Option<JoinHandle<()>>,
}

/// Capture–transcription coordinator.
///
/// Owns one [`CaptureDevice`] and one [`TranscriptionConnection`], relays
/// audio chunks from the former to the latter in arrival order, and
/// forwards transcript and error events into the observable session state.
///
/// All state transitions are serialized through one async mutex, so the
/// `Idle → Initializing → Listening → Stopping → Idle` machine is never
/// interleaved. Leaf errors are never retried here; every fatal condition
/// tears both leaves down and resets to `Idle`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Mutex<BridgeInner>>,
    session: SessionState,
    stop_requested: Arc<AtomicBool>,
    faults: mpsc::UnboundedSender<VoiceError>,
    counters: Arc<RelayCounters>,
    connect_options: ConnectOptions,
    chunk_interval: Duration,
}

impl Bridge {
    /// Build a bridge over its two leaves. Returns the fault receiver on
    /// which mid-session errors (connection drop, device failure) are
    /// reported after the automatic teardown has completed.
    pub fn new(
        device: CaptureDevice,
        connection: TranscriptionConnection,
        session: SessionState,
        connect_options: ConnectOptions,
        chunk_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<VoiceError>) {
        let (faults, fault_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            inner: Arc::new(Mutex::new(BridgeInner {
                device,
                connection,
                state: BridgeState::Idle,
                generation: 0,
                handlers: None,
                relay: None,
            })),
            session,
            stop_requested: Arc::new(AtomicBool::new(false)),
            faults,
            counters: Arc::new(RelayCounters::default()),
            connect_options,
            chunk_interval,
        };
        (bridge, fault_rx)
    }

    pub async fn state(&self) -> BridgeState {
        self.inner.lock().await.state
    }

    /// Total listeners currently registered on both leaves.
    pub async fn registered_listeners(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.device.listener_count().await + inner.connection.listener_count().await
    }

    pub fn chunks_relayed(&self) -> usize {
        self.counters.chunks_relayed.load(Ordering::Relaxed)
    }

    pub fn transcripts_seen(&self) -> usize {
        self.counters.transcripts_seen.load(Ordering::Relaxed)
    }

    /// Bring both leaves up, register handlers, and start relaying.
    ///
    /// A second call while a session is initializing or listening is an
    /// idempotent no-op. Setup failures run the same cleanup as a normal
    /// stop and leave the bridge `Idle`.
    pub async fn start_listening(&self) -> Result<(), VoiceError> {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_idle() {
            warn!("start_listening ignored: bridge is {:?}", inner.state);
            return Ok(());
        }

        inner.state = BridgeState::Initializing;
        info!("voice session initializing");

        // (a) capture device must be ready before anything else.
        if let Err(e) = inner.device.setup().await {
            return Err(self.fail_setup(&mut inner, e).await);
        }

        // (b) recognition session must be acknowledged open.
        if inner.connection.state() == ConnectionState::Closed {
            if let Err(e) = inner.connection.connect(&self.connect_options).await {
                return Err(self.fail_setup(&mut inner, e).await);
            }
        }

        // (c) both resources confirmed live: register exactly four handlers.
        // Registering any earlier could deliver events from a resource that
        // is about to be torn down.
        let (conn_transcript, transcript_rx) = inner
            .connection
            .add_listener(ConnectionEventKind::Transcript)
            .await;
        let (conn_error, conn_err_rx) = inner
            .connection
            .add_listener(ConnectionEventKind::Error)
            .await;
        let (device_data, data_rx) = inner.device.add_listener(CaptureEventKind::Data).await;
        let (device_error, dev_err_rx) = inner.device.add_listener(CaptureEventKind::Error).await;
        inner.handlers = Some(RegisteredHandlers {
            conn_transcript,
            conn_error,
            device_data,
            device_error,
        });

        let feed = match inner.connection.audio_feed() {
            Ok(feed) => feed,
            Err(e) => return Err(self.fail_setup(&mut inner, e).await),
        };

        if let Err(e) = inner.device.start(self.chunk_interval).await {
            return Err(self.fail_setup(&mut inner, e).await);
        }

        // A stop that arrived while setup was in flight wins here, before
        // `listening` is ever published to subscribers.
        if self.stop_requested.swap(false, Ordering::SeqCst) {
            info!("stop requested during setup; unwinding");
            inner.state = BridgeState::Stopping;
            Self::teardown(&mut inner).await;
            inner.state = BridgeState::Idle;
            self.session.reset_voice();
            return Ok(());
        }

        inner.state = BridgeState::Listening;
        inner.generation += 1;
        self.session.set_listening(true);

        let bridge = self.clone();
        inner.relay = Some(tokio::spawn(relay_loop(
            bridge,
            inner.generation,
            data_rx,
            dev_err_rx,
            transcript_rx,
            conn_err_rx,
            feed,
        )));

        info!("voice session listening");
        Ok(())
    }

    /// Stop the session and release both leaves. Safe and silent when the
    /// bridge is already `Idle`. A stop issued while setup is still in
    /// flight is latched and applied the moment setup resolves.
    pub async fn stop_listening(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        self.stop_requested.store(false, Ordering::SeqCst);

        if inner.state.is_idle() {
            return;
        }

        info!("voice session stopping");
        inner.state = BridgeState::Stopping;
        Self::teardown(&mut inner).await;
        inner.state = BridgeState::Idle;
        self.session.reset_voice();
        info!("voice session idle");
    }

    /// Gate audio flow without releasing the device handle.
    pub async fn pause(&self) -> Result<(), VoiceError> {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_listening() {
            return Err(VoiceError::InvalidState(format!(
                "pause called while bridge is {:?}",
                inner.state
            )));
        }
        inner.device.pause()
    }

    pub async fn resume(&self) -> Result<(), VoiceError> {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_listening() {
            return Err(VoiceError::InvalidState(format!(
                "resume called while bridge is {:?}",
                inner.state
            )));
        }
        inner.device.resume()
    }

    /// Setup failure during `Initializing`: absorb into `Errored`, run the
    /// same handler-cleanup-then-teardown sequence as `Stopping`, reset to
    /// `Idle`, and hand the error back to the caller.
    async fn fail_setup(&self, inner: &mut BridgeInner, e: VoiceError) -> VoiceError {
        error!("voice session setup failed: {e}");
        inner.state = BridgeState::Errored;
        Self::teardown(inner).await;
        inner.state = BridgeState::Idle;
        self.stop_requested.store(false, Ordering::SeqCst);
        self.session.reset_voice();
        e
    }

    /// Fatal leaf event observed by the relay mid-session. `generation`
    /// identifies the session the relay belongs to: an event buffered by a
    /// relay whose session was already stopped must not touch the session
    /// that replaced it.
    async fn fail_from_relay(&self, generation: u64, e: VoiceError) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_listening() || inner.generation != generation {
            // A stop or another failure already won the race.
            return;
        }
        error!("voice session error: {e}");
        inner.state = BridgeState::Errored;
        Self::teardown(&mut inner).await;
        inner.state = BridgeState::Idle;
        self.session.reset_voice();
        let _ = self.faults.send(e);
    }

    /// Handler deregistration happens-before leaf teardown, in reverse
    /// registration order, so no event can fire into a handler that expects
    /// the session to still be alive. Leaf teardown is unconditional: a
    /// failed leaf must not wedge the other.
    async fn teardown(inner: &mut BridgeInner) {
        if let Some(handlers) = inner.handlers.take() {
            inner.device.remove_listener(handlers.device_error).await;
            inner.device.remove_listener(handlers.device_data).await;
            inner.connection.remove_listener(handlers.conn_error).await;
            inner
                .connection
                .remove_listener(handlers.conn_transcript)
                .await;
        }
        inner.device.stop().await;
        inner.connection.finish().await;
        // Removing the handlers closed the relay's receivers; the task
        // drains and exits on its own.
        inner.relay.take();
    }
}

/// Forwards chunks device → connection and events connection → session
/// state. Runs until a teardown closes its subscriptions or a fatal leaf
/// event makes it trigger the teardown itself.
async fn relay_loop(
    bridge: Bridge,
    generation: u64,
    mut data_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    mut dev_err_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    mut transcript_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    mut conn_err_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    feed: AudioFeed,
) {
    loop {
        tokio::select! {
            event = data_rx.recv() => match event {
                Some(CaptureEvent::Chunk(chunk)) => {
                    if let Err(e) = feed.send(chunk).await {
                        let e = match e {
                            VoiceError::ConnectionDropped(_) => e,
                            _ => VoiceError::ConnectionDropped(
                                "connection closed while relaying audio".into(),
                            ),
                        };
                        bridge.fail_from_relay(generation, e).await;
                        break;
                    }
                    bridge.counters.chunks_relayed.fetch_add(1, Ordering::Relaxed);
                }
                Some(CaptureEvent::Error { .. }) => {} // arrives on the error subscription
                None => break,
            },
            event = dev_err_rx.recv() => match event {
                Some(CaptureEvent::Error { cause }) => {
                    bridge
                        .fail_from_relay(generation, VoiceError::DeviceUnavailable(cause))
                        .await;
                    break;
                }
                Some(CaptureEvent::Chunk(_)) => {}
                None => break,
            },
            event = transcript_rx.recv() => match event {
                Some(ConnectionEvent::Transcript { text, is_final }) => {
                    bridge.counters.transcripts_seen.fetch_add(1, Ordering::Relaxed);
                    bridge.session.set_transcript(text);
                    if is_final {
                        // Listening is user-controlled, not utterance-controlled:
                        // a final transcript does not stop the session.
                        debug!("utterance complete; still listening");
                    }
                }
                Some(_) => {}
                None => break,
            },
            event = conn_err_rx.recv() => match event {
                Some(ConnectionEvent::Error { cause }) => {
                    bridge
                        .fail_from_relay(generation, VoiceError::ConnectionDropped(cause))
                        .await;
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }
    debug!("relay task stopped");
}
