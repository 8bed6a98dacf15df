use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::backend::{CaptureBackend, CaptureEvent, CaptureEventKind};
use crate::error::VoiceError;
use crate::events::{ListenerHandle, ListenerTable};

/// Lifecycle states of the capture device.
///
/// `Opening` and `Pausing` are transient: they resolve to `Open`/`Paused`
/// or `Error` before any new command is accepted (commands are `&mut self`,
/// so a transition always completes within the call that started it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    NotSetup,
    SettingUp,
    Ready,
    Opening,
    Open,
    Pausing,
    Paused,
    Error,
}

type CaptureListeners = ListenerTable<CaptureEventKind, CaptureEvent>;

/// Exclusive owner of one microphone input.
///
/// Wraps a [`CaptureBackend`] and enforces the state machine around it:
/// exactly one live stream handle at a time, every `start` matched by one
/// `stop`, pause gating without releasing the handle.
pub struct CaptureDevice {
    backend: Box<dyn CaptureBackend>,
    state: CaptureState,
    listeners: Arc<Mutex<CaptureListeners>>,
    paused: Arc<AtomicBool>,
    errored: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl CaptureDevice {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            state: CaptureState::NotSetup,
            listeners: Arc::new(Mutex::new(ListenerTable::new())),
            paused: Arc::new(AtomicBool::new(false)),
            errored: Arc::new(AtomicBool::new(false)),
            pump: None,
        }
    }

    /// Current state. Reports `Error` if the stream pump observed a
    /// device-level failure after the stream opened.
    pub fn state(&self) -> CaptureState {
        if self.errored.load(Ordering::SeqCst) {
            CaptureState::Error
        } else {
            self.state
        }
    }

    /// Acquire the microphone. Idempotent when already `Ready`.
    ///
    /// On failure the device lands in `Error` and the cause is returned to
    /// the caller, never swallowed. Recovery is a fresh `setup` call.
    pub async fn setup(&mut self) -> Result<(), VoiceError> {
        match self.state {
            CaptureState::Ready => return Ok(()),
            CaptureState::NotSetup | CaptureState::Error => {}
            other => {
                return Err(VoiceError::InvalidState(format!(
                    "setup called while capture device is {other:?}"
                )))
            }
        }

        self.state = CaptureState::SettingUp;
        self.errored.store(false, Ordering::SeqCst);

        match self.backend.acquire().await {
            Ok(()) => {
                info!("capture device ready ({})", self.backend.name());
                self.state = CaptureState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("capture device setup failed: {e}");
                self.state = CaptureState::Error;
                Err(e)
            }
        }
    }

    /// Open the audio stream and begin delivering chunks to registered
    /// listeners on the given cadence. Valid from `Ready` or `Paused`;
    /// starting from `Paused` is equivalent to `resume`.
    pub async fn start(&mut self, chunk_interval: Duration) -> Result<(), VoiceError> {
        match self.state {
            CaptureState::Paused => {
                self.paused.store(false, Ordering::SeqCst);
                self.state = CaptureState::Open;
                return Ok(());
            }
            CaptureState::Ready => {}
            other => {
                return Err(VoiceError::InvalidState(format!(
                    "start called while capture device is {other:?}"
                )))
            }
        }

        self.state = CaptureState::Opening;
        self.paused.store(false, Ordering::SeqCst);
        self.errored.store(false, Ordering::SeqCst);

        let mut stream_rx = match self.backend.open_stream(chunk_interval).await {
            Ok(rx) => rx,
            Err(e) => {
                error!("capture stream open failed: {e}");
                self.state = CaptureState::Error;
                return Err(e);
            }
        };

        let listeners = Arc::clone(&self.listeners);
        let paused = Arc::clone(&self.paused);
        let errored = Arc::clone(&self.errored);

        // Stream pump: fans backend events out to listeners. Ends when the
        // backend closes the stream channel.
        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = stream_rx.recv().await {
                match &event {
                    CaptureEvent::Chunk(_) => {
                        if paused.load(Ordering::SeqCst) {
                            continue;
                        }
                    }
                    CaptureEvent::Error { cause } => {
                        error!("capture device error: {cause}");
                        errored.store(true, Ordering::SeqCst);
                    }
                }
                let kind = event.kind();
                listeners.lock().await.dispatch(kind, event);
            }
        }));

        info!("capture stream open ({}ms cadence)", chunk_interval.as_millis());
        self.state = CaptureState::Open;
        Ok(())
    }

    /// Stop audio flow without releasing the device handle. Resume is cheap.
    pub fn pause(&mut self) -> Result<(), VoiceError> {
        if self.state != CaptureState::Open {
            return Err(VoiceError::InvalidState(format!(
                "pause called while capture device is {:?}",
                self.state
            )));
        }
        self.state = CaptureState::Pausing;
        self.paused.store(true, Ordering::SeqCst);
        self.state = CaptureState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), VoiceError> {
        if self.state != CaptureState::Paused {
            return Err(VoiceError::InvalidState(format!(
                "resume called while capture device is {:?}",
                self.state
            )));
        }
        self.paused.store(false, Ordering::SeqCst);
        self.state = CaptureState::Open;
        Ok(())
    }

    /// Release the stream handle unconditionally. Safe from any state and
    /// idempotent; waits for the stream pump to drain before returning.
    ///
    /// Lands in `Ready` when the device was acquired, `NotSetup` when it
    /// never was or when a device error invalidated the handle (recovery
    /// then requires a fresh `setup`).
    pub async fn stop(&mut self) {
        self.paused.store(false, Ordering::SeqCst);
        self.backend.close_stream().await;

        if let Some(pump) = self.pump.take() {
            // Stream channel is closed now; the pump drains and exits.
            if let Err(e) = pump.await {
                warn!("capture pump task panicked: {e}");
            }
        }

        let errored = self.errored.swap(false, Ordering::SeqCst);
        self.state = match self.state {
            CaptureState::NotSetup | CaptureState::SettingUp => CaptureState::NotSetup,
            CaptureState::Error => CaptureState::NotSetup,
            _ if errored => CaptureState::NotSetup,
            _ => CaptureState::Ready,
        };
    }

    /// Register a listener for `kind`. Registration happens-before the
    /// first event of that kind can be observed by the returned receiver.
    pub async fn add_listener(
        &self,
        kind: CaptureEventKind,
    ) -> (
        ListenerHandle<CaptureEventKind>,
        mpsc::UnboundedReceiver<CaptureEvent>,
    ) {
        self.listeners.lock().await.add(kind)
    }

    /// Deregister by exact handle; the listener's receiver closes.
    pub async fn remove_listener(&self, handle: ListenerHandle<CaptureEventKind>) {
        if !self.listeners.lock().await.remove(handle) {
            warn!("capture listener already removed");
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.lock().await.len()
    }
}
