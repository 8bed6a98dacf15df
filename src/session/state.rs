use serde::Serialize;
use tokio::sync::watch;

/// Observable aggregate the UI renders. Published on a watch channel so
/// subscribers always see the latest values without polling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub listening: bool,
    pub processing: bool,
    pub transcript: String,
    pub last_response: String,
}

/// Single writer for [`SessionSnapshot`]. The bridge owns `listening` and
/// `transcript`; the dispatcher owns `processing` and `last_response`.
#[derive(Clone)]
pub struct SessionState {
    tx: std::sync::Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn set_listening(&self, listening: bool) {
        self.tx.send_modify(|s| s.listening = listening);
    }

    pub fn set_processing(&self, processing: bool) {
        self.tx.send_modify(|s| s.processing = processing);
    }

    pub fn set_transcript(&self, transcript: String) {
        self.tx.send_modify(|s| s.transcript = transcript);
    }

    pub fn set_last_response(&self, last_response: String) {
        self.tx.send_modify(|s| s.last_response = last_response);
    }

    /// Reset the voice half of the snapshot on stop or unrecoverable error.
    /// `last_response` survives so the UI keeps showing the latest answer.
    pub fn reset_voice(&self) {
        self.tx.send_modify(|s| {
            s.listening = false;
            s.transcript.clear();
        });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
