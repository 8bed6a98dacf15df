use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioChunk, CaptureBackend, CaptureEvent};
use crate::error::VoiceError;

/// Timer-driven capture backend producing silence chunks on the requested
/// cadence. Lets demos and integration tests exercise the full pipeline
/// without microphone hardware or OS permissions.
pub struct SyntheticBackend {
    /// Size of each emitted chunk in bytes.
    chunk_bytes: usize,
    acquired: bool,
    running: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes,
            acquired: false,
            running: Arc::new(AtomicBool::new(false)),
            ticker: None,
        }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        // 100ms of 16kHz mono s16le
        Self::new(3200)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn acquire(&mut self) -> Result<(), VoiceError> {
        self.acquired = true;
        Ok(())
    }

    async fn open_stream(
        &mut self,
        chunk_interval: Duration,
    ) -> Result<mpsc::Receiver<CaptureEvent>, VoiceError> {
        if !self.acquired {
            return Err(VoiceError::DeviceUnavailable(
                "synthetic backend not acquired".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let chunk_bytes = self.chunk_bytes;
        self.ticker = Some(tokio::spawn(async move {
            let mut elapsed_ms = 0u64;
            let mut ticker = tokio::time::interval(chunk_interval);
            ticker.tick().await; // first tick fires immediately; skip it

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                elapsed_ms += chunk_interval.as_millis() as u64;
                let chunk = AudioChunk {
                    bytes: vec![0u8; chunk_bytes],
                    timestamp_ms: elapsed_ms,
                };
                if tx.send(CaptureEvent::Chunk(chunk)).await.is_err() {
                    break;
                }
            }
        }));

        info!("synthetic capture stream open");
        Ok(rx)
    }

    async fn close_stream(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            // Waking the ticker is not worth a channel; just cancel it.
            ticker.abort();
            let _ = ticker.await;
        }
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
