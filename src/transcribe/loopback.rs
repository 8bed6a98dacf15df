use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::info;

use super::transport::{
    ConnectOptions, ConnectionEvent, Credential, CredentialProvider, TranscriptionTransport,
    TransportSession,
};
use crate::error::VoiceError;

/// In-process transport that "recognizes" a canned script: after every
/// `chunks_per_utterance` audio chunks it emits one partial and one final
/// transcript, cycling through the script. Lets the demo binary and
/// integration tests run the full pipeline without a vendor account.
pub struct LoopbackTransport {
    chunks_per_utterance: usize,
    script: Vec<String>,
}

impl LoopbackTransport {
    pub fn new(chunks_per_utterance: usize, script: Vec<String>) -> Self {
        Self {
            chunks_per_utterance: chunks_per_utterance.max(1),
            script,
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(
            5,
            vec![
                "what does the termination clause say".to_string(),
                "summarize the payment terms".to_string(),
            ],
        )
    }
}

#[async_trait::async_trait]
impl TranscriptionTransport for LoopbackTransport {
    async fn open(
        &self,
        _credential: Credential,
        options: &ConnectOptions,
    ) -> Result<TransportSession, VoiceError> {
        let (audio_tx, mut audio_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let chunks_per_utterance = self.chunks_per_utterance;
        let script = self.script.clone();
        let interim = options.interim_results;

        tokio::spawn(async move {
            let mut chunk_count = 0usize;
            let mut utterance = 0usize;

            while let Some(_chunk) = audio_rx.recv().await {
                chunk_count += 1;
                if chunk_count % chunks_per_utterance != 0 || script.is_empty() {
                    continue;
                }

                let text = script[utterance % script.len()].clone();
                utterance += 1;

                if interim {
                    let cut = text
                        .char_indices()
                        .nth(text.chars().count() / 2)
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    let partial = text[..cut].to_string();
                    if event_tx
                        .send(ConnectionEvent::Transcript {
                            text: partial,
                            is_final: false,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
                if event_tx
                    .send(ConnectionEvent::Transcript {
                        text,
                        is_final: true,
                    })
                    .is_err()
                {
                    return;
                }
            }

            // Outbound half dropped: the caller requested close.
            let _ = event_tx.send(ConnectionEvent::Close);
        });

        info!("loopback transcription session open");

        let events = futures::stream::unfold(event_rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed();

        Ok(TransportSession { audio_tx, events })
    }
}

/// Credential provider backed by a fixed token. Demo/test collaborator.
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticCredentials {
    async fn transcription_credential(&self) -> Result<Credential, VoiceError> {
        Ok(Credential(self.token.clone()))
    }
}
