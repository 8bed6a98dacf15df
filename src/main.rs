use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use voxquery::{
    AnalysisRequest, AnalysisResponse, Config, DocumentAnalysis, LoopbackTransport, SessionConfig,
    SharedDocumentContext, StaticCredentials, SyntheticBackend, TracingNotifier, VoiceError,
    VoiceSession,
};

/// Canned analysis collaborator so the demo runs without a real service.
struct DemoAnalysis;

#[async_trait::async_trait]
impl DocumentAnalysis for DemoAnalysis {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, VoiceError> {
        Ok(AnalysisResponse {
            summary: format!(
                "Answer about document {}: \"{}\" refers to section 4.2.",
                request.document_id, request.question
            ),
            annotations: None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let session_config = match Config::load("config/voxquery") {
        Ok(cfg) => {
            info!("loaded config: {}", cfg.service.name);
            cfg.session_config()
        }
        Err(_) => {
            info!("no config file found, using defaults");
            SessionConfig::default()
        }
    };

    let context = SharedDocumentContext::new();
    context.set_document(Some("contract-42".to_string()));

    let session = VoiceSession::new(
        session_config,
        Box::new(SyntheticBackend::default()),
        Arc::new(LoopbackTransport::default()),
        Arc::new(StaticCredentials::new("demo-token")),
        Arc::new(DemoAnalysis),
        context,
        Arc::new(TracingNotifier),
    );

    info!("voxquery demo session: {}", session.session_id());

    // Listen for a couple of seconds against the loopback recognizer.
    session.start_listening().await?;
    let mut snapshots = session.subscribe();
    let listen = async {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow().clone();
            if !snapshot.transcript.is_empty() {
                info!("transcript: {}", snapshot.transcript);
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(3), listen).await;
    session.stop_listening().await;

    // Ask the captured question through the dispatcher.
    session.send_message("what does the termination clause say").await?;
    info!("response: {}", session.last_response());

    let stats = session.stats();
    info!(
        "session complete: {} chunks relayed, {} transcripts",
        stats.chunks_relayed, stats.transcripts_seen
    );

    session.shutdown().await;
    Ok(())
}
