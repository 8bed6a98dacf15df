//! Query dispatch against the document-analysis collaborator.
//!
//! Independent of the audio pipeline: a failed query never disturbs the
//! capture or transcription state, and vice versa.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::VoiceError;
use crate::session::SessionState;

/// The request crossing the boundary to the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub document_id: String,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_section_id: Option<String>,
}

/// Free-text summary plus optional structured annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

/// Currently active document and highlight, read fresh at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    pub document_id: Option<String>,
    pub highlighted_section_id: Option<String>,
}

/// Read-only view of what the user is looking at right now.
pub trait DocumentContextProvider: Send + Sync {
    fn current(&self) -> DocumentContext;
}

/// External document-analysis collaborator. May be slow (seconds); callers
/// treat every request as long-running.
#[async_trait::async_trait]
pub trait DocumentAnalysis: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, VoiceError>;
}

/// Shared, mutable [`DocumentContextProvider`] for UI wiring and tests.
/// The dispatcher reads it at call time, so focus changes mid-conversation
/// are picked up by the very next question.
#[derive(Default)]
pub struct SharedDocumentContext {
    context: RwLock<DocumentContext>,
}

impl SharedDocumentContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_document(&self, document_id: Option<String>) {
        let mut ctx = self.context.write().unwrap_or_else(|p| p.into_inner());
        ctx.document_id = document_id;
        ctx.highlighted_section_id = None;
    }

    pub fn set_highlight(&self, section_id: Option<String>) {
        self.context
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .highlighted_section_id = section_id;
    }
}

impl DocumentContextProvider for SharedDocumentContext {
    fn current(&self) -> DocumentContext {
        self.context
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Turns a finalized utterance (or typed text) into an analysis request.
pub struct QueryDispatcher {
    analysis: Arc<dyn DocumentAnalysis>,
    context: Arc<dyn DocumentContextProvider>,
    session: SessionState,
    timeout: Duration,
}

impl QueryDispatcher {
    pub fn new(
        analysis: Arc<dyn DocumentAnalysis>,
        context: Arc<dyn DocumentContextProvider>,
        session: SessionState,
        timeout: Duration,
    ) -> Self {
        Self {
            analysis,
            context,
            session,
            timeout,
        }
    }

    /// Issue a question against the active document.
    ///
    /// Fails fast with [`VoiceError::NoActiveDocument`] before any network
    /// call when no document is selected. On failure `last_response` is left
    /// unchanged and the audio pipeline is untouched. The `processing` flag
    /// clears on every exit path, including cancellation.
    pub async fn send_message(&self, text: &str) -> Result<AnalysisResponse, VoiceError> {
        let ctx = self.context.current();
        let document_id = match ctx.document_id {
            Some(id) => id,
            None => {
                warn!("send_message rejected: no active document");
                return Err(VoiceError::NoActiveDocument);
            }
        };

        let request = AnalysisRequest {
            document_id,
            question: text.to_string(),
            highlighted_section_id: ctx.highlighted_section_id,
        };

        info!("dispatching analysis request for {}", request.document_id);
        let _processing = ProcessingGuard::engage(&self.session);

        let response = tokio::time::timeout(self.timeout, self.analysis.analyze(request))
            .await
            .map_err(|_| VoiceError::AnalysisFailed("analysis request timed out".into()))?
            .map_err(|e| match e {
                VoiceError::AnalysisFailed(_) => e,
                other => VoiceError::AnalysisFailed(other.to_string()),
            })?;

        self.session.set_last_response(response.summary.clone());
        Ok(response)
    }
}

/// RAII scope for the `processing` flag: set on engage, cleared on drop, so
/// success, failure, and cancellation all release it.
struct ProcessingGuard<'a> {
    session: &'a SessionState,
}

impl<'a> ProcessingGuard<'a> {
    fn engage(session: &'a SessionState) -> Self {
        session.set_processing(true);
        Self { session }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.session.set_processing(false);
    }
}
