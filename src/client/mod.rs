//! Generation client
//!
//! Performs a single content-generation call against a remote service, in
//! either whole-response or incremental mode. Owns request shaping (via the
//! template registry) and error classification: no raw transport error
//! crosses this boundary unclassified. Stateless and safely shared across
//! concurrent invocations.

mod http;
mod models;

pub use http::HttpBackend;
pub use models::{
    synthesize_content_id, BackendResponse, GenerationChunk, GenerationRequest, GenerationResult,
    StreamFragment,
};

use crate::error::Result;
use crate::template::TemplateRegistry;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

/// The two operations the client depends on from a remote generation
/// endpoint, plus a lightweight availability probe. Exact transport is the
/// implementor's concern.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Single round trip returning the complete text
    async fn call_once(&self, prompt: &str) -> Result<BackendResponse>;

    /// Ordered sequence of text fragments. Implementations must not let a
    /// slow consumer back-pressure the underlying transport read.
    async fn call_streaming(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<StreamFragment>>>;

    /// Cheap reachability check
    async fn probe(&self) -> Result<()>;
}

/// Client for a remote generation service
pub struct GenerationClient {
    registry: Arc<TemplateRegistry>,
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationClient {
    pub fn new(registry: Arc<TemplateRegistry>, backend: Arc<dyn GenerationBackend>) -> Self {
        Self { registry, backend }
    }

    /// Whole-response generation: one round trip, complete text.
    ///
    /// Template resolution runs first, so validation failures never reach the
    /// network.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let prompt = self
            .registry
            .resolve(&request.template_id, &request.parameters)?;
        debug!(template_id = %request.template_id, "Dispatching whole-response generation");

        let response = self.backend.call_once(&prompt).await?;
        Ok(self.shape_result(request, response.text, response.content_id, response.metadata))
    }

    /// Streaming generation: emits one [`GenerationChunk`] per fragment with
    /// monotonically non-decreasing cumulative progress, and resolves with the
    /// concatenation of all fragments in arrival order.
    pub async fn generate_streaming(
        &self,
        request: &GenerationRequest,
        mut on_chunk: impl FnMut(GenerationChunk) + Send,
    ) -> Result<GenerationResult> {
        let prompt = self
            .registry
            .resolve(&request.template_id, &request.parameters)?;
        debug!(template_id = %request.template_id, "Dispatching streaming generation");

        let mut stream = self.backend.call_streaming(&prompt).await?;
        let mut content = String::new();
        let mut progress: u8 = 0;
        // One-fragment lookahead so the final chunk of a successful stream
        // can be pinned to 100 regardless of what the backend reported.
        let mut pending: Option<StreamFragment> = None;

        while let Some(next) = stream.next().await {
            let next = match next {
                Ok(next) => next,
                Err(err) => {
                    // The fragment before the error still arrived; deliver it
                    // so subscribers see every chunk before the terminal
                    // failure.
                    if let Some(fragment) = pending.take() {
                        progress = advance_progress(progress, fragment.progress, false);
                        on_chunk(GenerationChunk {
                            text: fragment.text,
                            cumulative_progress: progress,
                        });
                    }
                    return Err(err);
                }
            };
            if let Some(fragment) = pending.take() {
                progress = advance_progress(progress, fragment.progress, false);
                content.push_str(&fragment.text);
                on_chunk(GenerationChunk {
                    text: fragment.text,
                    cumulative_progress: progress,
                });
            }
            pending = Some(next);
        }

        if let Some(fragment) = pending.take() {
            progress = advance_progress(progress, fragment.progress, true);
            content.push_str(&fragment.text);
            on_chunk(GenerationChunk {
                text: fragment.text,
                cumulative_progress: progress,
            });
        }

        Ok(self.shape_result(request, content, None, Default::default()))
    }

    /// Lightweight availability probe. Never raises: any failure degrades to
    /// `false` so callers can pre-disable their trigger.
    pub async fn check_availability(&self) -> bool {
        match self.backend.probe().await {
            Ok(()) => true,
            Err(err) => {
                debug!("Availability probe failed: {err}");
                false
            }
        }
    }

    fn shape_result(
        &self,
        request: &GenerationRequest,
        content: String,
        content_id: Option<String>,
        metadata: std::collections::HashMap<String, serde_json::Value>,
    ) -> GenerationResult {
        let content_id =
            content_id.unwrap_or_else(|| synthesize_content_id(&request.template_id));
        GenerationResult {
            content,
            content_id,
            metadata,
        }
    }
}

/// Clamp a reported progress value into a monotonic 0-100 sequence. Fragments
/// without a reported value advance by a capped estimate; the final fragment
/// of a successful stream always lands on 100.
fn advance_progress(prev: u8, supplied: Option<u8>, is_final: bool) -> u8 {
    if is_final {
        return 100;
    }
    match supplied {
        Some(p) => p.min(99).max(prev),
        None => {
            let estimated = prev as u16 + (100 - prev as u16) / 4;
            (estimated.min(99) as u8).max(prev)
        }
    }
}
