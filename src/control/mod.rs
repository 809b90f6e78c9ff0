//! Invocation control
//!
//! The user-facing trigger for a generation. Collects template, parameters,
//! and contextual reference material, guards against duplicate submissions,
//! relays lifecycle state into visual affordances, and surfaces the feedback
//! prompt after a success. Each control owns exactly one orchestrator.

mod display;

pub use display::{ConsoleStatusDisplay, StatusDisplay, VisualState};

use crate::analytics::AnalyticsSink;
use crate::error::{AiError, Result};
use crate::feedback::FeedbackRecorder;
use crate::orchestrator::{GenerationEvent, GenerationOrchestrator};
use crate::template::{ParamBag, ParamValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// A piece of contextual reference material supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub authors: String,
    pub year: Option<i32>,
    pub source: Option<String>,
}

/// Flatten a reference list into the textual block appended under the
/// `references` parameter key. An empty list renders as an empty string, so
/// no bare header ever reaches a prompt.
pub fn render_references(references: &[Reference]) -> String {
    if references.is_empty() {
        return String::new();
    }
    let mut block = String::from("References:");
    for (index, reference) in references.iter().enumerate() {
        block.push_str(&format!("\n{}. {}", index + 1, reference.authors));
        if let Some(year) = reference.year {
            block.push_str(&format!(" ({year})"));
        }
        block.push_str(&format!(". {}", reference.title));
        if let Some(source) = &reference.source {
            block.push_str(&format!(". {source}"));
        }
    }
    block
}

/// Tuning knobs for a control instance
#[derive(Debug, Clone)]
pub struct ControlOptions {
    /// Whether triggers request incremental delivery
    pub streaming: bool,
    /// How long a surfaced error stays visible before auto-clearing
    pub error_clear_delay: Duration,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            streaming: false,
            error_clear_delay: Duration::from_secs(5),
        }
    }
}

impl ControlOptions {
    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        Self {
            streaming: false,
            error_clear_delay: config.error_clear_delay(),
        }
    }
}

/// An armed feedback prompt for the most recent successful generation
#[derive(Debug, Clone)]
pub struct FeedbackPrompt {
    pub content_id: String,
    pub template_id: String,
}

type ContentCallback = Arc<dyn Fn(String) + Send + Sync>;

/// The user-facing trigger wired to one orchestrator
pub struct InvocationControl {
    orchestrator: GenerationOrchestrator,
    analytics: Arc<dyn AnalyticsSink>,
    recorder: Arc<FeedbackRecorder>,
    options: ControlOptions,
    visual: Arc<Mutex<VisualState>>,
    prompt: Arc<Mutex<Option<FeedbackPrompt>>>,
}

impl InvocationControl {
    /// Wire a control to its orchestrator and sinks. Spawns a driver task
    /// that consumes lifecycle events for the lifetime of the orchestrator.
    pub fn new(
        orchestrator: GenerationOrchestrator,
        analytics: Arc<dyn AnalyticsSink>,
        recorder: Arc<FeedbackRecorder>,
        status_display: Arc<dyn StatusDisplay>,
        options: ControlOptions,
        on_content_generated: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        let visual = Arc::new(Mutex::new(VisualState::Idle));
        let prompt = Arc::new(Mutex::new(None));
        let control = Self {
            orchestrator: orchestrator.clone(),
            analytics,
            recorder,
            options,
            visual: visual.clone(),
            prompt: prompt.clone(),
        };

        let callback: ContentCallback = Arc::new(on_content_generated);
        let error_clear_delay = control.options.error_clear_delay;
        let mut events = orchestrator.subscribe_epoch_channel();
        // The driver holds only a weak handle; it exits when the last strong
        // handle (usually this control) is dropped and the channel closes.
        let weak = orchestrator.downgrade();
        drop(orchestrator);
        tokio::spawn(async move {
            let mut current_template = String::new();
            let set_visual = |state: VisualState| {
                status_display.render(&state);
                *visual.lock().unwrap() = state;
            };
            while let Some((epoch, event)) = events.recv().await {
                match event {
                    GenerationEvent::Started { template_id } => {
                        current_template = template_id;
                        set_visual(VisualState::Busy { progress: 0 });
                    }
                    GenerationEvent::ChunkReceived { progress, .. } => {
                        set_visual(VisualState::Busy { progress });
                    }
                    GenerationEvent::Succeeded {
                        content,
                        content_id,
                        ..
                    } => {
                        set_visual(VisualState::Idle);
                        *prompt.lock().unwrap() = Some(FeedbackPrompt {
                            content_id,
                            template_id: current_template.clone(),
                        });
                        callback(content);
                    }
                    GenerationEvent::Failed { error } => {
                        set_visual(VisualState::Error {
                            message: error.message.clone(),
                        });
                        let weak = weak.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(error_clear_delay).await;
                            // Only clears the invocation that failed; a newer
                            // one has a different epoch
                            let Some(orchestrator) = weak.upgrade() else {
                                return;
                            };
                            if orchestrator.reset_if_epoch(epoch) {
                                debug!("error display auto-cleared");
                            }
                        });
                    }
                    GenerationEvent::Reset => set_visual(VisualState::Idle),
                }
            }
        });

        control
    }

    /// Fire a generation. Returns `false` without side effects when an
    /// invocation is already in flight (duplicate-submission guard).
    pub fn trigger(
        &self,
        template_id: &str,
        parameters: ParamBag,
        references: &[Reference],
    ) -> bool {
        if self.orchestrator.is_busy() {
            debug!(template_id, "trigger ignored: invocation already in flight");
            return false;
        }

        let analytics = self.analytics.clone();
        let context = json!({
            "template_id": template_id,
            "reference_count": references.len(),
        });
        tokio::spawn(async move {
            if let Err(err) = analytics.record("generation_triggered", context).await {
                debug!("analytics sink failure ignored: {err}");
            }
        });

        let mut parameters = parameters;
        if !references.is_empty() {
            parameters.insert(
                "references".to_string(),
                ParamValue::Text(render_references(references)),
            );
        }
        self.orchestrator
            .start(template_id, parameters, self.options.streaming);
        true
    }

    /// Current visual affordance state
    pub fn visual_state(&self) -> VisualState {
        self.visual.lock().unwrap().clone()
    }

    /// The armed feedback prompt, if the latest invocation succeeded and has
    /// not been rated or dismissed yet
    pub fn feedback_prompt(&self) -> Option<FeedbackPrompt> {
        self.prompt.lock().unwrap().clone()
    }

    /// Submit a rating for the armed prompt. The prompt is dismissed once a
    /// valid rating is accepted, regardless of sink outcome; an out-of-bounds
    /// rating leaves it armed.
    pub async fn submit_feedback(&self, rating: u8, comments: &str) -> Result<()> {
        FeedbackRecorder::validate_rating(rating)?;
        let armed = self
            .prompt
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AiError::validation("no feedback prompt to submit"))?;
        self.recorder
            .submit(
                &armed.content_id,
                &armed.template_id,
                rating,
                comments,
                HashMap::new(),
            )
            .await
    }

    /// Dismiss the armed prompt without submitting
    pub fn dismiss_feedback(&self) {
        *self.prompt.lock().unwrap() = None;
    }

    /// The orchestrator this control drives
    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }
}
