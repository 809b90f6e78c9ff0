//! Request and response models for the generation client

use crate::template::ParamBag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// A single content-generation invocation, built fresh per trigger and never
/// mutated after submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub template_id: String,
    pub parameters: ParamBag,
    pub streaming: bool,
}

impl GenerationRequest {
    pub fn new(template_id: impl Into<String>, parameters: ParamBag) -> Self {
        Self {
            template_id: template_id.into(),
            parameters,
            streaming: false,
        }
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}

/// One incremental fragment of a streamed response as delivered to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationChunk {
    pub text: String,
    /// Monotonically non-decreasing, 0-100; 100 only on the final chunk of a
    /// successful stream
    pub cumulative_progress: u8,
}

/// The settled output of a generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    /// Stable identifier correlating this artifact with later feedback
    pub content_id: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Raw whole-response payload from a backend, before client shaping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendResponse {
    pub text: String,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One raw fragment from a streaming backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFragment {
    pub text: String,
    /// Cumulative progress as reported by the service, if it reports one
    #[serde(default)]
    pub progress: Option<u8>,
}

static LAST_CONTENT_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Synthesize a content id of the form `<template_id>-<unix_millis>` when the
/// backend does not supply one. The timestamp is nudged forward on collision
/// so ids stay unique per invocation within a process.
pub fn synthesize_content_id(template_id: &str) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let millis = match LAST_CONTENT_ID_MILLIS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(previous) => now.max(previous + 1),
        Err(_) => now,
    };
    format!("{template_id}-{millis}")
}
