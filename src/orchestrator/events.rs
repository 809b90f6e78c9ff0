//! Typed lifecycle events emitted by the orchestrator
//!
//! Subscribers consume these instead of capturing mutable UI state in
//! closures, so a test harness can observe the exact transition sequence.

use crate::error::AiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One lifecycle transition of a generation invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// A new invocation entered flight
    Started { template_id: String },
    /// One streamed fragment arrived
    ChunkReceived { text: String, progress: u8 },
    /// The invocation settled successfully
    Succeeded {
        content: String,
        content_id: String,
        metadata: HashMap<String, serde_json::Value>,
    },
    /// The invocation settled with a classified error
    Failed { error: AiError },
    /// The orchestrator was explicitly returned to idle
    Reset,
}

impl GenerationEvent {
    /// Whether this event settles an invocation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationEvent::Succeeded { .. } | GenerationEvent::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = GenerationEvent::Started {
            template_id: "conclusion-summary".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"started\""));

        let event = GenerationEvent::ChunkReceived {
            text: "partial".to_string(),
            progress: 40,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"chunk_received\""));
    }

    #[test]
    fn only_settled_events_are_terminal() {
        assert!(GenerationEvent::Succeeded {
            content: String::new(),
            content_id: "c-1".to_string(),
            metadata: HashMap::new(),
        }
        .is_terminal());
        assert!(GenerationEvent::Failed {
            error: AiError::server("boom"),
        }
        .is_terminal());
        assert!(!GenerationEvent::Reset.is_terminal());
        assert!(!GenerationEvent::Started {
            template_id: "t".to_string()
        }
        .is_terminal());
    }
}
