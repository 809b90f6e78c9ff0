//! Post-generation feedback capture
//!
//! After a successful generation the user may rate the artifact. Records are
//! forwarded best-effort to an external sink: sink failure is logged and
//! swallowed so feedback loss never blocks the primary flow.

use crate::error::{AiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single rating of a generated artifact, immutable once submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Identifier of the generated content being rated
    pub content_id: String,
    pub template_id: String,
    /// Bounded rating, 1-5
    pub rating: u8,
    pub comments: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
}

/// External destination for feedback records
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(&self, record: &FeedbackRecord) -> anyhow::Result<()>;
}

/// Forwards feedback to a sink, best-effort
pub struct FeedbackRecorder {
    sink: Arc<dyn FeedbackSink>,
}

impl FeedbackRecorder {
    pub fn new(sink: Arc<dyn FeedbackSink>) -> Self {
        Self { sink }
    }

    /// Validate a rating against the 1-5 bound
    pub fn validate_rating(rating: u8) -> Result<()> {
        if (1..=5).contains(&rating) {
            Ok(())
        } else {
            Err(AiError::validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )))
        }
    }

    /// Build and forward a feedback record.
    ///
    /// Rating bounds are checked before the sink is touched. Sink failure is
    /// logged and swallowed; from the caller's perspective only invalid input
    /// fails.
    pub async fn submit(
        &self,
        content_id: &str,
        template_id: &str,
        rating: u8,
        comments: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        Self::validate_rating(rating)?;
        let record = FeedbackRecord {
            content_id: content_id.to_string(),
            template_id: template_id.to_string(),
            rating,
            comments: comments.to_string(),
            metadata,
            submitted_at: Utc::now(),
        };
        match self.sink.record(&record).await {
            Ok(()) => debug!(content_id, rating, "feedback forwarded"),
            Err(err) => warn!(content_id, "feedback sink unreachable, dropping record: {err}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::RecordingFeedbackSink;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn submit_forwards_record_to_sink() {
        let sink = Arc::new(RecordingFeedbackSink::new());
        let recorder = FeedbackRecorder::new(sink.clone());

        tokio_test::assert_ok!(
            recorder
                .submit("intro-123", "introduction-academic", 4, "Good draft", HashMap::new())
                .await
        );

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content_id, "intro-123");
        assert_eq!(records[0].rating, 4);
        assert_eq!(records[0].comments, "Good draft");
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = Arc::new(RecordingFeedbackSink::new().failing());
        let recorder = FeedbackRecorder::new(sink.clone());

        recorder
            .submit("intro-123", "introduction-academic", 5, "", HashMap::new())
            .await
            .unwrap();
        assert_eq!(sink.attempts(), 1);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn out_of_bounds_rating_never_reaches_sink() {
        let sink = Arc::new(RecordingFeedbackSink::new());
        let recorder = FeedbackRecorder::new(sink.clone());

        for rating in [0u8, 6, 200] {
            let err = recorder
                .submit("c", "t", rating, "", HashMap::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }
        assert_eq!(sink.attempts(), 0);
    }
}
