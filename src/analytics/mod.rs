//! Fire-and-forget analytics sink
//!
//! The pipeline notifies the sink on trigger events and ignores failures; a
//! broken analytics backend must never affect generation.

use async_trait::async_trait;
use tracing::info;

/// External metrics sink for usage events
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Record a named event with a JSON context payload
    async fn record(&self, event_name: &str, context: serde_json::Value) -> anyhow::Result<()>;
}

/// Default sink that writes events through tracing
pub struct LoggingAnalyticsSink;

#[async_trait]
impl AnalyticsSink for LoggingAnalyticsSink {
    async fn record(&self, event_name: &str, context: serde_json::Value) -> anyhow::Result<()> {
        info!(event = event_name, %context, "analytics event");
        Ok(())
    }
}
