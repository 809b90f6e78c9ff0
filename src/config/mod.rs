//! Pipeline configuration
//!
//! Explicitly constructed and passed into components; nothing here is a
//! mutable global. Environment variables override defaults for deployments
//! that cannot ship a config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the generation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base URL of the remote generation endpoint
    pub endpoint: String,
    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,
    /// Model identifier forwarded to the backend
    pub model: String,
    /// Transport timeout for generation calls, in seconds
    pub request_timeout_secs: u64,
    /// Timeout for the lightweight availability probe, in seconds
    pub probe_timeout_secs: u64,
    /// How long a surfaced error stays visible before auto-clearing, in seconds
    pub error_clear_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8700".to_string(),
            api_key: None,
            model: "draft-writer-1".to_string(),
            request_timeout_secs: 120,
            probe_timeout_secs: 5,
            error_clear_secs: 5,
        }
    }
}

impl PipelineConfig {
    /// Build a config from defaults plus `DRAFTGEN_*` environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("DRAFTGEN_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("DRAFTGEN_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("DRAFTGEN_MODEL") {
            config.model = model;
        }
        if let Ok(secs) = std::env::var("DRAFTGEN_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.request_timeout_secs = secs;
            }
        }
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn error_clear_delay(&self) -> Duration {
        Duration::from_secs(self.error_clear_secs)
    }
}

/// Initialize tracing for binaries and examples embedding the pipeline.
/// Respects `RUST_LOG`; defaults to info-level output.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
