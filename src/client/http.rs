//! HTTP implementation of the generation backend
//!
//! Whole-response calls are a single JSON POST. Streaming calls read a
//! JSON-lines body; a spawned forwarding task pushes parsed fragments into an
//! unbounded channel so a slow consumer never back-pressures the transport.

use super::{BackendResponse, GenerationBackend, StreamFragment};
use crate::config::PipelineConfig;
use crate::error::{AiError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Reqwest-backed [`GenerationBackend`]
pub struct HttpBackend {
    client: Client,
    probe_client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpBackend {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AiError::validation(format!("failed to create HTTP client: {e}")))?;
        // The probe gets its own short deadline, independent of generation
        let probe_client = Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .map_err(|e| AiError::validation(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            probe_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post_generate(&self, prompt: &str, stream: bool) -> Result<Response> {
        let body = GenerateBody {
            model: &self.model,
            prompt,
            stream,
        };
        let response = self
            .authorize(self.client.post(format!("{}/v1/generate", self.endpoint)))
            .json(&body)
            .send()
            .await?;
        classify_status(response).await
    }
}

/// Turn a non-success HTTP status into the matching [`AiError`]
async fn classify_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => {
            AiError::rate_limit(format!("rate limit exceeded: {detail}"))
        }
        s if s.is_server_error() => AiError::server(format!("service failure ({s}): {detail}")),
        s if s.is_client_error() => AiError::validation(format!("rejected request ({s}): {detail}")),
        s => AiError::unknown(format!("unexpected status {s}: {detail}")),
    })
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn call_once(&self, prompt: &str) -> Result<BackendResponse> {
        let response = self.post_generate(prompt, false).await?;
        response
            .json::<BackendResponse>()
            .await
            .map_err(|e| AiError::validation(format!("malformed response body: {e}")))
    }

    async fn call_streaming(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<StreamFragment>>> {
        let response = self.post_generate(prompt, true).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(bytes) = body.next().await {
                let bytes = match bytes {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        let _ = tx.send(Err(AiError::from(err)));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StreamFragment>(line) {
                        Ok(fragment) => {
                            if tx.send(Ok(fragment)).is_err() {
                                // Consumer went away; let the transport drain
                                debug!("Stream consumer dropped, abandoning forward loop");
                                return;
                            }
                        }
                        Err(err) => {
                            warn!("Unparseable stream line: {err}");
                            let _ = tx.send(Err(AiError::validation(format!(
                                "malformed stream fragment: {err}"
                            ))));
                            return;
                        }
                    }
                }
            }
            // Trailing fragment without a final newline
            let line = buffer.trim();
            if !line.is_empty() {
                match serde_json::from_str::<StreamFragment>(line) {
                    Ok(fragment) => {
                        let _ = tx.send(Ok(fragment));
                    }
                    Err(err) => {
                        let _ = tx.send(Err(AiError::validation(format!(
                            "malformed stream fragment: {err}"
                        ))));
                    }
                }
            }
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn probe(&self) -> Result<()> {
        let response = self
            .authorize(self.probe_client.get(format!("{}/health", self.endpoint)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AiError::server(format!(
                "health probe returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_builds_from_default_config() {
        let backend = HttpBackend::new(&PipelineConfig::default()).unwrap();
        assert_eq!(backend.endpoint, "http://localhost:8700");
        assert!(backend.api_key.is_none());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let config = PipelineConfig {
            endpoint: "https://gen.example.com/".to_string(),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint, "https://gen.example.com");
    }
}
