//! Testing utilities and fixtures
//!
//! Scripted backend, recording sinks, and event collectors shared by unit
//! and integration tests.

use crate::analytics::AnalyticsSink;
use crate::client::{BackendResponse, GenerationBackend, StreamFragment};
use crate::control::{StatusDisplay, VisualState};
use crate::error::{AiError, Result};
use crate::feedback::{FeedbackRecord, FeedbackSink};
use crate::orchestrator::GenerationEvent;
use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Per-kind call counts for a [`MockBackend`]
#[derive(Default)]
pub struct CallCounters {
    pub once: AtomicUsize,
    pub streaming: AtomicUsize,
    pub probe: AtomicUsize,
}

impl CallCounters {
    /// Generation calls of either mode; probes excluded
    pub fn total_calls(&self) -> usize {
        self.once.load(Ordering::SeqCst) + self.streaming.load(Ordering::SeqCst)
    }
}

enum ScriptedCall {
    Respond {
        response: BackendResponse,
        delay: Duration,
    },
    Fragments {
        items: Vec<Result<StreamFragment>>,
        delay: Duration,
    },
    Fail {
        error: AiError,
        delay: Duration,
    },
}

/// Scripted [`GenerationBackend`]: each generation call consumes the next
/// script entry in order
pub struct MockBackend {
    script: Mutex<VecDeque<ScriptedCall>>,
    prompts: Arc<Mutex<Vec<String>>>,
    counters: Arc<CallCounters>,
    probe_ok: AtomicBool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompts: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(CallCounters::default()),
            probe_ok: AtomicBool::new(true),
        }
    }

    fn push(self, call: ScriptedCall) -> Self {
        self.script.lock().unwrap().push_back(call);
        self
    }

    /// Script a successful whole response
    pub fn with_response(self, text: &str) -> Self {
        self.push(ScriptedCall::Respond {
            response: BackendResponse {
                text: text.to_string(),
                ..Default::default()
            },
            delay: Duration::ZERO,
        })
    }

    /// Script a successful whole response carrying a backend content id
    pub fn with_identified_response(self, text: &str, content_id: &str) -> Self {
        self.push(ScriptedCall::Respond {
            response: BackendResponse {
                text: text.to_string(),
                content_id: Some(content_id.to_string()),
                ..Default::default()
            },
            delay: Duration::ZERO,
        })
    }

    /// Script a successful whole response delivered after a delay
    pub fn with_delayed_response(self, text: &str, delay: Duration) -> Self {
        self.push(ScriptedCall::Respond {
            response: BackendResponse {
                text: text.to_string(),
                ..Default::default()
            },
            delay,
        })
    }

    /// Script a streamed sequence of fragments
    pub fn with_fragments(self, fragments: Vec<(&str, Option<u8>)>) -> Self {
        self.with_fragments_delayed(fragments, Duration::ZERO)
    }

    /// Script a streamed sequence of fragments that arrive after a delay
    pub fn with_fragments_delayed(
        self,
        fragments: Vec<(&str, Option<u8>)>,
        delay: Duration,
    ) -> Self {
        let items = fragments
            .into_iter()
            .map(|(text, progress)| {
                Ok(StreamFragment {
                    text: text.to_string(),
                    progress,
                })
            })
            .collect();
        self.push(ScriptedCall::Fragments { items, delay })
    }

    /// Script a stream that delivers some fragments and then errors
    pub fn with_stream_failure(
        self,
        fragments: Vec<(&str, Option<u8>)>,
        error: AiError,
    ) -> Self {
        let mut items: Vec<Result<StreamFragment>> = fragments
            .into_iter()
            .map(|(text, progress)| {
                Ok(StreamFragment {
                    text: text.to_string(),
                    progress,
                })
            })
            .collect();
        items.push(Err(error));
        self.push(ScriptedCall::Fragments {
            items,
            delay: Duration::ZERO,
        })
    }

    /// Script a call-level rejection
    pub fn with_failure(self, error: AiError) -> Self {
        self.push(ScriptedCall::Fail {
            error,
            delay: Duration::ZERO,
        })
    }

    /// Script a call-level rejection delivered after a delay
    pub fn with_delayed_failure(self, error: AiError, delay: Duration) -> Self {
        self.push(ScriptedCall::Fail { error, delay })
    }

    /// Make the availability probe fail
    pub fn failing_probe(self) -> Self {
        self.probe_ok.store(false, Ordering::SeqCst);
        self
    }

    /// Shared call counters, usable after the backend is moved into a client
    pub fn counters(&self) -> Arc<CallCounters> {
        self.counters.clone()
    }

    /// Prompts received by generation calls, in order
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }

    fn next_scripted(&self) -> Option<ScriptedCall> {
        self.script.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn call_once(&self, prompt: &str) -> Result<BackendResponse> {
        self.counters.once.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.next_scripted() {
            Some(ScriptedCall::Respond { response, delay }) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(ScriptedCall::Fail { error, delay }) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            Some(ScriptedCall::Fragments { items, .. }) => {
                let text: String = items
                    .into_iter()
                    .filter_map(|item| item.ok())
                    .map(|fragment| fragment.text)
                    .collect();
                Ok(BackendResponse {
                    text,
                    ..Default::default()
                })
            }
            None => Err(AiError::unknown("mock backend script exhausted")),
        }
    }

    async fn call_streaming(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<StreamFragment>>> {
        self.counters.streaming.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.next_scripted() {
            Some(ScriptedCall::Fragments { items, delay }) => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for item in items {
                        if tx.send(item).is_err() {
                            return;
                        }
                    }
                });
                Ok(UnboundedReceiverStream::new(rx).boxed())
            }
            Some(ScriptedCall::Respond { response, delay }) => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Ok(StreamFragment {
                        text: response.text,
                        progress: Some(100),
                    }));
                });
                Ok(UnboundedReceiverStream::new(rx).boxed())
            }
            Some(ScriptedCall::Fail { error, delay }) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            None => Err(AiError::unknown("mock backend script exhausted")),
        }
    }

    async fn probe(&self) -> Result<()> {
        self.counters.probe.fetch_add(1, Ordering::SeqCst);
        if self.probe_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AiError::network("probe target unreachable"))
        }
    }
}

/// Feedback sink that records what it receives, with switchable failure
pub struct RecordingFeedbackSink {
    records: Mutex<Vec<FeedbackRecord>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl Default for RecordingFeedbackSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingFeedbackSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedbackSink for RecordingFeedbackSink {
    async fn record(&self, record: &FeedbackRecord) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("feedback sink unreachable"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Analytics sink that records events, with switchable failure
pub struct RecordingAnalyticsSink {
    events: Mutex<Vec<(String, serde_json::Value)>>,
    failing: AtomicBool,
}

impl Default for RecordingAnalyticsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingAnalyticsSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingAnalyticsSink {
    async fn record(&self, event_name: &str, context: serde_json::Value) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("analytics sink unreachable"));
        }
        self.events
            .lock()
            .unwrap()
            .push((event_name.to_string(), context));
        Ok(())
    }
}

/// Collects orchestrator events for deterministic assertions
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<GenerationEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure suitable for `GenerationOrchestrator::subscribe`
    pub fn subscriber(&self) -> impl Fn(&GenerationEvent) + Send + 'static {
        let events = self.events.clone();
        move |event| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<GenerationEvent> {
        self.events.lock().unwrap().clone()
    }
}

/// Status display that records every rendered state
#[derive(Default)]
pub struct CollectingStatusDisplay {
    states: Mutex<Vec<VisualState>>,
}

impl CollectingStatusDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<VisualState> {
        self.states.lock().unwrap().clone()
    }
}

impl StatusDisplay for CollectingStatusDisplay {
    fn render(&self, state: &VisualState) {
        self.states.lock().unwrap().push(state.clone());
    }
}
