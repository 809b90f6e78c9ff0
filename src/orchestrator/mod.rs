//! Per-invocation generation state machine
//!
//! Wraps the generation client and tracks lifecycle from idle through flight
//! to a settled outcome, aggregating streamed chunks into cumulative progress
//! and content. Cancellation is cooperative: a new `start` or an explicit
//! `reset` bumps the invocation epoch, and every continuation of a superseded
//! call checks its epoch before touching state, so the underlying request may
//! finish in the background without corrupting newer state.

mod events;

pub use events::GenerationEvent;

use crate::client::{GenerationClient, GenerationRequest, GenerationResult};
use crate::error::AiError;
use crate::template::ParamBag;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle phase of the current invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    InFlight,
    Streaming,
    Succeeded,
    Failed,
}

/// Snapshot of the orchestrator's current state
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub phase: GenerationPhase,
    /// Latest cumulative progress, 0-100
    pub progress: u8,
    /// Accumulated (partial or final) content
    pub content: String,
    /// Identifier of the settled artifact, present once succeeded
    pub content_id: Option<String>,
    /// Last classified error, present once failed
    pub error: Option<AiError>,
}

impl OrchestratorState {
    fn idle() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            progress: 0,
            content: String::new(),
            content_id: None,
            error: None,
        }
    }

    fn in_flight() -> Self {
        Self {
            phase: GenerationPhase::InFlight,
            ..Self::idle()
        }
    }
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::idle()
    }
}

type Subscriber = Box<dyn Fn(&GenerationEvent) + Send>;

struct Inner {
    state: OrchestratorState,
    /// Monotonic invocation counter; continuations carrying an older value
    /// are superseded and must not mutate state
    epoch: u64,
    subscribers: Vec<Subscriber>,
    channels: Vec<mpsc::UnboundedSender<GenerationEvent>>,
    epoch_channels: Vec<mpsc::UnboundedSender<(u64, GenerationEvent)>>,
}

impl Inner {
    fn superseded(&self, epoch: u64) -> bool {
        self.epoch != epoch
    }

    fn emit(&mut self, event: &GenerationEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
        self.channels.retain(|tx| tx.send(event.clone()).is_ok());
        let epoch = self.epoch;
        self.epoch_channels
            .retain(|tx| tx.send((epoch, event.clone())).is_ok());
    }

    fn apply_chunk(&mut self, text: String, progress: u8) {
        self.state.phase = GenerationPhase::Streaming;
        self.state.progress = progress;
        self.state.content.push_str(&text);
        self.emit(&GenerationEvent::ChunkReceived { text, progress });
    }

    fn apply_success(&mut self, result: GenerationResult) {
        self.state.phase = GenerationPhase::Succeeded;
        self.state.progress = 100;
        self.state.content = result.content.clone();
        self.state.content_id = Some(result.content_id.clone());
        self.state.error = None;
        self.emit(&GenerationEvent::Succeeded {
            content: result.content,
            content_id: result.content_id,
            metadata: result.metadata,
        });
    }

    fn apply_failure(&mut self, error: AiError) {
        self.state.phase = GenerationPhase::Failed;
        self.state.error = Some(error.clone());
        self.emit(&GenerationEvent::Failed { error });
    }

    fn apply_reset(&mut self) {
        self.epoch += 1;
        self.state = OrchestratorState::idle();
        self.emit(&GenerationEvent::Reset);
    }
}

/// The per-invocation state machine coordinating a generation call's
/// lifecycle.
///
/// Subscribers are invoked synchronously under the state lock on each
/// transition; they must not call back into the orchestrator. Use
/// [`subscribe_channel`](Self::subscribe_channel) for consumers that need to
/// react with orchestrator calls of their own.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    client: Arc<GenerationClient>,
    inner: Arc<Mutex<Inner>>,
}

impl GenerationOrchestrator {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        Self {
            client,
            inner: Arc::new(Mutex::new(Inner {
                state: OrchestratorState::idle(),
                epoch: 0,
                subscribers: Vec::new(),
                channels: Vec::new(),
                epoch_channels: Vec::new(),
            })),
        }
    }

    /// Start a new invocation, superseding any in-flight one.
    ///
    /// Fire-and-forget: state changes are observed via subscription, not the
    /// return value. The superseded call's remaining chunks and outcome are
    /// dropped on arrival.
    pub fn start(&self, template_id: impl Into<String>, parameters: ParamBag, streaming: bool) {
        let template_id = template_id.into();
        let epoch = {
            let mut inner = self.inner.lock().unwrap();
            inner.epoch += 1;
            inner.state = OrchestratorState::in_flight();
            inner.emit(&GenerationEvent::Started {
                template_id: template_id.clone(),
            });
            inner.epoch
        };

        let client = self.client.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let request = GenerationRequest {
                template_id,
                parameters,
                streaming,
            };
            let outcome = if streaming {
                let chunk_inner = inner.clone();
                client
                    .generate_streaming(&request, move |chunk| {
                        let mut guard = chunk_inner.lock().unwrap();
                        if guard.superseded(epoch) {
                            debug!("Dropping chunk from superseded invocation");
                            return;
                        }
                        guard.apply_chunk(chunk.text, chunk.cumulative_progress);
                    })
                    .await
            } else {
                client.generate(&request).await
            };

            let mut guard = inner.lock().unwrap();
            if guard.superseded(epoch) {
                debug!("Dropping outcome from superseded invocation");
                return;
            }
            match outcome {
                Ok(result) => guard.apply_success(result),
                Err(error) => guard.apply_failure(error),
            }
        });
    }

    /// Return to idle from any state, discarding accumulated
    /// content/progress/error. Synchronous; also supersedes any in-flight
    /// invocation.
    pub fn reset(&self) {
        self.inner.lock().unwrap().apply_reset();
    }

    /// Reset only if `epoch` is still the live invocation. Used by timers
    /// that must not clobber a newer invocation. Returns whether a reset
    /// happened.
    pub fn reset_if_epoch(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.superseded(epoch) {
            return false;
        }
        inner.apply_reset();
        true
    }

    /// Epoch of the live invocation, for pairing with
    /// [`reset_if_epoch`](Self::reset_if_epoch)
    pub fn invocation_epoch(&self) -> u64 {
        self.inner.lock().unwrap().epoch
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> OrchestratorState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> GenerationPhase {
        self.inner.lock().unwrap().state.phase
    }

    /// Whether an invocation is in flight or streaming
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase(),
            GenerationPhase::InFlight | GenerationPhase::Streaming
        )
    }

    /// Register a synchronous subscriber called on every transition
    pub fn subscribe(&self, subscriber: impl Fn(&GenerationEvent) + Send + 'static) {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .push(Box::new(subscriber));
    }

    /// Receive every subsequent event over a channel. Suited to consumers
    /// that react by calling back into the orchestrator.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<GenerationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().channels.push(tx);
        rx
    }

    /// Handle that observes and drives this orchestrator without keeping it
    /// alive. Long-running driver tasks hold this so the orchestrator (and
    /// their own event channel) can be dropped out from under them.
    pub(crate) fn downgrade(&self) -> WeakOrchestrator {
        WeakOrchestrator {
            client: self.client.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Like [`subscribe_channel`](Self::subscribe_channel) but each event is
    /// tagged with the epoch of the invocation that produced it, so reactive
    /// timers can pair with exactly that invocation.
    pub(crate) fn subscribe_epoch_channel(
        &self,
    ) -> mpsc::UnboundedReceiver<(u64, GenerationEvent)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().epoch_channels.push(tx);
        rx
    }
}

/// Non-owning counterpart to [`GenerationOrchestrator`]
#[derive(Clone)]
pub(crate) struct WeakOrchestrator {
    client: Arc<GenerationClient>,
    inner: std::sync::Weak<Mutex<Inner>>,
}

impl WeakOrchestrator {
    pub(crate) fn upgrade(&self) -> Option<GenerationOrchestrator> {
        self.inner.upgrade().map(|inner| GenerationOrchestrator {
            client: self.client.clone(),
            inner,
        })
    }
}
