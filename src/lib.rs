//! # Draftgen
//!
//! Client-side pipeline for AI-assisted report content generation. Turns a
//! named template plus a parameter bag into generated text, optionally
//! delivered incrementally, with lifecycle orchestration, cancellation,
//! error classification, and post-generation feedback capture.
//!
//! ## Modules
//!
//! - `analytics` - Fire-and-forget analytics sink for trigger events
//! - `client` - Generation client: backend abstraction, streaming, error classification
//! - `config` - Pipeline configuration with environment overrides
//! - `control` - Invocation control: trigger guard, visual state relay, feedback prompt
//! - `error` - Unified error type with the fixed classification taxonomy
//! - `feedback` - Best-effort feedback recording keyed to generated content
//! - `orchestrator` - Per-invocation lifecycle state machine with typed events
//! - `template` - Immutable template registry and prompt resolution
//! - `testing` - Mocks and fixtures shared by unit and integration tests

pub mod analytics;
pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod feedback;
pub mod orchestrator;
pub mod template;

pub mod testing;

pub use client::{GenerationChunk, GenerationClient, GenerationRequest, GenerationResult};
pub use config::PipelineConfig;
pub use error::{AiError, ErrorKind, Result};
pub use orchestrator::{GenerationEvent, GenerationOrchestrator, GenerationPhase};
pub use template::TemplateRegistry;
