//! Visual affordances for the invocation control

use serde::{Deserialize, Serialize};

/// What the trigger control should look like right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VisualState {
    /// Trigger enabled, nothing running
    Idle,
    /// Trigger disabled, spinner/progress bar showing
    Busy { progress: u8 },
    /// Trigger enabled, error text showing
    Error { message: String },
}

/// Trait for rendering the control's visual state
pub trait StatusDisplay: Send + Sync {
    fn render(&self, state: &VisualState);
}

/// Console rendering for CLI hosts
pub struct ConsoleStatusDisplay;

impl StatusDisplay for ConsoleStatusDisplay {
    fn render(&self, state: &VisualState) {
        match state {
            VisualState::Idle => {}
            VisualState::Busy { progress } => println!("⏳ Generating... {progress}%"),
            VisualState::Error { message } => eprintln!("❌ {message}"),
        }
    }
}
