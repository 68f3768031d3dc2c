// Dialog UX state aggregation
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// States reported by the speech synthesizer to its observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechSynthesizerState {
    Playing,
    Finished,
    GainingFocus,
    LosingFocus,
}

impl fmt::Display for SpeechSynthesizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpeechSynthesizerState::Playing => "PLAYING",
            SpeechSynthesizerState::Finished => "FINISHED",
            SpeechSynthesizerState::GainingFocus => "GAINING_FOCUS",
            SpeechSynthesizerState::LosingFocus => "LOSING_FOCUS",
        };
        f.write_str(s)
    }
}

pub trait SpeechSynthesizerObserver: Send + Sync {
    fn on_state_changed(&self, state: SpeechSynthesizerState);
}

/// Aggregate interaction state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogUxState {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

/// Folds per-agent states into one dialog state, published over a watch channel
#[derive(Debug)]
pub struct DialogUxStateAggregator {
    tx: watch::Sender<DialogUxState>,
}

impl Default for DialogUxStateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogUxStateAggregator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DialogUxState::Idle);
        Self { tx }
    }

    pub fn state(&self) -> DialogUxState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DialogUxState> {
        self.tx.subscribe()
    }

    pub fn on_listening(&self) {
        self.set(DialogUxState::Listening);
    }

    pub fn on_request_processing_started(&self) {
        self.set(DialogUxState::Thinking);
    }

    fn set(&self, next: DialogUxState) {
        let prev = self.tx.send_replace(next);
        if prev != next {
            debug!(target: "dialog_ux", from = ?prev, to = ?next, "Dialog UX state changed");
        }
    }
}

impl SpeechSynthesizerObserver for DialogUxStateAggregator {
    fn on_state_changed(&self, state: SpeechSynthesizerState) {
        match state {
            SpeechSynthesizerState::Playing => self.set(DialogUxState::Speaking),
            SpeechSynthesizerState::Finished => self.set(DialogUxState::Idle),
            SpeechSynthesizerState::GainingFocus | SpeechSynthesizerState::LosingFocus => {}
        }
    }
}
