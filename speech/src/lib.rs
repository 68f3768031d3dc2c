//! Speech synthesizer capability agent and the engine binding that wires it
//! into the directive dispatcher, the capability registry and the dialog UX
//! aggregator.
//!
//! Typical use:
//! - build a [`CollaboratorSet`] from the engine's services
//! - call [`SpeechSynthesizerEngine::create`] with the platform handler
//! - call [`SpeechSynthesizerEngine::shutdown`] when the engine stops

pub mod engine;
pub mod synthesizer;

pub use engine::{CollaboratorSet, EngineState, SpeechSynthesizerEngine};
pub use synthesizer::{SpeechSynthesizer, SpeechSynthesizerServices};
