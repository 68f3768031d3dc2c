// Vocal Core Library
// Collaborator services a capability agent is wired into

pub mod attachment;
pub mod audio_channel;
pub mod capability;
pub mod config;
pub mod context;
pub mod directive;
pub mod exception;
pub mod focus;
pub mod message;
pub mod speaker;
pub mod telemetry;
pub mod ux;

mod utils;

pub use utils::lock;

// Export core types
pub use attachment::{AttachmentManager, InMemoryAttachmentManager};
pub use audio_channel::{
    AudioChannel, AudioChannelPlatform, AudioSource, MediaEventSink, MediaPlayer,
    MediaPlayerObserver, MediaState,
};
pub use capability::{
    CapabilitiesDelegate, CapabilityConfiguration, CapabilityConfigurationProvider,
    CapabilityRegistry,
};
pub use config::{EngineConfig, FocusConfig, SpeechConfig};
pub use context::{ContextManager, InMemoryContextManager};
pub use directive::{
    Directive, DirectiveDispatcher, DirectiveHandler, DirectiveSequencer, NamespaceAndName,
};
pub use exception::{ExceptionEncounteredSender, ExceptionErrorType, ExceptionReporter};
pub use focus::{ChannelObserver, FocusManager, FocusState, PriorityFocusManager};
pub use message::{ChannelMessageSender, MessageRequest, MessageSender};
pub use speaker::{DefaultSpeakerManager, Speaker, SpeakerManager, SpeakerType};
pub use ux::{
    DialogUxState, DialogUxStateAggregator, SpeechSynthesizerObserver, SpeechSynthesizerState,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A wiring step failed; `reason` is the stable string written to the log.
    #[error("Initialization failed: {reason}")]
    Initialization { reason: &'static str },

    #[error("Directive error: {0}")]
    Directive(String),

    #[error("No handler for directive {namespace}.{name}")]
    HandlerNotFound { namespace: String, name: String },

    #[error("Focus error: {0}")]
    Focus(String),

    #[error("Component is shut down")]
    ShutDown,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl EngineError {
    pub fn initialization(reason: &'static str) -> Self {
        EngineError::Initialization { reason }
    }

    /// Log reason for initialization failures, the display string otherwise.
    pub fn reason(&self) -> String {
        match self {
            EngineError::Initialization { reason } => (*reason).to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
