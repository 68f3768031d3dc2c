// Speech synthesizer engine binding
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use vocal_core::{
    AttachmentManager, AudioChannel, AudioChannelPlatform, CapabilityRegistry, ContextManager,
    DirectiveDispatcher, EngineError, ExceptionReporter, FocusManager, MediaPlayer,
    MessageSender, Result, SpeakerManager, SpeechConfig, SpeechSynthesizerObserver,
};

use crate::synthesizer::{SpeechSynthesizer, SpeechSynthesizerServices};

/// Identifies log entries and the audio channel of this engine
pub const TAG: &str = "vocal.speech.SpeechSynthesizerEngine";

/// Externally owned services the engine wires the agent into. The three
/// registration services are required; the rest may be absent, in which case
/// agent construction fails.
#[derive(Clone)]
pub struct CollaboratorSet {
    pub directive_dispatcher: Arc<dyn DirectiveDispatcher>,
    pub capability_registry: Arc<dyn CapabilityRegistry>,
    pub speaker_manager: Arc<dyn SpeakerManager>,
    pub message_sender: Option<Arc<dyn MessageSender>>,
    pub focus_manager: Option<Arc<dyn FocusManager>>,
    pub context_manager: Option<Arc<dyn ContextManager>>,
    pub attachment_manager: Option<Arc<dyn AttachmentManager>>,
    pub exception_reporter: Option<Arc<dyn ExceptionReporter>>,
    pub ux_aggregator: Option<Arc<dyn SpeechSynthesizerObserver>>,
}

impl CollaboratorSet {
    pub fn new(
        directive_dispatcher: Arc<dyn DirectiveDispatcher>,
        capability_registry: Arc<dyn CapabilityRegistry>,
        speaker_manager: Arc<dyn SpeakerManager>,
    ) -> Self {
        Self {
            directive_dispatcher,
            capability_registry,
            speaker_manager,
            message_sender: None,
            focus_manager: None,
            context_manager: None,
            attachment_manager: None,
            exception_reporter: None,
            ux_aggregator: None,
        }
    }

    pub fn with_message_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.message_sender = Some(sender);
        self
    }

    pub fn with_focus_manager(mut self, focus_manager: Arc<dyn FocusManager>) -> Self {
        self.focus_manager = Some(focus_manager);
        self
    }

    pub fn with_context_manager(mut self, context_manager: Arc<dyn ContextManager>) -> Self {
        self.context_manager = Some(context_manager);
        self
    }

    pub fn with_attachment_manager(mut self, attachment_manager: Arc<dyn AttachmentManager>) -> Self {
        self.attachment_manager = Some(attachment_manager);
        self
    }

    pub fn with_exception_reporter(mut self, reporter: Arc<dyn ExceptionReporter>) -> Self {
        self.exception_reporter = Some(reporter);
        self
    }

    pub fn with_ux_aggregator(mut self, aggregator: Arc<dyn SpeechSynthesizerObserver>) -> Self {
        self.ux_aggregator = Some(aggregator);
        self
    }
}

/// Lifecycle of a [`SpeechSynthesizerEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    ShuttingDown,
    Shutdown,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Creates the speech synthesizer agent, registers it with the dispatcher,
/// the capability registry and the UX aggregator, and tears it down again.
pub struct SpeechSynthesizerEngine {
    platform: Arc<dyn AudioChannelPlatform>,
    audio_channel: Arc<AudioChannel>,
    config: SpeechConfig,
    agent: Option<Arc<SpeechSynthesizer>>,
    state: EngineState,
    failure: Option<String>,
}

impl SpeechSynthesizerEngine {
    pub fn new(platform: Arc<dyn AudioChannelPlatform>) -> Self {
        Self::with_config(platform, SpeechConfig::default())
    }

    pub fn with_config(platform: Arc<dyn AudioChannelPlatform>, config: SpeechConfig) -> Self {
        let audio_channel = AudioChannel::new(Arc::clone(&platform), TAG);
        Self {
            platform,
            audio_channel,
            config,
            agent: None,
            state: EngineState::Uninitialized,
            failure: None,
        }
    }

    /// Build and initialize an engine; `None` if any wiring step fails.
    pub fn create(
        platform: Arc<dyn AudioChannelPlatform>,
        collaborators: &CollaboratorSet,
    ) -> Option<Self> {
        Self::create_with_config(platform, collaborators, SpeechConfig::default())
    }

    pub fn create_with_config(
        platform: Arc<dyn AudioChannelPlatform>,
        collaborators: &CollaboratorSet,
        config: SpeechConfig,
    ) -> Option<Self> {
        let mut engine = Self::with_config(platform, config);
        if !engine.initialize(collaborators) {
            error!(target: "speech_engine", tag = TAG, reason = "initializeSpeechSynthesizerEngineFailed", "create");
            return None;
        }
        Some(engine)
    }

    /// Run the wiring steps once. Stops at the first failure without undoing
    /// the steps that already succeeded.
    pub fn initialize(&mut self, collaborators: &CollaboratorSet) -> bool {
        if self.state != EngineState::Uninitialized {
            warn!(target: "speech_engine", tag = TAG, state = %self.state, "initialize called twice");
            return false;
        }
        self.state = EngineState::Initializing;
        match self.wire(collaborators) {
            Ok(()) => {
                self.state = EngineState::Ready;
                info!(target: "speech_engine", tag = TAG, "Speech synthesizer engine ready");
                true
            }
            Err(e) => {
                let reason = e.reason();
                error!(target: "speech_engine", tag = TAG, reason = %reason, "initialize");
                self.failure = Some(reason);
                self.state = EngineState::Failed;
                false
            }
        }
    }

    fn wire(&mut self, c: &CollaboratorSet) -> Result<()> {
        self.audio_channel
            .initialize(Arc::clone(&c.speaker_manager))
            .map_err(|_| EngineError::initialization("initializeAudioChannelFailed"))?;

        let media_player: Arc<dyn MediaPlayer> = self.audio_channel.clone();
        let services = SpeechSynthesizerServices {
            media_player: Some(media_player),
            message_sender: c.message_sender.clone(),
            focus_manager: c.focus_manager.clone(),
            context_manager: c.context_manager.clone(),
            attachment_manager: c.attachment_manager.clone(),
            exception_reporter: c.exception_reporter.clone(),
            ux_observer: c.ux_aggregator.clone(),
        };
        let agent = SpeechSynthesizer::create(services, self.config.clone())
            .ok_or(EngineError::initialization("couldNotCreateCapabilityAgent"))?;
        // Kept even if a later step fails so shutdown can release it
        self.agent = Some(Arc::clone(&agent));

        if let Some(ux) = &c.ux_aggregator {
            agent.add_observer(Arc::clone(ux));
        }

        if !c.directive_dispatcher.add_directive_handler(agent.clone()) {
            return Err(EngineError::initialization("addDirectiveHandlerFailed"));
        }

        if !c.capability_registry.register_capability(agent) {
            return Err(EngineError::initialization("registerCapabilityFailed"));
        }

        Ok(())
    }

    /// Shut down the audio channel, then the agent. Idempotent and safe in any state.
    pub fn shutdown(&mut self) {
        if matches!(self.state, EngineState::ShuttingDown | EngineState::Shutdown) {
            debug!(target: "speech_engine", tag = TAG, "Already shut down");
            return;
        }
        info!(target: "speech_engine", tag = TAG, from = %self.state, "Shutting down");
        self.state = EngineState::ShuttingDown;

        self.audio_channel.shutdown();
        if let Some(agent) = self.agent.take() {
            agent.shutdown();
        }

        self.state = EngineState::Shutdown;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Log reason of the failed wiring step, if initialization failed
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn agent(&self) -> Option<&Arc<SpeechSynthesizer>> {
        self.agent.as_ref()
    }

    pub fn audio_channel(&self) -> &Arc<AudioChannel> {
        &self.audio_channel
    }

    pub fn platform(&self) -> &Arc<dyn AudioChannelPlatform> {
        &self.platform
    }
}
