//! Speech synthesizer capability agent.
//!
//! Handles `SpeechSynthesizer.Speak`: acquires the dialog channel, hands the
//! audio to the media player, reports `SpeechStarted`/`SpeechFinished` and
//! keeps the `SpeechState` context current. Observers (typically the dialog
//! UX aggregator) are told about every state change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use vocal_core::attachment::content_id;
use vocal_core::{
    AttachmentManager, AudioSource, CapabilityConfiguration, CapabilityConfigurationProvider,
    ChannelObserver, ContextManager, Directive, DirectiveHandler, EngineError,
    ExceptionErrorType, ExceptionReporter, FocusManager, FocusState, MediaPlayer,
    MediaPlayerObserver, MessageRequest, MessageSender, NamespaceAndName, Result, SpeechConfig,
    SpeechSynthesizerObserver, SpeechSynthesizerState, lock,
};

pub const NAMESPACE: &str = "SpeechSynthesizer";
pub const SPEAK: &str = "Speak";
pub const SPEECH_STARTED: &str = "SpeechStarted";
pub const SPEECH_FINISHED: &str = "SpeechFinished";
pub const SPEECH_STATE: &str = "SpeechState";

/// Collaborators handed to [`SpeechSynthesizer::create`]; every field except
/// `attachment_manager` is required.
#[derive(Default)]
pub struct SpeechSynthesizerServices {
    pub media_player: Option<Arc<dyn MediaPlayer>>,
    pub message_sender: Option<Arc<dyn MessageSender>>,
    pub focus_manager: Option<Arc<dyn FocusManager>>,
    pub context_manager: Option<Arc<dyn ContextManager>>,
    pub attachment_manager: Option<Arc<dyn AttachmentManager>>,
    pub exception_reporter: Option<Arc<dyn ExceptionReporter>>,
    pub ux_observer: Option<Arc<dyn SpeechSynthesizerObserver>>,
}

#[derive(Debug, Deserialize)]
struct SpeakPayload {
    #[serde(default)]
    token: String,
    url: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Clone)]
struct SpeakInfo {
    message_id: String,
    token: String,
    source: AudioSource,
}

struct Inner {
    current: Option<SpeakInfo>,
    state: SpeechSynthesizerState,
    focus: FocusState,
}

fn same_observer(a: &Arc<dyn SpeechSynthesizerObserver>, b: &Arc<dyn SpeechSynthesizerObserver>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

pub struct SpeechSynthesizer {
    me: Weak<SpeechSynthesizer>,
    config: SpeechConfig,
    media_player: Arc<dyn MediaPlayer>,
    message_sender: Arc<dyn MessageSender>,
    focus_manager: Arc<dyn FocusManager>,
    context_manager: Arc<dyn ContextManager>,
    attachment_manager: Option<Arc<dyn AttachmentManager>>,
    exception_reporter: Arc<dyn ExceptionReporter>,
    observers: Mutex<Vec<Arc<dyn SpeechSynthesizerObserver>>>,
    inner: Mutex<Inner>,
    shut_down: AtomicBool,
}

impl SpeechSynthesizer {
    /// Build the agent, or `None` when a required collaborator is missing.
    pub fn create(services: SpeechSynthesizerServices, config: SpeechConfig) -> Option<Arc<Self>> {
        let SpeechSynthesizerServices {
            media_player,
            message_sender,
            focus_manager,
            context_manager,
            attachment_manager,
            exception_reporter,
            ux_observer,
        } = services;

        let Some(media_player) = media_player else {
            warn!(target: "speech_synthesizer", reason = "nullMediaPlayer", "create failed");
            return None;
        };
        let Some(message_sender) = message_sender else {
            warn!(target: "speech_synthesizer", reason = "nullMessageSender", "create failed");
            return None;
        };
        let Some(focus_manager) = focus_manager else {
            warn!(target: "speech_synthesizer", reason = "nullFocusManager", "create failed");
            return None;
        };
        let Some(context_manager) = context_manager else {
            warn!(target: "speech_synthesizer", reason = "nullContextManager", "create failed");
            return None;
        };
        let Some(exception_reporter) = exception_reporter else {
            warn!(target: "speech_synthesizer", reason = "nullExceptionReporter", "create failed");
            return None;
        };
        let Some(ux_observer) = ux_observer else {
            warn!(target: "speech_synthesizer", reason = "nullDialogUxStateAggregator", "create failed");
            return None;
        };

        let agent = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            media_player,
            message_sender,
            focus_manager,
            context_manager,
            attachment_manager,
            exception_reporter,
            observers: Mutex::new(vec![ux_observer]),
            inner: Mutex::new(Inner {
                current: None,
                state: SpeechSynthesizerState::Finished,
                focus: FocusState::None,
            }),
            shut_down: AtomicBool::new(false),
        });

        let observer: Weak<dyn MediaPlayerObserver> = agent.me.clone();
        agent.media_player.set_observer(Some(observer));
        agent.update_context("", "FINISHED");
        info!(target: "speech_synthesizer", channel = %agent.config.channel, "Speech synthesizer created");
        Some(agent)
    }

    /// Adding the same observer twice keeps a single entry.
    pub fn add_observer(&self, observer: Arc<dyn SpeechSynthesizerObserver>) {
        let mut observers = lock(&self.observers);
        if !observers.iter().any(|o| same_observer(o, &observer)) {
            observers.push(observer);
        }
    }

    pub fn remove_observer(&self, observer: &Arc<dyn SpeechSynthesizerObserver>) {
        lock(&self.observers).retain(|o| !same_observer(o, observer));
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn has_observer(&self, observer: &Arc<dyn SpeechSynthesizerObserver>) -> bool {
        lock(&self.observers).iter().any(|o| same_observer(o, observer))
    }

    pub fn state(&self) -> SpeechSynthesizerState {
        lock(&self.inner).state
    }

    pub fn focus(&self) -> FocusState {
        lock(&self.inner).focus
    }

    /// Token of the Speak directive in progress
    pub fn current_token(&self) -> Option<String> {
        lock(&self.inner).current.as_ref().map(|c| c.token.clone())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop any speech, release focus and drop observers. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(target: "speech_synthesizer", "Speech synthesizer shutting down");
        let interrupted = lock(&self.inner).current.take();
        if let Some(info) = interrupted {
            self.media_player.stop();
            self.update_context(&info.token, "FINISHED");
            self.release_channel();
            // Observers hear the final state before they are dropped
            self.set_state(SpeechSynthesizerState::Finished);
        }
        self.media_player.set_observer(None);
        lock(&self.observers).clear();
    }

    fn set_state(&self, state: SpeechSynthesizerState) {
        lock(&self.inner).state = state;
        // Snapshot so observers can call back into the agent
        let observers = lock(&self.observers).clone();
        for o in observers {
            o.on_state_changed(state);
        }
    }

    fn update_context(&self, token: &str, activity: &str) {
        let offset_ms = self.media_player.position().as_millis() as u64;
        let state = json!({
            "token": token,
            "offsetInMilliseconds": offset_ms,
            "playerActivity": activity,
        });
        if !self.context_manager.set_state(NAMESPACE, SPEECH_STATE, state) {
            warn!(target: "speech_synthesizer", "Context manager rejected SpeechState");
        }
    }

    fn send_event(&self, name: &str, token: &str) {
        self.message_sender
            .send_message(MessageRequest::event(NAMESPACE, name, json!({ "token": token })));
    }

    fn report(&self, directive: &Directive, error: ExceptionErrorType, message: &str) {
        let unparsed = serde_json::to_string(directive).unwrap_or_default();
        self.exception_reporter
            .send_exception_encountered(&unparsed, error, message);
    }

    fn channel_observer(&self) -> Option<Arc<dyn ChannelObserver>> {
        self.me
            .upgrade()
            .map(|me| me as Arc<dyn ChannelObserver>)
    }

    fn release_channel(&self) {
        if let Some(observer) = self.channel_observer() {
            self.focus_manager
                .release_channel(&self.config.channel, &observer);
        }
    }

    fn resolve_source(&self, url: &str) -> Option<AudioSource> {
        match content_id(url) {
            Some(cid) => self
                .attachment_manager
                .as_ref()
                .and_then(|m| m.read(cid))
                .map(AudioSource::Bytes),
            None => Some(AudioSource::Url(url.to_string())),
        }
    }

    fn handle_speak(&self, directive: &Directive) -> Result<()> {
        let payload: SpeakPayload = match serde_json::from_value(directive.payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                self.report(directive, ExceptionErrorType::UnexpectedInformationReceived, "malformed Speak payload");
                return Err(EngineError::SerializationError(e));
            }
        };
        if let Some(format) = &payload.format {
            if !self.config.supported_formats.iter().any(|f| f == format) {
                self.report(directive, ExceptionErrorType::UnsupportedOperation, "unsupported audio format");
                return Err(EngineError::Directive(format!("unsupported format {}", format)));
            }
        }
        let Some(url) = payload.url.filter(|u| !u.is_empty()) else {
            self.report(directive, ExceptionErrorType::UnexpectedInformationReceived, "missing url");
            return Err(EngineError::Directive("Speak without url".into()));
        };
        let Some(source) = self.resolve_source(&url) else {
            self.report(directive, ExceptionErrorType::InternalError, "attachment not found");
            return Err(EngineError::Directive(format!("no attachment for {}", url)));
        };

        {
            let mut inner = lock(&self.inner);
            if inner.current.is_some() {
                return Err(EngineError::Directive("speech already in progress".into()));
            }
            inner.current = Some(SpeakInfo {
                message_id: directive.message_id.clone(),
                token: payload.token.clone(),
                source,
            });
        }
        debug!(target: "speech_synthesizer", token = %payload.token, "Speak accepted");
        self.set_state(SpeechSynthesizerState::GainingFocus);

        let observer = self.channel_observer().ok_or(EngineError::ShutDown)?;
        if !self
            .focus_manager
            .acquire_channel(&self.config.channel, observer, NAMESPACE)
        {
            lock(&self.inner).current = None;
            self.report(directive, ExceptionErrorType::InternalError, "could not acquire channel");
            self.set_state(SpeechSynthesizerState::Finished);
            return Err(EngineError::Focus(format!(
                "could not acquire {}",
                self.config.channel
            )));
        }
        Ok(())
    }

    /// Clear the current speech and release focus; `finished` decides whether SpeechFinished is sent.
    fn complete(&self, finished: bool) {
        let Some(info) = lock(&self.inner).current.take() else {
            return;
        };
        self.update_context(&info.token, "FINISHED");
        if finished {
            self.send_event(SPEECH_FINISHED, &info.token);
        }
        self.release_channel();
        self.set_state(SpeechSynthesizerState::Finished);
    }
}

#[async_trait]
impl DirectiveHandler for SpeechSynthesizer {
    fn configuration(&self) -> Vec<NamespaceAndName> {
        vec![NamespaceAndName::new(NAMESPACE, SPEAK)]
    }

    async fn handle_directive(&self, directive: Directive) -> Result<()> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }
        if directive.namespace != NAMESPACE || directive.name != SPEAK {
            self.report(&directive, ExceptionErrorType::UnsupportedOperation, "unexpected directive");
            return Err(EngineError::Directive(format!(
                "unexpected directive {}",
                directive.key()
            )));
        }
        self.handle_speak(&directive)
    }

    fn cancel_directive(&self, message_id: &str) {
        let cancelled = {
            let mut inner = lock(&self.inner);
            let matches = inner
                .current
                .as_ref()
                .is_some_and(|c| c.message_id == message_id);
            if matches {
                inner.current.take()
            } else {
                None
            }
        };
        if let Some(info) = cancelled {
            debug!(target: "speech_synthesizer", token = %info.token, "Speak cancelled");
            self.media_player.stop();
            self.update_context(&info.token, "FINISHED");
            self.release_channel();
            self.set_state(SpeechSynthesizerState::Finished);
        }
    }
}

impl CapabilityConfigurationProvider for SpeechSynthesizer {
    fn capability_configurations(&self) -> Vec<CapabilityConfiguration> {
        vec![CapabilityConfiguration::interface(
            NAMESPACE,
            self.config.interface_version.clone(),
        )]
    }
}

impl ChannelObserver for SpeechSynthesizer {
    fn on_focus_changed(&self, focus: FocusState) {
        let source = {
            let mut inner = lock(&self.inner);
            inner.focus = focus;
            inner.current.as_ref().map(|c| c.source.clone())
        };
        let Some(source) = source else {
            return;
        };
        debug!(target: "speech_synthesizer", %focus, "Focus changed");
        match focus {
            FocusState::Foreground => {
                if !(self.media_player.prepare(source) && self.media_player.play()) {
                    warn!(target: "speech_synthesizer", "Media player refused to start");
                    self.complete(false);
                }
            }
            FocusState::Background | FocusState::None => {
                self.set_state(SpeechSynthesizerState::LosingFocus);
                self.media_player.stop();
            }
        }
    }
}

impl MediaPlayerObserver for SpeechSynthesizer {
    fn on_playback_started(&self) {
        let Some(token) = self.current_token() else {
            return;
        };
        self.set_state(SpeechSynthesizerState::Playing);
        self.update_context(&token, "PLAYING");
        self.send_event(SPEECH_STARTED, &token);
    }

    fn on_playback_finished(&self) {
        self.complete(true);
    }

    fn on_playback_stopped(&self) {
        self.complete(false);
    }

    fn on_playback_error(&self, error: &str) {
        warn!(target: "speech_synthesizer", error = %error, "Playback error");
        self.complete(false);
    }
}
