mod common;

use std::sync::{Arc, Mutex};

use common::{capture_logs, speak, FakePlatform, Harness};
use mockall::mock;
use vocal_core::{
    CapabilityConfigurationProvider, CapabilityRegistry, ChannelObserver, DirectiveDispatcher,
    DirectiveHandler, FocusManager, PriorityFocusManager, Speaker, SpeakerManager,
    SpeechSynthesizerObserver,
};
use vocal_speech::{EngineState, SpeechSynthesizerEngine};

mock! {
    pub Dispatcher {}
    impl DirectiveDispatcher for Dispatcher {
        fn add_directive_handler(&self, handler: Arc<dyn DirectiveHandler>) -> bool;
        fn remove_directive_handler(&self, handler: &Arc<dyn DirectiveHandler>) -> bool;
    }
}

type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// Speaker manager that only records calls
struct RecordingSpeakers(CallLog);

impl SpeakerManager for RecordingSpeakers {
    fn add_speaker(&self, _speaker: Arc<dyn Speaker>) -> bool {
        self.0.lock().unwrap().push("add_speaker");
        true
    }

    fn remove_speaker(&self, _speaker: &Arc<dyn Speaker>) -> bool {
        self.0.lock().unwrap().push("remove_speaker");
        true
    }
}

/// Priority focus manager that records acquire and release calls
struct RecordingFocus {
    log: CallLog,
    inner: PriorityFocusManager,
}

impl FocusManager for RecordingFocus {
    fn acquire_channel(
        &self,
        channel: &str,
        observer: Arc<dyn ChannelObserver>,
        interface: &str,
    ) -> bool {
        self.log.lock().unwrap().push("acquire_channel");
        self.inner.acquire_channel(channel, observer, interface)
    }

    fn release_channel(&self, channel: &str, observer: &Arc<dyn ChannelObserver>) -> bool {
        self.log.lock().unwrap().push("release_channel");
        self.inner.release_channel(channel, observer)
    }

    fn stop_foreground_activity(&self) {
        self.inner.stop_foreground_activity();
    }
}

mock! {
    pub Registry {}
    impl CapabilityRegistry for Registry {
        fn register_capability(&self, provider: Arc<dyn CapabilityConfigurationProvider>) -> bool;
    }
}

#[test]
fn create_registers_agent_exactly_once() {
    let h = Harness::new();
    let engine = SpeechSynthesizerEngine::create(h.platform_dyn(), &h.collaborators)
        .expect("engine should be created");

    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.failure_reason(), None);

    assert_eq!(h.sequencer.handler_count(), 1);
    assert_eq!(h.sequencer.routes().len(), 1);
    assert_eq!(h.sequencer.routes()[0].to_string(), "SpeechSynthesizer.Speak");

    let registered = h.delegate.registered();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].interface_name, "SpeechSynthesizer");
    assert_eq!(registered[0].version, "1.0");

    // Added by the factory and again by the engine; still one entry
    let agent = engine.agent().unwrap();
    let ux: Arc<dyn SpeechSynthesizerObserver> = h.ux.clone();
    assert_eq!(agent.observer_count(), 1);
    assert!(agent.has_observer(&ux));

    assert!(engine.audio_channel().is_initialized());
    assert_eq!(h.speakers.speaker_count(), 1);
}

#[test]
fn missing_message_sender_fails_agent_construction() {
    let mut h = Harness::new();
    h.collaborators.message_sender = None;

    let (engine, logs) =
        capture_logs(|| SpeechSynthesizerEngine::create(h.platform_dyn(), &h.collaborators));

    assert!(engine.is_none());
    assert_eq!(logs.matches("couldNotCreateCapabilityAgent").count(), 1);
    assert!(logs.contains("initializeSpeechSynthesizerEngineFailed"));
    assert_eq!(h.sequencer.handler_count(), 0);
    assert!(h.delegate.registered().is_empty());
}

#[test]
fn failed_initialize_keeps_earlier_steps_and_shutdown_is_safe() {
    let mut h = Harness::new();
    h.collaborators.focus_manager = None;

    let mut engine = SpeechSynthesizerEngine::new(h.platform_dyn());
    assert!(!engine.initialize(&h.collaborators));
    assert_eq!(engine.state(), EngineState::Failed);
    assert_eq!(engine.failure_reason(), Some("couldNotCreateCapabilityAgent"));
    assert!(engine.agent().is_none());

    // The audio channel step ran and is not rolled back
    assert_eq!(h.speakers.speaker_count(), 1);

    engine.shutdown();
    assert_eq!(engine.state(), EngineState::Shutdown);
    assert_eq!(h.speakers.speaker_count(), 0);
}

#[test]
fn dispatcher_rejection_stops_before_capability_registration() {
    let h = Harness::new();

    let mut dispatcher = MockDispatcher::new();
    dispatcher
        .expect_add_directive_handler()
        .times(1)
        .returning(|_| false);
    let mut registry = MockRegistry::new();
    registry.expect_register_capability().times(0);

    let mut collaborators = h.collaborators.clone();
    collaborators.directive_dispatcher = Arc::new(dispatcher);
    collaborators.capability_registry = Arc::new(registry);

    let (engine, logs) =
        capture_logs(|| SpeechSynthesizerEngine::create(h.platform_dyn(), &collaborators));

    assert!(engine.is_none());
    assert_eq!(logs.matches("addDirectiveHandlerFailed").count(), 1);
}

#[test]
fn registry_rejection_leaves_dispatcher_registration_in_place() {
    let h = Harness::new();

    let mut registry = MockRegistry::new();
    registry
        .expect_register_capability()
        .times(1)
        .returning(|_| false);
    let mut collaborators = h.collaborators.clone();
    collaborators.capability_registry = Arc::new(registry);

    let mut engine = SpeechSynthesizerEngine::new(h.platform_dyn());
    assert!(!engine.initialize(&collaborators));
    assert_eq!(engine.failure_reason(), Some("registerCapabilityFailed"));

    // No rollback: the handler stays registered with the sequencer
    assert_eq!(h.sequencer.handler_count(), 1);

    let agent = Arc::clone(engine.agent().expect("agent is kept after a later failure"));
    engine.shutdown();
    assert!(agent.is_shut_down());
    assert_eq!(agent.observer_count(), 0);
}

#[test]
fn audio_channel_failure_short_circuits() {
    let h = Harness::new();
    // Platform speaker already known to the speaker manager
    assert!(h.speakers.add_speaker(h.platform.speaker_dyn()));

    let mut engine = SpeechSynthesizerEngine::new(h.platform_dyn());
    assert!(!engine.initialize(&h.collaborators));
    assert_eq!(engine.failure_reason(), Some("initializeAudioChannelFailed"));
    assert!(engine.agent().is_none());
    assert_eq!(h.sequencer.handler_count(), 0);
    assert!(h.delegate.registered().is_empty());

    engine.shutdown();
    assert_eq!(engine.state(), EngineState::Shutdown);
    // The pre-existing registration belongs to someone else
    assert_eq!(h.speakers.speaker_count(), 1);
}

#[test]
fn shutdown_without_initialize_is_safe_and_idempotent() {
    let platform = FakePlatform::new();
    let mut engine = SpeechSynthesizerEngine::new(platform);
    assert_eq!(engine.state(), EngineState::Uninitialized);

    engine.shutdown();
    engine.shutdown();
    assert_eq!(engine.state(), EngineState::Shutdown);
    assert!(!engine.audio_channel().is_initialized());
}

#[test]
fn initialize_runs_only_once() {
    let h = Harness::new();
    let mut engine = SpeechSynthesizerEngine::new(h.platform_dyn());
    assert!(engine.initialize(&h.collaborators));
    assert!(!engine.initialize(&h.collaborators));
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(h.sequencer.handler_count(), 1);
}

#[test]
fn shutdown_releases_channel_then_agent() {
    let h = Harness::new();
    let mut engine = SpeechSynthesizerEngine::create(h.platform_dyn(), &h.collaborators).unwrap();
    let agent = Arc::clone(engine.agent().unwrap());

    engine.shutdown();

    assert_eq!(engine.state(), EngineState::Shutdown);
    assert!(engine.agent().is_none());
    assert!(agent.is_shut_down());
    assert_eq!(agent.observer_count(), 0);
    assert!(!engine.audio_channel().is_initialized());
    assert_eq!(h.speakers.speaker_count(), 0);
}

#[test]
fn failed_engine_cannot_be_initialized_again() {
    let h = Harness::new();
    let mut broken = h.collaborators.clone();
    broken.focus_manager = None;

    let mut engine = SpeechSynthesizerEngine::new(h.platform_dyn());
    assert!(!engine.initialize(&broken));
    assert_eq!(engine.state(), EngineState::Failed);

    assert!(!engine.initialize(&h.collaborators));
    assert_eq!(engine.state(), EngineState::Failed);
    assert_eq!(engine.failure_reason(), Some("couldNotCreateCapabilityAgent"));
    assert!(engine.agent().is_none());
    assert_eq!(h.sequencer.handler_count(), 0);
    assert!(h.delegate.registered().is_empty());
}

#[tokio::test]
async fn shutdown_unregisters_speaker_before_agent_releases_focus() {
    let h = Harness::new();
    let log: CallLog = Arc::default();

    let mut collaborators = h.collaborators.clone();
    collaborators.speaker_manager = Arc::new(RecordingSpeakers(log.clone()));
    collaborators.focus_manager = Some(Arc::new(RecordingFocus {
        log: log.clone(),
        inner: PriorityFocusManager::new(),
    }));

    let mut engine = SpeechSynthesizerEngine::create(h.platform_dyn(), &collaborators).unwrap();
    h.sequencer
        .dispatch(speak("msg-1", "tok-1", "https://example.com/a.mp3"))
        .await
        .unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["add_speaker", "acquire_channel"]);

    engine.shutdown();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["add_speaker", "acquire_channel", "remove_speaker", "release_channel"]
    );
}
