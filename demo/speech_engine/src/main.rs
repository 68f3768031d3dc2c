mod platform;

use std::sync::Arc;

use platform::ConsolePlatform;
use serde_json::json;
use tracing::{error, info};
use vocal_core::telemetry::init_tracing;
use vocal_core::{
    CapabilitiesDelegate, ChannelMessageSender, DefaultSpeakerManager, DialogUxState,
    DialogUxStateAggregator, Directive, DirectiveSequencer, EngineConfig,
    ExceptionEncounteredSender, InMemoryAttachmentManager, InMemoryContextManager,
    PriorityFocusManager,
};
use vocal_speech::{CollaboratorSet, SpeechSynthesizerEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = EngineConfig::load();
    init_tracing(&cfg.log_filter);

    info!(target: "speech_engine", "Starting speech engine demo");

    // Engine services
    let sequencer = Arc::new(DirectiveSequencer::new());
    let delegate = Arc::new(CapabilitiesDelegate::new());
    let speakers = Arc::new(DefaultSpeakerManager::new());
    let focus = Arc::new(PriorityFocusManager::with_channels(cfg.focus.channels.clone()));
    let context = Arc::new(InMemoryContextManager::new());
    let attachments = Arc::new(InMemoryAttachmentManager::new());
    let ux = Arc::new(DialogUxStateAggregator::new());
    let (sender, mut outbound) = ChannelMessageSender::new();
    let sender = Arc::new(sender);

    let collaborators = CollaboratorSet::new(sequencer.clone(), delegate.clone(), speakers.clone())
        .with_message_sender(sender.clone())
        .with_focus_manager(focus)
        .with_context_manager(context.clone())
        .with_attachment_manager(attachments.clone())
        .with_exception_reporter(Arc::new(ExceptionEncounteredSender::new(sender)))
        .with_ux_aggregator(ux.clone());

    let platform = Arc::new(ConsolePlatform::new());
    let Some(mut engine) =
        SpeechSynthesizerEngine::create_with_config(platform, &collaborators, cfg.speech.clone())
    else {
        error!(target: "speech_engine", "Speech synthesizer engine could not be created");
        return Err("engine creation failed".into());
    };

    info!(
        target: "speech_engine",
        capabilities = %delegate.capabilities_document(),
        "Capabilities registered"
    );

    // Print outbound events as the transport would see them
    let printer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            info!(target: "speech_engine", event = %msg.json_content, "Outbound event");
        }
    });

    // Speech audio arrives as a directive attachment
    attachments.insert("speech-0001", vec![0u8; 16_000]);
    let speak = Directive {
        namespace: "SpeechSynthesizer".into(),
        name: "Speak".into(),
        message_id: "msg-0001".into(),
        dialog_request_id: "dialog-0001".into(),
        payload: json!({
            "token": "demo-token",
            "url": "cid:speech-0001",
            "format": "AUDIO_MPEG",
        }),
    };

    let mut ux_rx = ux.subscribe();
    ux.on_request_processing_started();
    sequencer.dispatch(speak).await?;

    // Wait for the dialog to go back to idle
    let wait = async {
        loop {
            if *ux_rx.borrow_and_update() == DialogUxState::Idle {
                break;
            }
            if ux_rx.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(std::time::Duration::from_secs(10), wait)
        .await
        .is_err()
    {
        error!(target: "speech_engine", "Timed out waiting for speech to finish");
    }

    info!(target: "speech_engine", context = %context.context(), "Final context");

    engine.shutdown();
    sequencer.shutdown();
    printer.abort();

    info!(target: "speech_engine", "Speech engine demo finished");
    Ok(())
}
