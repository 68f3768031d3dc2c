#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

use vocal_core::{
    AudioChannelPlatform, AudioSource, CapabilitiesDelegate, ChannelMessageSender,
    DefaultSpeakerManager, DialogUxStateAggregator, Directive, DirectiveSequencer,
    ExceptionEncounteredSender, InMemoryAttachmentManager, InMemoryContextManager,
    MediaEventSink, MediaState, MessageRequest, PriorityFocusManager, Speaker, SpeakerType,
};
use vocal_speech::CollaboratorSet;

pub struct FakeSpeaker {
    pub volume: Mutex<u8>,
}

impl Speaker for FakeSpeaker {
    fn speaker_type(&self) -> SpeakerType {
        SpeakerType::Avs
    }

    fn set_volume(&self, volume: u8) -> bool {
        *self.volume.lock().unwrap() = volume;
        true
    }

    fn set_mute(&self, _mute: bool) -> bool {
        true
    }
}

/// Platform that records calls; with `auto_start` it reports Playing from `play`
pub struct FakePlatform {
    pub speaker: Arc<FakeSpeaker>,
    pub prepared: Mutex<Vec<AudioSource>>,
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
    pub auto_start: AtomicBool,
    sink: Mutex<Option<MediaEventSink>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            speaker: Arc::new(FakeSpeaker {
                volume: Mutex::new(50),
            }),
            prepared: Mutex::new(Vec::new()),
            plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            auto_start: AtomicBool::new(true),
            sink: Mutex::new(None),
        })
    }

    pub fn speaker_dyn(&self) -> Arc<dyn Speaker> {
        self.speaker.clone()
    }

    pub fn report(&self, state: MediaState) -> bool {
        let sink = self.sink.lock().unwrap().clone();
        sink.map(|s| s.report(state)).unwrap_or(false)
    }
}

impl AudioChannelPlatform for FakePlatform {
    fn prepare(&self, source: AudioSource, events: MediaEventSink) -> bool {
        self.prepared.lock().unwrap().push(source);
        *self.sink.lock().unwrap() = Some(events);
        true
    }

    fn play(&self) -> bool {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.auto_start.load(Ordering::SeqCst) {
            self.report(MediaState::Playing);
        }
        true
    }

    fn stop(&self) -> bool {
        self.stops.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn position(&self) -> Duration {
        Duration::from_millis(0)
    }

    fn speaker(&self) -> Arc<dyn Speaker> {
        self.speaker.clone()
    }
}

/// Every in-memory collaborator plus a ready-made set
pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub sequencer: Arc<DirectiveSequencer>,
    pub delegate: Arc<CapabilitiesDelegate>,
    pub speakers: Arc<DefaultSpeakerManager>,
    pub focus: Arc<PriorityFocusManager>,
    pub context: Arc<InMemoryContextManager>,
    pub attachments: Arc<InMemoryAttachmentManager>,
    pub ux: Arc<DialogUxStateAggregator>,
    pub messages: mpsc::UnboundedReceiver<MessageRequest>,
    pub collaborators: CollaboratorSet,
}

impl Harness {
    pub fn new() -> Self {
        let platform = FakePlatform::new();
        let sequencer = Arc::new(DirectiveSequencer::new());
        let delegate = Arc::new(CapabilitiesDelegate::new());
        let speakers = Arc::new(DefaultSpeakerManager::new());
        let focus = Arc::new(PriorityFocusManager::new());
        let context = Arc::new(InMemoryContextManager::new());
        let attachments = Arc::new(InMemoryAttachmentManager::new());
        let ux = Arc::new(DialogUxStateAggregator::new());
        let (sender, messages) = ChannelMessageSender::new();
        let sender = Arc::new(sender);

        let collaborators = CollaboratorSet::new(sequencer.clone(), delegate.clone(), speakers.clone())
            .with_message_sender(sender.clone())
            .with_focus_manager(focus.clone())
            .with_context_manager(context.clone())
            .with_attachment_manager(attachments.clone())
            .with_exception_reporter(Arc::new(ExceptionEncounteredSender::new(sender)))
            .with_ux_aggregator(ux.clone());

        Self {
            platform,
            sequencer,
            delegate,
            speakers,
            focus,
            context,
            attachments,
            ux,
            messages,
            collaborators,
        }
    }

    pub fn platform_dyn(&self) -> Arc<dyn AudioChannelPlatform> {
        self.platform.clone()
    }

    pub fn drain(&mut self) -> Vec<MessageRequest> {
        let mut out = Vec::new();
        while let Ok(m) = self.messages.try_recv() {
            out.push(m);
        }
        out
    }
}

pub fn speak(message_id: &str, token: &str, url: &str) -> Directive {
    Directive {
        namespace: "SpeechSynthesizer".into(),
        name: "Speak".into(),
        message_id: message_id.into(),
        dialog_request_id: "dlg-1".into(),
        payload: json!({ "token": token, "url": url, "format": "AUDIO_MPEG" }),
    }
}

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` under a scoped subscriber and return its result with the captured log text
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buf.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
    (result, text)
}
