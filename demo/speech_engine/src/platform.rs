//! Console platform handler: "plays" speech by logging it and reporting
//! progress after a delay proportional to the audio size.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};
use vocal_core::{
    lock, AudioChannelPlatform, AudioSource, MediaEventSink, MediaState, Speaker, SpeakerType,
};

/// Bytes "played" per millisecond of simulated speech
const BYTES_PER_MS: usize = 32;

struct ConsoleSpeaker {
    volume: AtomicU8,
    muted: AtomicBool,
}

impl Speaker for ConsoleSpeaker {
    fn speaker_type(&self) -> SpeakerType {
        SpeakerType::Avs
    }

    fn set_volume(&self, volume: u8) -> bool {
        info!(target: "console_platform", volume, "Volume changed");
        self.volume.store(volume, Ordering::SeqCst);
        true
    }

    fn set_mute(&self, mute: bool) -> bool {
        info!(target: "console_platform", mute, "Mute changed");
        self.muted.store(mute, Ordering::SeqCst);
        true
    }
}

#[derive(Default)]
struct Playback {
    source: Option<AudioSource>,
    sink: Option<MediaEventSink>,
    started: Option<Instant>,
    task: Option<tokio::task::JoinHandle<()>>,
}

pub struct ConsolePlatform {
    speaker: Arc<ConsoleSpeaker>,
    playback: Mutex<Playback>,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self {
            speaker: Arc::new(ConsoleSpeaker {
                volume: AtomicU8::new(50),
                muted: AtomicBool::new(false),
            }),
            playback: Mutex::new(Playback::default()),
        }
    }

    fn playback(&self) -> std::sync::MutexGuard<'_, Playback> {
        lock(&self.playback)
    }
}

impl AudioChannelPlatform for ConsolePlatform {
    fn prepare(&self, source: AudioSource, events: MediaEventSink) -> bool {
        info!(target: "console_platform", ?source, "Prepared speech");
        let mut pb = self.playback();
        pb.source = Some(source);
        pb.sink = Some(events);
        true
    }

    fn play(&self) -> bool {
        let mut pb = self.playback();
        let (Some(source), Some(sink)) = (pb.source.clone(), pb.sink.clone()) else {
            warn!(target: "console_platform", "play without prepare");
            return false;
        };
        let duration = match &source {
            AudioSource::Bytes(b) => Duration::from_millis((b.len() / BYTES_PER_MS) as u64),
            AudioSource::Url(_) => Duration::from_millis(500),
        };
        pb.started = Some(Instant::now());
        pb.task = Some(tokio::spawn(async move {
            sink.report(MediaState::Playing);
            tokio::time::sleep(duration).await;
            sink.report(MediaState::Finished);
        }));
        info!(target: "console_platform", ?duration, "Speaking");
        true
    }

    fn stop(&self) -> bool {
        let mut pb = self.playback();
        if let Some(task) = pb.task.take() {
            task.abort();
        }
        pb.started = None;
        if let Some(sink) = pb.sink.clone() {
            drop(pb);
            sink.report(MediaState::Stopped);
        }
        true
    }

    fn position(&self) -> Duration {
        self.playback()
            .started
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    fn speaker(&self) -> Arc<dyn Speaker> {
        self.speaker.clone()
    }
}
