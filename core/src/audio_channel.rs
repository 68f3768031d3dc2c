//! Shared audio-channel base for capability agents that play audio.
//!
//! An [`AudioChannel`] sits between the application's platform handler and the
//! capability agent:
//! - the agent drives playback through the [`MediaPlayer`] trait
//! - the platform reports progress through a [`MediaEventSink`]
//! - the platform speaker is registered with the speaker manager on `initialize`
//!   and removed again on `shutdown`

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::speaker::{Speaker, SpeakerManager};
use crate::utils::lock;
use crate::{EngineError, Result};

/// Audio handed to the platform for playback
#[derive(Clone, PartialEq, Eq)]
pub enum AudioSource {
    Url(String),
    Bytes(Vec<u8>),
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            AudioSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

/// Playback progress reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaState {
    Playing,
    Stopped,
    Finished,
    Error(String),
}

/// Implemented by the application's platform handler
pub trait AudioChannelPlatform: Send + Sync {
    /// Load `source`; playback progress must be reported through `events`.
    fn prepare(&self, source: AudioSource, events: MediaEventSink) -> bool;
    fn play(&self) -> bool;
    fn stop(&self) -> bool;
    fn position(&self) -> Duration;
    fn speaker(&self) -> Arc<dyn Speaker>;
}

pub trait MediaPlayerObserver: Send + Sync {
    fn on_playback_started(&self);
    fn on_playback_finished(&self);
    fn on_playback_stopped(&self);
    fn on_playback_error(&self, error: &str);
}

/// Player interface the capability agent uses
pub trait MediaPlayer: Send + Sync {
    fn set_observer(&self, observer: Option<Weak<dyn MediaPlayerObserver>>);
    fn prepare(&self, source: AudioSource) -> bool;
    fn play(&self) -> bool;
    fn stop(&self) -> bool;
    fn position(&self) -> Duration;
}

/// Handle the platform uses to report media state back to its channel
#[derive(Clone)]
pub struct MediaEventSink {
    channel: Weak<AudioChannel>,
}

impl MediaEventSink {
    /// Returns false once the channel is gone.
    pub fn report(&self, state: MediaState) -> bool {
        match self.channel.upgrade() {
            Some(channel) => {
                channel.media_state_changed(state);
                true
            }
            None => false,
        }
    }
}

struct SpeakerRegistration {
    manager: Arc<dyn SpeakerManager>,
    speaker: Arc<dyn Speaker>,
}

pub struct AudioChannel {
    tag: String,
    platform: Arc<dyn AudioChannelPlatform>,
    this: Weak<AudioChannel>,
    observer: Mutex<Option<Weak<dyn MediaPlayerObserver>>>,
    registration: Mutex<Option<SpeakerRegistration>>,
    active: AtomicBool,
    shut_down: AtomicBool,
}

impl AudioChannel {
    pub fn new(platform: Arc<dyn AudioChannelPlatform>, tag: impl Into<String>) -> Arc<Self> {
        let tag = tag.into();
        Arc::new_cyclic(|this| Self {
            tag,
            platform,
            this: this.clone(),
            observer: Mutex::new(None),
            registration: Mutex::new(None),
            active: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn platform(&self) -> &Arc<dyn AudioChannelPlatform> {
        &self.platform
    }

    /// Register the platform speaker with the speaker manager
    pub fn initialize(&self, speaker_manager: Arc<dyn SpeakerManager>) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::ShutDown);
        }
        let mut registration = lock(&self.registration);
        if registration.is_some() {
            warn!(target: "audio_channel", tag = %self.tag, "Audio channel already initialized");
            return Err(EngineError::initialization("initializeAudioChannelFailed"));
        }
        let speaker = self.platform.speaker();
        if !speaker_manager.add_speaker(Arc::clone(&speaker)) {
            return Err(EngineError::initialization("initializeAudioChannelFailed"));
        }
        *registration = Some(SpeakerRegistration {
            manager: speaker_manager,
            speaker,
        });
        info!(target: "audio_channel", tag = %self.tag, "Audio channel initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.registration).is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Relay a platform state report to the observer
    pub fn media_state_changed(&self, state: MediaState) {
        if self.shut_down.load(Ordering::SeqCst) {
            debug!(target: "audio_channel", tag = %self.tag, ?state, "Ignoring media state after shutdown");
            return;
        }
        debug!(target: "audio_channel", tag = %self.tag, ?state, "Media state changed");
        self.active
            .store(matches!(state, MediaState::Playing), Ordering::SeqCst);

        // Upgrade outside the lock; observers may call back into the channel
        let observer = lock(&self.observer).as_ref().and_then(Weak::upgrade);
        let Some(observer) = observer else {
            return;
        };
        match state {
            MediaState::Playing => observer.on_playback_started(),
            MediaState::Stopped => observer.on_playback_stopped(),
            MediaState::Finished => observer.on_playback_finished(),
            MediaState::Error(e) => observer.on_playback_error(&e),
        }
    }

    /// Stop playback, drop the observer, unregister the speaker. Safe to call repeatedly.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(target: "audio_channel", tag = %self.tag, "Audio channel shutting down");
        if self.active.swap(false, Ordering::SeqCst) {
            self.platform.stop();
        }
        lock(&self.observer).take();
        if let Some(reg) = lock(&self.registration).take() {
            if !reg.manager.remove_speaker(&reg.speaker) {
                warn!(target: "audio_channel", tag = %self.tag, "Speaker was not registered");
            }
        }
    }
}

impl MediaPlayer for AudioChannel {
    fn set_observer(&self, observer: Option<Weak<dyn MediaPlayerObserver>>) {
        *lock(&self.observer) = observer;
    }

    fn prepare(&self, source: AudioSource) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }
        let events = MediaEventSink {
            channel: self.this.clone(),
        };
        self.platform.prepare(source, events)
    }

    fn play(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst) && self.platform.play()
    }

    fn stop(&self) -> bool {
        self.platform.stop()
    }

    fn position(&self) -> Duration {
        self.platform.position()
    }
}
