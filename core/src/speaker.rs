use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::utils::lock;

pub const MAX_VOLUME: u8 = 100;

/// Volume group a speaker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakerType {
    Avs,
    Alerts,
}

/// Platform speaker controlled through the speaker manager
pub trait Speaker: Send + Sync {
    fn speaker_type(&self) -> SpeakerType;
    fn set_volume(&self, volume: u8) -> bool;
    fn set_mute(&self, mute: bool) -> bool;
}

pub trait SpeakerManager: Send + Sync {
    fn add_speaker(&self, speaker: Arc<dyn Speaker>) -> bool;
    fn remove_speaker(&self, speaker: &Arc<dyn Speaker>) -> bool;
}

fn same_speaker(a: &Arc<dyn Speaker>, b: &Arc<dyn Speaker>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Keeps every speaker of a type at the same volume and mute setting
#[derive(Default)]
pub struct DefaultSpeakerManager {
    speakers: Mutex<Vec<Arc<dyn Speaker>>>,
}

impl DefaultSpeakerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speaker_count(&self) -> usize {
        lock(&self.speakers).len()
    }

    /// Apply a volume to all speakers of `speaker_type`; false if out of range or any speaker refuses
    pub fn set_volume(&self, speaker_type: SpeakerType, volume: u8) -> bool {
        if volume > MAX_VOLUME {
            warn!(target: "speaker_manager", volume, "Volume out of range");
            return false;
        }
        let speakers = self.of_type(speaker_type);
        info!(target: "speaker_manager", ?speaker_type, volume, count = speakers.len(), "Setting volume");
        speakers
            .iter()
            .fold(true, |ok, s| s.set_volume(volume) && ok)
    }

    pub fn set_mute(&self, speaker_type: SpeakerType, mute: bool) -> bool {
        self.of_type(speaker_type)
            .iter()
            .fold(true, |ok, s| s.set_mute(mute) && ok)
    }

    fn of_type(&self, speaker_type: SpeakerType) -> Vec<Arc<dyn Speaker>> {
        lock(&self.speakers)
            .iter()
            .filter(|s| s.speaker_type() == speaker_type)
            .cloned()
            .collect()
    }
}

impl SpeakerManager for DefaultSpeakerManager {
    fn add_speaker(&self, speaker: Arc<dyn Speaker>) -> bool {
        let mut speakers = lock(&self.speakers);
        if speakers.iter().any(|s| same_speaker(s, &speaker)) {
            warn!(target: "speaker_manager", "Speaker already registered");
            return false;
        }
        speakers.push(speaker);
        true
    }

    fn remove_speaker(&self, speaker: &Arc<dyn Speaker>) -> bool {
        let mut speakers = lock(&self.speakers);
        let before = speakers.len();
        speakers.retain(|s| !same_speaker(s, speaker));
        before != speakers.len()
    }
}
