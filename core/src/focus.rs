// Audio focus arbitration
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::utils::lock;

pub const DIALOG_CHANNEL: &str = "Dialog";
pub const ALERTS_CHANNEL: &str = "Alerts";
pub const CONTENT_CHANNEL: &str = "Content";

/// Focus a channel observer currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusState {
    Foreground,
    Background,
    None,
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FocusState::Foreground => "FOREGROUND",
            FocusState::Background => "BACKGROUND",
            FocusState::None => "NONE",
        };
        f.write_str(s)
    }
}

/// Notified when the focus of an acquired channel changes
pub trait ChannelObserver: Send + Sync {
    fn on_focus_changed(&self, focus: FocusState);
}

pub trait FocusManager: Send + Sync {
    fn acquire_channel(
        &self,
        channel: &str,
        observer: Arc<dyn ChannelObserver>,
        interface: &str,
    ) -> bool;

    fn release_channel(&self, channel: &str, observer: &Arc<dyn ChannelObserver>) -> bool;

    /// Drop whoever holds the foreground channel
    fn stop_foreground_activity(&self);
}

fn same_observer(a: &Arc<dyn ChannelObserver>, b: &Arc<dyn ChannelObserver>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

struct Channel {
    name: String,
    priority: u32,
    owner: Option<Arc<dyn ChannelObserver>>,
    interface: String,
    focus: FocusState,
}

type Notification = (Arc<dyn ChannelObserver>, FocusState);

/// Focus manager where the active channel with the lowest priority value wins
pub struct PriorityFocusManager {
    channels: Mutex<Vec<Channel>>,
}

impl Default for PriorityFocusManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityFocusManager {
    pub fn new() -> Self {
        Self::with_channels(default_channel_priorities())
    }

    pub fn with_channels(priorities: HashMap<String, u32>) -> Self {
        let mut channels: Vec<Channel> = priorities
            .into_iter()
            .map(|(name, priority)| Channel {
                name,
                priority,
                owner: None,
                interface: String::new(),
                focus: FocusState::None,
            })
            .collect();
        channels.sort_by_key(|c| c.priority);
        Self {
            channels: Mutex::new(channels),
        }
    }

    /// Current focus of a channel, `None` for unknown channels
    pub fn channel_focus(&self, channel: &str) -> Option<FocusState> {
        lock(&self.channels)
            .iter()
            .find(|c| c.name == channel)
            .map(|c| c.focus)
    }

    /// Interface holding the channel, if any
    pub fn channel_owner(&self, channel: &str) -> Option<String> {
        lock(&self.channels)
            .iter()
            .find(|c| c.name == channel && c.owner.is_some())
            .map(|c| c.interface.clone())
    }

    fn notify(notifications: Vec<Notification>) {
        for (observer, focus) in notifications {
            observer.on_focus_changed(focus);
        }
    }
}

/// Recompute focus for every channel and return the observers whose focus changed.
fn recompute(channels: &mut [Channel]) -> Vec<Notification> {
    let winner = channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.owner.is_some())
        .min_by_key(|(_, c)| c.priority)
        .map(|(i, _)| i);

    let mut changed = Vec::new();
    for (i, c) in channels.iter_mut().enumerate() {
        let next = match (&c.owner, winner) {
            (None, _) => FocusState::None,
            (Some(_), Some(w)) if w == i => FocusState::Foreground,
            (Some(_), _) => FocusState::Background,
        };
        if next != c.focus {
            c.focus = next;
            if let Some(owner) = &c.owner {
                changed.push((Arc::clone(owner), next));
            }
        }
    }
    changed
}

impl FocusManager for PriorityFocusManager {
    fn acquire_channel(
        &self,
        channel: &str,
        observer: Arc<dyn ChannelObserver>,
        interface: &str,
    ) -> bool {
        let notifications = {
            let mut channels = lock(&self.channels);
            let Some(slot) = channels.iter_mut().find(|c| c.name == channel) else {
                warn!(target: "focus_manager", channel = %channel, "Unknown channel");
                return false;
            };

            let mut notifications = Vec::new();
            if let Some(previous) = slot.owner.take() {
                if !same_observer(&previous, &observer) {
                    debug!(target: "focus_manager", channel = %channel, evicted = %slot.interface, "Evicting channel owner");
                    notifications.push((previous, FocusState::None));
                    slot.focus = FocusState::None;
                }
            }
            slot.owner = Some(observer);
            slot.interface = interface.to_string();
            info!(target: "focus_manager", channel = %channel, interface = %interface, "Channel acquired");

            notifications.extend(recompute(&mut channels));
            notifications
        };
        Self::notify(notifications);
        true
    }

    fn release_channel(&self, channel: &str, observer: &Arc<dyn ChannelObserver>) -> bool {
        let notifications = {
            let mut channels = lock(&self.channels);
            let Some(slot) = channels.iter_mut().find(|c| c.name == channel) else {
                return false;
            };
            match &slot.owner {
                Some(owner) if same_observer(owner, observer) => {}
                _ => return false,
            }
            let released = slot.owner.take();
            slot.interface.clear();
            slot.focus = FocusState::None;
            info!(target: "focus_manager", channel = %channel, "Channel released");

            let mut notifications = Vec::new();
            if let Some(owner) = released {
                notifications.push((owner, FocusState::None));
            }
            notifications.extend(recompute(&mut channels));
            notifications
        };
        Self::notify(notifications);
        true
    }

    fn stop_foreground_activity(&self) {
        let notifications = {
            let mut channels = lock(&self.channels);
            let Some(slot) = channels
                .iter_mut()
                .find(|c| c.focus == FocusState::Foreground)
            else {
                return;
            };
            info!(target: "focus_manager", channel = %slot.name, "Stopping foreground activity");
            let stopped = slot.owner.take();
            slot.interface.clear();
            slot.focus = FocusState::None;

            let mut notifications = Vec::new();
            if let Some(owner) = stopped {
                notifications.push((owner, FocusState::None));
            }
            notifications.extend(recompute(&mut channels));
            notifications
        };
        Self::notify(notifications);
    }
}

pub fn default_channel_priorities() -> HashMap<String, u32> {
    HashMap::from([
        (DIALOG_CHANNEL.to_string(), 100),
        (ALERTS_CHANNEL.to_string(), 200),
        (CONTENT_CHANNEL.to_string(), 300),
    ])
}
