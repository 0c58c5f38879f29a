//! Everything that flows into the controller loop.
//!
//! Sinks, engines and timers never touch player state directly.  They push a
//! [`PlayerEvent`] tagged with the [`Generation`] they were created for, and the
//! loop drops the event if that generation is no longer current.

use std::fmt;

use tokio::sync::mpsc;

/// Identifies one session (or the idle gap between sessions).  Strictly
/// increasing over the life of a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Notifications a sink emits about its media element.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// Metadata loaded; the source can play.
    Ready,
    Error(String),
    VolumeChanged { level: f32, muted: bool },
    PauseChanged(bool),
    TimeUpdate {
        position_secs: Option<f64>,
        duration_secs: Option<f64>,
    },
    Ended,
}

/// Terminal signals from an adaptive-stream engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// Manifest fetched and understood; `media_url` is the rendition to play.
    ManifestParsed { media_url: String },
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Sink {
        generation: Generation,
        event: SinkEvent,
    },
    Engine {
        generation: Generation,
        signal: EngineSignal,
    },
    WatchdogFired {
        generation: Generation,
    },
    /// Platform fullscreen-change notification.  Belongs to the container,
    /// not to a session.
    FullscreenChanged(bool),
}

impl PlayerEvent {
    pub fn generation(&self) -> Option<Generation> {
        match self {
            PlayerEvent::Sink { generation, .. }
            | PlayerEvent::Engine { generation, .. }
            | PlayerEvent::WatchdogFired { generation } => Some(*generation),
            PlayerEvent::FullscreenChanged(_) => None,
        }
    }
}

pub type EventSender = mpsc::Sender<PlayerEvent>;
pub type EventReceiver = mpsc::Receiver<PlayerEvent>;

/// Queue depth of the player event channel.
pub const EVENT_QUEUE_DEPTH: usize = 256;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_QUEUE_DEPTH)
}
