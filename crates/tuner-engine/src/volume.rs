//! Volume and mute, bound both ways to the sink.
//!
//! Commands go to the sink only.  `VolumeState` changes when the sink reports
//! back, so the state shown is always what the sink actually did.

use tracing::debug;
use tuner_proto::protocol::VolumeState;

use crate::sink::Sink;

/// Normalise a 0-100 percentage to the sink's linear [0, 1] scale.
pub fn percent_to_level(percent: f32) -> f32 {
    if percent.is_nan() {
        return 0.0;
    }
    (percent / 100.0).clamp(0.0, 1.0)
}

#[derive(Debug, Default)]
pub struct VolumeManager {
    state: VolumeState,
}

impl VolumeManager {
    pub fn new(initial: VolumeState) -> Self {
        Self { state: initial }
    }

    /// Seed from whatever the sink currently holds.
    pub fn from_sink(sink: &dyn Sink) -> Self {
        Self::new(VolumeState {
            level: sink.volume(),
            muted: sink.muted(),
        })
    }

    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Level only.  Zero is a level, not a mute.
    pub fn set_volume(&self, percent: f32, sink: &mut dyn Sink) {
        let level = percent_to_level(percent);
        debug!("volume: set {:.2}", level);
        sink.set_volume(level);
    }

    pub fn toggle_mute(&self, sink: &mut dyn Sink) {
        let muted = !sink.muted();
        sink.set_muted(muted);
    }

    pub fn set_muted(&self, muted: bool, sink: &mut dyn Sink) {
        sink.set_muted(muted);
    }

    /// Sink notification.  Returns true if the state changed.
    pub fn on_sink_change(&mut self, level: f32, muted: bool) -> bool {
        let next = VolumeState {
            level: level.clamp(0.0, 1.0),
            muted,
        };
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }
}
