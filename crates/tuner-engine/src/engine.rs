//! `MediaPlaybackEngine`: one player, audio or video, selected by
//! [`PlayerCapabilities`].
//!
//! The engine owns the sink and every piece of mutable playback state.  It is
//! driven from a single loop: commands are method calls, everything else
//! arrives through [`handle_event`](MediaPlaybackEngine::handle_event).
//!
//! ```text
//!   commands ──▶ MediaPlaybackEngine ──▶ Sink / FullscreenPlatform
//!                    ▲
//!   PlayerEvent ─────┘  (sink, engine, watchdog, platform; generation-filtered)
//! ```

use std::time::Duration;

use tracing::debug;
use tuner_proto::config::{PlayerConfig, PlayerKind};
use tuner_proto::protocol::{PlaybackState, PlayerSnapshot, VolumeState};

use crate::adaptive::AdaptiveEngine;
use crate::controller::{Controller, ControllerConfig, DEFAULT_WATCHDOG};
use crate::error::{PlaybackError, SinkError};
use crate::event::{EngineSignal, EventSender, Generation, PlayerEvent, SinkEvent};
use crate::fullscreen::FullscreenCoordinator;
use crate::session::{SessionManager, SessionStats};
use crate::sink::{FullscreenPlatform, Sink};
use crate::volume::VolumeManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerCapabilities {
    pub has_visual_surface: bool,
    pub supports_fullscreen: bool,
    pub retains_session_on_power_off: bool,
}

impl PlayerCapabilities {
    pub fn for_kind(kind: PlayerKind) -> Self {
        Self {
            has_visual_surface: kind.has_visual_surface(),
            supports_fullscreen: kind.has_visual_surface(),
            retains_session_on_power_off: true,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        let mut caps = Self::for_kind(config.kind);
        if let Some(retain) = config.retains_session_on_power_off {
            caps.retains_session_on_power_off = retain;
        }
        caps
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub watchdog: Duration,
    /// Applied to the sink at construction.  `None` keeps the sink's level.
    pub initial_volume: Option<f32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            watchdog: DEFAULT_WATCHDOG,
            initial_volume: None,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            watchdog: Duration::from_secs(config.watchdog_secs),
            initial_volume: Some(config.default_volume),
        }
    }
}

pub struct MediaPlaybackEngine<S: Sink> {
    sink: S,
    caps: PlayerCapabilities,
    controller: Controller,
    volume: VolumeManager,
    fullscreen: Option<FullscreenCoordinator>,
    ended: bool,
    position_secs: Option<f64>,
    duration_secs: Option<f64>,
    rev: u64,
}

impl<S: Sink> MediaPlaybackEngine<S> {
    pub fn new(mut sink: S, caps: PlayerCapabilities, settings: EngineSettings, events: EventSender) -> Self {
        let config = ControllerConfig {
            watchdog: settings.watchdog,
            retains_session_on_power_off: caps.retains_session_on_power_off,
        };
        let mut controller = Controller::new(config, SessionManager::new(None, events));
        controller.attach(&mut sink);
        let volume = VolumeManager::from_sink(&sink);
        if let Some(level) = settings.initial_volume {
            sink.set_volume(level.clamp(0.0, 1.0));
        }
        debug!("engine: created {:?}, volume {:?}", caps, volume.state());
        Self {
            sink,
            caps,
            controller,
            volume,
            fullscreen: None,
            ended: false,
            position_secs: None,
            duration_secs: None,
            rev: 0,
        }
    }

    pub fn with_adaptive_engine(mut self, engine: Box<dyn AdaptiveEngine>) -> Self {
        self.controller.set_adaptive_engine(engine);
        self
    }

    /// Ignored unless the capabilities allow fullscreen.
    pub fn with_fullscreen(mut self, platform: Box<dyn FullscreenPlatform>) -> Self {
        if self.caps.supports_fullscreen {
            self.fullscreen = Some(FullscreenCoordinator::new(platform));
        } else {
            debug!("engine: fullscreen platform given to a player without fullscreen");
        }
        self
    }

    pub fn capabilities(&self) -> PlayerCapabilities {
        self.caps
    }

    pub fn state(&self) -> &PlaybackState {
        self.controller.state()
    }

    pub fn generation(&self) -> Generation {
        self.controller.generation()
    }

    pub fn volume(&self) -> VolumeState {
        self.volume.state()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.as_ref().is_some_and(|f| f.is_active())
    }

    pub fn session_stats(&self) -> SessionStats {
        self.controller.session_stats()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── commands ──────────────────────────────────────────────────────────────

    pub fn select_source(&mut self, url: &str) -> bool {
        self.track(|this| {
            this.ended = false;
            this.position_secs = None;
            this.duration_secs = None;
            this.controller.select_source(url, &mut this.sink);
        })
    }

    pub fn toggle_power(&mut self) -> bool {
        self.track(|this| this.controller.toggle_power(&mut this.sink))
    }

    /// `percent` is 0-100.  State follows once the sink confirms.
    pub fn set_volume(&mut self, percent: f32) {
        if !self.controller.is_disposed() {
            self.volume.set_volume(percent, &mut self.sink);
        }
    }

    pub fn toggle_mute(&mut self) {
        if !self.controller.is_disposed() {
            self.volume.toggle_mute(&mut self.sink);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if !self.controller.is_disposed() {
            self.volume.set_muted(muted, &mut self.sink);
        }
    }

    pub fn enter_fullscreen(&mut self) -> Result<(), SinkError> {
        self.fullscreen_mut()?.enter()
    }

    pub fn exit_fullscreen(&mut self) -> Result<(), SinkError> {
        self.fullscreen_mut()?.exit()
    }

    pub fn toggle_fullscreen(&mut self) -> Result<(), SinkError> {
        self.fullscreen_mut()?.toggle()
    }

    fn fullscreen_mut(&mut self) -> Result<&mut FullscreenCoordinator, SinkError> {
        if self.controller.is_disposed() {
            return Err(SinkError::Closed);
        }
        self.fullscreen.as_mut().ok_or(SinkError::Unsupported)
    }

    // ── events ────────────────────────────────────────────────────────────────

    /// Apply one event from the queue.  Returns true if the snapshot changed.
    pub fn handle_event(&mut self, event: PlayerEvent) -> bool {
        if let Some(generation) = event.generation() {
            if !self.controller.is_current(generation) {
                debug!(
                    "engine: dropping stale {:?} ({} != {})",
                    event,
                    generation,
                    self.controller.generation()
                );
                return false;
            }
        }
        self.track(|this| this.dispatch(event))
    }

    fn dispatch(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Sink { event, .. } => match event {
                SinkEvent::Ready => self.controller.on_ready(&mut self.sink),
                SinkEvent::Error(message) => self
                    .controller
                    .on_fatal(PlaybackError::NetworkOrManifest(message), &mut self.sink),
                SinkEvent::VolumeChanged { level, muted } => {
                    self.volume.on_sink_change(level, muted);
                }
                SinkEvent::PauseChanged(paused) => {
                    debug!("engine: sink paused={}", paused);
                }
                SinkEvent::TimeUpdate {
                    position_secs,
                    duration_secs,
                } => {
                    self.position_secs = position_secs;
                    self.duration_secs = duration_secs;
                }
                SinkEvent::Ended => {
                    debug!("engine: source ended");
                    self.ended = true;
                }
            },
            PlayerEvent::Engine { signal, .. } => match signal {
                EngineSignal::ManifestParsed { media_url } => {
                    self.controller.on_manifest_parsed(&media_url, &mut self.sink)
                }
                EngineSignal::Fatal(message) => self
                    .controller
                    .on_fatal(PlaybackError::NetworkOrManifest(message), &mut self.sink),
            },
            PlayerEvent::WatchdogFired { .. } => self.controller.on_watchdog(&mut self.sink),
            PlayerEvent::FullscreenChanged(active) => {
                if let Some(fullscreen) = self.fullscreen.as_mut() {
                    fullscreen.on_platform_change(active);
                }
            }
        }
    }

    /// Run `f` and bump `rev` if the observable state moved.
    fn track(&mut self, f: impl FnOnce(&mut Self)) -> bool {
        let before = self.snapshot();
        f(self);
        if self.snapshot() == before {
            return false;
        }
        self.rev += 1;
        true
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let session = self.controller.session();
        PlayerSnapshot {
            rev: self.rev,
            state: self.controller.state().clone(),
            source: self.controller.source().map(str::to_string),
            channel: None,
            transport: session.map(|s| s.transport()),
            generation: self.controller.generation().get(),
            volume: self.volume.state(),
            paused: self.sink.is_paused(),
            ended: self.ended,
            fullscreen: self.is_fullscreen(),
            position_secs: self.position_secs,
            duration_secs: self.duration_secs,
        }
    }

    /// Release the session and detach from the sink.  Later calls are no-ops.
    pub fn dispose(&mut self) {
        self.controller.dispose(&mut self.sink);
    }
}

impl<S: Sink> Drop for MediaPlaybackEngine<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_per_kind() {
        let radio = PlayerCapabilities::for_kind(PlayerKind::Radio);
        assert!(!radio.has_visual_surface);
        assert!(!radio.supports_fullscreen);
        let tv = PlayerCapabilities::for_kind(PlayerKind::Tv);
        assert!(tv.has_visual_surface && tv.supports_fullscreen);
        assert!(radio.retains_session_on_power_off && tv.retains_session_on_power_off);
    }

    #[test]
    fn test_config_overrides_power_policy() {
        let config = PlayerConfig {
            kind: PlayerKind::Tv,
            watchdog_secs: 3,
            default_volume: 0.4,
            retains_session_on_power_off: Some(false),
            loop_progressive: None,
        };
        assert!(!PlayerCapabilities::from_config(&config).retains_session_on_power_off);
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.watchdog, Duration::from_secs(3));
        assert_eq!(settings.initial_volume, Some(0.4));
    }
}
