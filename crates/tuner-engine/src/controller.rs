//! Playback controller: the power/loading/playing/error state machine.
//!
//! ```text
//!            select_source            ready              toggle_power
//!   any ───────────────────▶ Loading ──────▶ Playing ──────────────────▶ Off
//!                              │  │             │                         │
//!                  error/watchdog └─────────────┴──▶ Error(msg)           │
//!                                                                         │
//!   Off ── toggle_power ──▶ Playing (session ready) | Loading (not ready, │
//!                           or re-opened after teardown/failure) ◀────────┘
//! ```
//!
//! The controller holds the *desired* power state separately from
//! `PlaybackState`: a session that becomes ready while the player is off stays
//! silent until powered on.
use std::time::Duration;

use tracing::{debug, info, warn};
use tuner_proto::protocol::PlaybackState;

use crate::adaptive::AdaptiveEngine;
use crate::error::{PlayError, PlaybackError};
use crate::event::Generation;
use crate::session::{PlaybackSession, SessionManager, SessionStats};
use crate::sink::Sink;

pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub watchdog: Duration,
    /// Power-off pauses and keeps the session (true) or closes it (false).
    pub retains_session_on_power_off: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watchdog: DEFAULT_WATCHDOG,
            retains_session_on_power_off: true,
        }
    }
}

pub struct Controller {
    config: ControllerConfig,
    sessions: SessionManager,
    state: PlaybackState,
    /// Desired state is not Off.
    powered: bool,
    /// Last URL passed to `select_source`, kept across teardown.
    source: Option<String>,
    disposed: bool,
}

impl Controller {
    pub fn new(config: ControllerConfig, sessions: SessionManager) -> Self {
        Self {
            config,
            sessions,
            state: PlaybackState::Off,
            powered: false,
            source: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn set_adaptive_engine(&mut self, engine: Box<dyn AdaptiveEngine>) {
        self.sessions.set_engine(engine);
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn generation(&self) -> Generation {
        self.sessions.generation()
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        !self.disposed && self.sessions.is_current(generation)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.sessions.current()
    }

    pub fn session_stats(&self) -> SessionStats {
        self.sessions.stats()
    }

    pub fn attach(&mut self, sink: &mut dyn Sink) {
        self.sessions.attach(sink);
    }

    // ── commands ──────────────────────────────────────────────────────────────

    pub fn select_source(&mut self, url: &str, sink: &mut dyn Sink) {
        if self.disposed {
            return;
        }
        self.powered = true;
        self.source = Some(url.to_string());
        self.transition(PlaybackState::Loading);
        match self.sessions.open(url, sink) {
            Ok(generation) => {
                debug!("controller: {} loading, watchdog {:?}", generation, self.config.watchdog);
                self.sessions.arm_watchdog(self.config.watchdog);
            }
            Err(e) => self.fail(e, sink),
        }
    }

    pub fn toggle_power(&mut self, sink: &mut dyn Sink) {
        if self.disposed {
            return;
        }
        if self.powered {
            self.power_off(sink);
        } else {
            self.power_on(sink);
        }
    }

    fn power_off(&mut self, sink: &mut dyn Sink) {
        self.powered = false;
        sink.pause();
        if self.config.retains_session_on_power_off {
            self.sessions.cancel_watchdog();
        } else {
            self.sessions.close(sink);
        }
        self.transition(PlaybackState::Off);
    }

    fn power_on(&mut self, sink: &mut dyn Sink) {
        let Some(source) = self.source.clone() else {
            debug!("controller: power on with no source, staying off");
            return;
        };
        let (live, ready) = match self.sessions.current() {
            Some(s) => (s.is_live(), s.is_ready()),
            None => (false, false),
        };
        if !live {
            self.select_source(&source, sink);
            return;
        }
        self.powered = true;
        if ready {
            self.transition(PlaybackState::Playing);
            self.start_playout(sink);
        } else {
            self.transition(PlaybackState::Loading);
            self.sessions.arm_watchdog(self.config.watchdog);
        }
    }

    /// Release everything.  The controller ignores all later calls.
    pub fn dispose(&mut self, sink: &mut dyn Sink) {
        if self.disposed {
            return;
        }
        self.sessions.dispose(sink);
        self.powered = false;
        self.disposed = true;
        if self.state != PlaybackState::Off {
            info!("controller: disposed in {:?}", self.state);
        }
        self.state = PlaybackState::Off;
    }

    // ── session signals ───────────────────────────────────────────────────────
    //
    // Callers filter on generation before calling these.

    /// Sink has metadata and can play.
    pub fn on_ready(&mut self, sink: &mut dyn Sink) {
        self.sessions.mark_ready();
        if !self.powered {
            debug!("controller: ready while off, holding");
            return;
        }
        if self.state == PlaybackState::Loading {
            self.sessions.cancel_watchdog();
            self.transition(PlaybackState::Playing);
            self.start_playout(sink);
        }
    }

    pub fn on_manifest_parsed(&mut self, media_url: &str, sink: &mut dyn Sink) {
        match self.sessions.attach_rendition(media_url, sink) {
            Ok(true) if self.powered => self.start_playout(sink),
            Ok(_) => {}
            Err(e) => self.on_fatal(e, sink),
        }
    }

    pub fn on_fatal(&mut self, error: PlaybackError, sink: &mut dyn Sink) {
        if !error.is_fatal() {
            warn!("controller: {}, state kept", error);
            return;
        }
        self.sessions.mark_failed();
        match self.state {
            PlaybackState::Loading | PlaybackState::Playing => self.fail(error, sink),
            _ => debug!("controller: {} while {:?}, state kept", error, self.state),
        }
    }

    pub fn on_watchdog(&mut self, sink: &mut dyn Sink) {
        if self.state != PlaybackState::Loading {
            debug!("controller: watchdog fired in {:?}, ignored", self.state);
            return;
        }
        warn!("controller: no ready signal within {:?}", self.config.watchdog);
        self.sessions.mark_failed();
        self.fail(PlaybackError::Timeout, sink);
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    fn start_playout(&mut self, sink: &mut dyn Sink) {
        match sink.play() {
            Ok(()) => {}
            Err(PlayError::Rejected(reason)) => {
                let err = PlaybackError::PlaybackRejected(reason);
                warn!("controller: {} (sink paused={})", err, sink.is_paused());
            }
            Err(PlayError::Sink(e)) => {
                self.on_fatal(PlaybackError::NetworkOrManifest(e.to_string()), sink);
            }
        }
    }

    /// Silence the sink: a rendition attached before the failure must not
    /// keep playing under `Error`.
    fn fail(&mut self, error: PlaybackError, sink: &mut dyn Sink) {
        self.sessions.mark_failed();
        sink.pause();
        self.transition(PlaybackState::Error(error.message()));
    }

    fn transition(&mut self, next: PlaybackState) {
        if !edge_allowed(&self.state, &next) {
            warn!("controller: refused transition {:?} → {:?}", self.state, next);
            return;
        }
        if self.state != next {
            info!("controller: state {:?} → {:?}", self.state, next);
        }
        self.state = next;
    }
}

fn edge_allowed(from: &PlaybackState, to: &PlaybackState) -> bool {
    use PlaybackState::*;
    match (from, to) {
        (_, Loading) => true,
        (Loading, Playing) | (Off, Playing) => true,
        (Loading, Error(_)) | (Playing, Error(_)) => true,
        (_, Off) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_proto::protocol::PlaybackState::*;

    #[test]
    fn test_edges() {
        assert!(edge_allowed(&Error("x".into()), &Loading));
        assert!(edge_allowed(&Loading, &Playing));
        assert!(edge_allowed(&Off, &Playing));
        assert!(edge_allowed(&Playing, &Error("x".into())));
        assert!(!edge_allowed(&Off, &Error("x".into())));
        assert!(!edge_allowed(&Error("x".into()), &Playing));
        assert!(!edge_allowed(&Playing, &Playing));
    }
}
