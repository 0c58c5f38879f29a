//! Streaming session manager.
//!
//! One player owns one `SessionManager`, which owns at most one
//! `PlaybackSession`.  A session exclusively owns the resources acquired for
//! its source: the adaptive engine handle and the watchdog timer.  Both are
//! released by `Drop`, so replacing or dropping the session is enough to
//! release them on every path.
//!
//! ```text
//!   open(url) ── release current ── bump generation ── sink.listen(gen)
//!                                                         │
//!               ┌────────────── classify(url) ────────────┘
//!               ├── Progressive              → sink.set_source(url)
//!               ├── Adaptive + engine        → engine.load(url, gen)
//!               ├── Adaptive + native sink   → sink.set_source(url)
//!               └── Adaptive, neither        → Err(SourceUnsupported)
//! ```
use std::time::Duration;

use tracing::{debug, info, warn};
use tuner_proto::protocol::TransportMode;

use crate::adaptive::{AdaptiveEngine, EngineHandle};
use crate::classify::classify;
use crate::error::PlaybackError;
use crate::event::{EventSender, Generation, PlayerEvent};
use crate::sink::Sink;

// ── watchdog ──────────────────────────────────────────────────────────────────

/// Bounded timer that posts `WatchdogFired` for its generation.  Dropping it
/// cancels it.
#[derive(Debug)]
pub struct Watchdog {
    abort: tokio::task::AbortHandle,
}

impl Watchdog {
    pub fn arm(generation: Generation, after: Duration, events: EventSender) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(PlayerEvent::WatchdogFired { generation }).await;
        });
        Self {
            abort: task.abort_handle(),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

// ── session ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PlaybackSession {
    source_url: String,
    transport: TransportMode,
    generation: Generation,
    engine: Option<EngineHandle>,
    watchdog: Option<Watchdog>,
    /// Sink reported ready for this session.
    ready: bool,
    /// A fatal error or timeout ended this session.
    failed: bool,
}

impl PlaybackSession {
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Still able to produce media: not failed.
    pub fn is_live(&self) -> bool {
        !self.failed
    }

    pub fn watchdog_armed(&self) -> bool {
        self.watchdog.is_some()
    }
}

/// Counters for resource bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub opened: u64,
    pub closed: u64,
}

// ── manager ───────────────────────────────────────────────────────────────────

pub struct SessionManager {
    engine: Option<Box<dyn AdaptiveEngine>>,
    events: EventSender,
    generation: Generation,
    current: Option<PlaybackSession>,
    stats: SessionStats,
}

impl SessionManager {
    pub fn new(engine: Option<Box<dyn AdaptiveEngine>>, events: EventSender) -> Self {
        Self {
            engine,
            events,
            generation: Generation::default(),
            current: None,
            stats: SessionStats::default(),
        }
    }

    /// Applies to sessions opened from now on.
    pub fn set_engine(&mut self, engine: Box<dyn AdaptiveEngine>) {
        debug!("session: adaptive engine {}", engine.name());
        self.engine = Some(engine);
    }

    /// Generation events must carry to be honoured.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Start listening on the sink under the initial generation.
    pub fn attach(&mut self, sink: &mut dyn Sink) {
        sink.listen(self.generation);
    }

    /// Replace the current session with one for `url`.
    ///
    /// The session is recorded even when it fails to start, so the source is
    /// still known to power cycling.
    pub fn open(&mut self, url: &str, sink: &mut dyn Sink) -> Result<Generation, PlaybackError> {
        self.release(sink);
        self.generation = self.generation.next();
        let generation = self.generation;
        sink.listen(generation);

        let transport = classify(url);
        let mut session = PlaybackSession {
            source_url: url.to_string(),
            transport,
            generation,
            engine: None,
            watchdog: None,
            ready: false,
            failed: false,
        };
        self.stats.opened += 1;
        info!("session: open {} {:?} {}", generation, transport, url);

        let started = match transport {
            TransportMode::Progressive => sink
                .set_source(url)
                .map_err(|e| PlaybackError::NetworkOrManifest(e.to_string())),
            TransportMode::AdaptiveStream => {
                if let Some(engine) = self.engine.as_ref() {
                    debug!("session: {} via {} engine", generation, engine.name());
                    session.engine = Some(engine.load(url, generation, self.events.clone()));
                    Ok(())
                } else if sink.capabilities().native_adaptive {
                    debug!("session: {} via native sink playback", generation);
                    sink.set_source(url)
                        .map_err(|e| PlaybackError::NetworkOrManifest(e.to_string()))
                } else {
                    Err(PlaybackError::SourceUnsupported)
                }
            }
        };

        if started.is_err() {
            session.failed = true;
        }
        self.current = Some(session);
        started.map(|_| generation)
    }

    /// Close the current session, if any, and keep listening on the sink
    /// under a fresh idle generation.
    pub fn close(&mut self, sink: &mut dyn Sink) {
        if self.release(sink) {
            self.generation = self.generation.next();
            sink.listen(self.generation);
        }
    }

    /// Close the current session and stop listening on the sink.
    pub fn dispose(&mut self, sink: &mut dyn Sink) {
        self.release(sink);
        self.generation = self.generation.next();
        sink.unlisten();
    }

    fn release(&mut self, sink: &mut dyn Sink) -> bool {
        let Some(mut session) = self.current.take() else {
            return false;
        };
        // Listener first so nothing from the old source is attributed to it.
        sink.unlisten();
        session.watchdog.take();
        session.engine.take();
        sink.clear_source();
        self.stats.closed += 1;
        info!("session: closed {} {}", session.generation, session.source_url);
        true
    }

    pub fn arm_watchdog(&mut self, after: Duration) {
        if let Some(session) = self.current.as_mut() {
            session.watchdog = Some(Watchdog::arm(session.generation, after, self.events.clone()));
        }
    }

    /// Returns true if a watchdog was armed.
    pub fn cancel_watchdog(&mut self) -> bool {
        self.current
            .as_mut()
            .and_then(|s| s.watchdog.take())
            .is_some()
    }

    pub fn mark_ready(&mut self) {
        if let Some(session) = self.current.as_mut() {
            session.ready = true;
        }
    }

    /// The session can no longer play: drop its timer and engine.
    pub fn mark_failed(&mut self) {
        if let Some(session) = self.current.as_mut() {
            session.failed = true;
            session.watchdog.take();
            session.engine.take();
        }
    }

    /// Hand the engine's chosen rendition to the sink.  Returns false when
    /// the session no longer has an engine to attach.
    pub fn attach_rendition(&mut self, media_url: &str, sink: &mut dyn Sink) -> Result<bool, PlaybackError> {
        match self.current.as_ref() {
            Some(session) if session.engine.is_some() => {
                debug!("session: {} attach {}", session.generation, media_url);
                sink.attach_rendition(media_url)
                    .map(|_| true)
                    .map_err(|e| PlaybackError::NetworkOrManifest(e.to_string()))
            }
            _ => {
                warn!("session: manifest parsed with no engine attached, ignoring");
                Ok(false)
            }
        }
    }
}
