#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tuner_engine::{
    event_channel, AdaptiveEngine, EngineHandle, EngineSettings, EventReceiver, EventSender,
    FullscreenPlatform, Generation, MediaPlaybackEngine, PlayError, PlayerCapabilities, PlayerEvent,
    Sink, SinkCapabilities, SinkError, SinkEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Listen(Generation),
    Unlisten,
    SetSource(String),
    AttachRendition(String),
    ClearSource,
    Play,
    Pause,
    SetVolume(f32),
    SetMuted(bool),
}

#[derive(Debug)]
pub struct SinkLog {
    pub calls: Vec<SinkCall>,
    pub listener: Option<Generation>,
    pub source: Option<String>,
    pub paused: bool,
    pub volume: f32,
    pub muted: bool,
    pub reject_play: bool,
}

impl Default for SinkLog {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            listener: None,
            source: None,
            paused: true,
            volume: 1.0,
            muted: false,
            reject_play: false,
        }
    }
}

/// In-memory sink.  Volume and mute changes echo back as notifications the
/// way a real media element does; everything else is driven by a
/// [`SinkProbe`].
pub struct ScriptedSink {
    log: Arc<Mutex<SinkLog>>,
    events: EventSender,
    caps: SinkCapabilities,
}

/// Test-side handle on a [`ScriptedSink`].
#[derive(Clone)]
pub struct SinkProbe {
    log: Arc<Mutex<SinkLog>>,
    events: EventSender,
}

pub fn scripted_sink(events: EventSender, caps: SinkCapabilities) -> (ScriptedSink, SinkProbe) {
    let log = Arc::new(Mutex::new(SinkLog::default()));
    let sink = ScriptedSink {
        log: log.clone(),
        events: events.clone(),
        caps,
    };
    (sink, SinkProbe { log, events })
}

fn notify(log: &SinkLog, events: &EventSender, event: SinkEvent) {
    if let Some(generation) = log.listener {
        let _ = events.try_send(PlayerEvent::Sink { generation, event });
    }
}

impl Sink for ScriptedSink {
    fn capabilities(&self) -> SinkCapabilities {
        self.caps
    }

    fn listen(&mut self, generation: Generation) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::Listen(generation));
        log.listener = Some(generation);
    }

    fn unlisten(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::Unlisten);
        log.listener = None;
    }

    fn set_source(&mut self, url: &str) -> Result<(), SinkError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::SetSource(url.to_string()));
        log.source = Some(url.to_string());
        log.paused = true;
        Ok(())
    }

    fn attach_rendition(&mut self, media_url: &str) -> Result<(), SinkError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::AttachRendition(media_url.to_string()));
        log.source = Some(media_url.to_string());
        log.paused = true;
        Ok(())
    }

    fn clear_source(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::ClearSource);
        log.source = None;
        log.paused = true;
    }

    fn play(&mut self) -> Result<(), PlayError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::Play);
        if log.reject_play {
            return Err(PlayError::Rejected("autoplay blocked".into()));
        }
        log.paused = false;
        notify(&log, &self.events, SinkEvent::PauseChanged(false));
        Ok(())
    }

    fn pause(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::Pause);
        log.paused = true;
        notify(&log, &self.events, SinkEvent::PauseChanged(true));
    }

    fn is_paused(&self) -> bool {
        self.log.lock().unwrap().paused
    }

    fn volume(&self) -> f32 {
        self.log.lock().unwrap().volume
    }

    fn set_volume(&mut self, level: f32) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::SetVolume(level));
        log.volume = level;
        let muted = log.muted;
        notify(&log, &self.events, SinkEvent::VolumeChanged { level, muted });
    }

    fn muted(&self) -> bool {
        self.log.lock().unwrap().muted
    }

    fn set_muted(&mut self, muted: bool) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SinkCall::SetMuted(muted));
        log.muted = muted;
        let level = log.volume;
        notify(&log, &self.events, SinkEvent::VolumeChanged { level, muted });
    }
}

impl SinkProbe {
    /// Emit under the sink's current listener.  Returns false when detached.
    pub fn emit(&self, event: SinkEvent) -> bool {
        let log = self.log.lock().unwrap();
        match log.listener {
            Some(generation) => self
                .events
                .try_send(PlayerEvent::Sink { generation, event })
                .is_ok(),
            None => false,
        }
    }

    /// Emit as if from a listener registered under `generation`.
    pub fn emit_for(&self, generation: Generation, event: SinkEvent) {
        self.events
            .try_send(PlayerEvent::Sink { generation, event })
            .expect("event queue full");
    }

    pub fn ready(&self) -> bool {
        self.emit(SinkEvent::Ready)
    }

    pub fn listener(&self) -> Option<Generation> {
        self.log.lock().unwrap().listener
    }

    pub fn source(&self) -> Option<String> {
        self.log.lock().unwrap().source.clone()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&SinkCall) -> bool) -> usize {
        self.log.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn reject_play(&self, reject: bool) {
        self.log.lock().unwrap().reject_play = reject;
    }
}

/// Adaptive engine that only counts loads and releases.  Signals are injected
/// by the test.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    pub loads: Arc<Mutex<Vec<(String, Generation)>>>,
    pub released: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl AdaptiveEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load(&self, manifest_url: &str, generation: Generation, _events: EventSender) -> EngineHandle {
        self.loads
            .lock()
            .unwrap()
            .push((manifest_url.to_string(), generation));
        let released = self.released.clone();
        EngineHandle::new(format!("scripted {generation}"), move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[derive(Default)]
pub struct FullscreenCalls {
    pub requests: usize,
    pub exits: usize,
}

pub struct FakeFullscreen(pub Arc<Mutex<FullscreenCalls>>);

impl FullscreenPlatform for FakeFullscreen {
    fn request_fullscreen(&mut self) -> Result<(), SinkError> {
        self.0.lock().unwrap().requests += 1;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), SinkError> {
        self.0.lock().unwrap().exits += 1;
        Ok(())
    }
}

pub fn radio() -> PlayerCapabilities {
    PlayerCapabilities {
        has_visual_surface: false,
        supports_fullscreen: false,
        retains_session_on_power_off: true,
    }
}

pub fn tv() -> PlayerCapabilities {
    PlayerCapabilities {
        has_visual_surface: true,
        supports_fullscreen: true,
        retains_session_on_power_off: true,
    }
}

pub struct Harness {
    pub player: MediaPlaybackEngine<ScriptedSink>,
    pub probe: SinkProbe,
    pub rx: EventReceiver,
    pub events: EventSender,
}

impl Harness {
    pub fn new(caps: PlayerCapabilities) -> Self {
        Self::build(caps, SinkCapabilities::default(), None)
    }

    pub fn with_sink(caps: PlayerCapabilities, sink_caps: SinkCapabilities) -> Self {
        Self::build(caps, sink_caps, None)
    }

    pub fn with_engine(caps: PlayerCapabilities, engine: Box<dyn AdaptiveEngine>) -> Self {
        Self::build(caps, SinkCapabilities::default(), Some(engine))
    }

    pub fn with_fullscreen(caps: PlayerCapabilities, platform: Box<dyn FullscreenPlatform>) -> Self {
        let Harness {
            player,
            probe,
            rx,
            events,
        } = Self::new(caps);
        Self {
            player: player.with_fullscreen(platform),
            probe,
            rx,
            events,
        }
    }

    fn build(
        caps: PlayerCapabilities,
        sink_caps: SinkCapabilities,
        engine: Option<Box<dyn AdaptiveEngine>>,
    ) -> Self {
        let (events, rx) = event_channel();
        let (sink, probe) = scripted_sink(events.clone(), sink_caps);
        let mut player = MediaPlaybackEngine::new(sink, caps, EngineSettings::default(), events.clone());
        if let Some(engine) = engine {
            player = player.with_adaptive_engine(engine);
        }
        Self {
            player,
            probe,
            rx,
            events,
        }
    }

    /// Apply everything already queued.  Returns the events seen.
    pub fn pump(&mut self) -> Vec<PlayerEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            seen.push(event.clone());
            self.player.handle_event(event);
        }
        seen
    }

    pub fn watchdog_armed(&self) -> bool {
        self.player
            .controller()
            .session()
            .is_some_and(|s| s.watchdog_armed())
    }

    pub fn inject(&mut self, event: PlayerEvent) -> bool {
        self.player.handle_event(event)
    }
}

pub fn watchdog_count(events: &[PlayerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PlayerEvent::WatchdogFired { .. }))
        .count()
}
