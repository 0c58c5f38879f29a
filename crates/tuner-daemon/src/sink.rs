//! mpv as a [`Sink`].
//!
//! ```text
//!   MpvSink (engine loop, sync) ──SinkCommand──▶ driver_task ──▶ MpvHandle ──▶ mpv
//!        │                                                                     │
//!        └──────── Arc<Mutex<Mirror>> ◀──── translator_task ◀──── MpvEvent ─────┘
//!                                                 │
//!                                                 └──▶ PlayerEvent (tagged with the listener)
//! ```
//!
//! The engine loop never waits on mpv.  Commands are queued to the driver task
//! and mpv's answers come back as ordinary player events.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tuner_engine::{
    classify, EventSender, FullscreenPlatform, Generation, PlayError, PlayerEvent, Sink, SinkCapabilities,
    SinkError, SinkEvent,
};
use tuner_proto::protocol::TransportMode;

use crate::mpv::{
    MpvDriver, MpvEvent, MpvHandle, MpvOptions, EVENT_DISCONNECTED, OBS_DURATION, OBS_FULLSCREEN, OBS_MUTE,
    OBS_PAUSE, OBS_TIME_POS, OBS_VOLUME,
};

const COMMAND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommand {
    Load { url: String, looping: bool },
    Stop,
    SetPause(bool),
    /// Linear [0, 1].
    SetVolume(f32),
    SetMute(bool),
    SetFullscreen(bool),
    Shutdown,
}

/// What the sink last heard from mpv, plus the routing state the translator
/// needs.
#[derive(Debug, Clone)]
pub struct Mirror {
    pub listener: Option<Generation>,
    pub paused: bool,
    pub volume: f32,
    pub muted: bool,
    pub fullscreen: bool,
    /// A source is set and has not been cleared.
    pub source_loaded: bool,
    /// Loads sent to mpv whose `start-file` has not arrived yet.  File events
    /// seen meanwhile belong to the file being replaced.
    pub pending_loads: u32,
    position_secs: Option<f64>,
    duration_secs: Option<f64>,
}

impl Mirror {
    pub fn new(volume: f32) -> Self {
        Self {
            listener: None,
            paused: true,
            volume: volume.clamp(0.0, 1.0),
            muted: false,
            fullscreen: false,
            source_loaded: false,
            pending_loads: 0,
            position_secs: None,
            duration_secs: None,
        }
    }

    fn tag(&self, event: SinkEvent) -> Option<PlayerEvent> {
        self.listener.map(|generation| PlayerEvent::Sink { generation, event })
    }

    fn volume_event(&self) -> Option<PlayerEvent> {
        self.tag(SinkEvent::VolumeChanged {
            level: self.volume,
            muted: self.muted,
        })
    }

    fn file_events_blocked(&self) -> bool {
        !self.source_loaded || self.pending_loads > 0
    }

    /// Fold one mpv event into the mirror and return the player event it
    /// maps to, if any.
    pub fn apply(&mut self, evt: &MpvEvent) -> Option<PlayerEvent> {
        if let Some((id, data)) = evt.as_property_change() {
            return self.apply_property(id, data);
        }

        match evt.event_name()? {
            "start-file" => {
                self.pending_loads = self.pending_loads.saturating_sub(1);
                self.position_secs = None;
                self.duration_secs = None;
                None
            }
            "file-loaded" if !self.file_events_blocked() => self.tag(SinkEvent::Ready),
            "end-file" if !self.file_events_blocked() => match evt.end_reason() {
                Some("eof") => self.tag(SinkEvent::Ended),
                Some("error") => {
                    let message = evt
                        .raw
                        .get("file_error")
                        .and_then(Value::as_str)
                        .unwrap_or("playback error")
                        .to_string();
                    self.tag(SinkEvent::Error(message))
                }
                _ => None,
            },
            EVENT_DISCONNECTED => {
                self.paused = true;
                self.fullscreen = false;
                if self.file_events_blocked() {
                    return None;
                }
                self.source_loaded = false;
                self.tag(SinkEvent::Error("mpv exited".to_string()))
            }
            _ => None,
        }
    }

    fn apply_property(&mut self, id: u64, data: &Value) -> Option<PlayerEvent> {
        match id {
            OBS_PAUSE => {
                let paused = data.as_bool()?;
                if paused == self.paused {
                    return None;
                }
                self.paused = paused;
                self.tag(SinkEvent::PauseChanged(paused))
            }
            OBS_VOLUME => {
                self.volume = (data.as_f64()? as f32 / 100.0).clamp(0.0, 1.0);
                self.volume_event()
            }
            OBS_MUTE => {
                self.muted = data.as_bool()?;
                self.volume_event()
            }
            OBS_TIME_POS | OBS_DURATION => {
                if self.file_events_blocked() {
                    return None;
                }
                let value = data.as_f64().filter(|v| v.is_finite() && *v >= 0.0);
                let (position, duration) = if id == OBS_TIME_POS {
                    (value, self.duration_secs)
                } else {
                    (self.position_secs, value)
                };
                // Whole-second resolution is enough for a status line.
                let changed = whole(position) != whole(self.position_secs) || duration != self.duration_secs;
                self.position_secs = position;
                self.duration_secs = duration;
                if !changed {
                    return None;
                }
                self.tag(SinkEvent::TimeUpdate {
                    position_secs: position,
                    duration_secs: duration,
                })
            }
            OBS_FULLSCREEN => {
                let active = data.as_bool()?;
                if active == self.fullscreen {
                    return None;
                }
                self.fullscreen = active;
                Some(PlayerEvent::FullscreenChanged(active))
            }
            _ => None,
        }
    }
}

fn whole(secs: Option<f64>) -> Option<i64> {
    secs.map(|s| s.floor() as i64)
}

type Shared = Arc<Mutex<Mirror>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Mirror> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── sink ──────────────────────────────────────────────────────────────────────

pub struct MpvSink {
    cmd_tx: mpsc::Sender<SinkCommand>,
    shared: Shared,
    video: bool,
    loop_progressive: bool,
}

impl MpvSink {
    /// Start the driver and translator tasks.  mpv itself is spawned on the
    /// first command that needs it.
    pub fn spawn(video: bool, loop_progressive: bool, volume: f32, events: EventSender) -> Self {
        let shared = Arc::new(Mutex::new(Mirror::new(volume)));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (mpv_tx, mpv_rx) = mpsc::channel(256);

        let driver = MpvDriver::new(MpvOptions {
            video,
            volume,
            muted: false,
        });
        tokio::spawn(driver_task(driver, cmd_rx, mpv_tx, shared.clone(), events.clone()));
        tokio::spawn(translator_task(mpv_rx, shared.clone(), events));

        Self {
            cmd_tx,
            shared,
            video,
            loop_progressive,
        }
    }

    /// Fullscreen control sharing this sink's mpv process.
    pub fn fullscreen(&self) -> MpvFullscreen {
        MpvFullscreen {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Ask the driver to stop mpv.  Queued behind earlier commands.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(SinkCommand::Shutdown);
    }

    fn send(&self, cmd: SinkCommand) -> Result<(), SinkError> {
        send_command(&self.cmd_tx, cmd)
    }
}

fn send_command(tx: &mpsc::Sender<SinkCommand>, cmd: SinkCommand) -> Result<(), SinkError> {
    tx.try_send(cmd).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => SinkError::Backend("mpv command queue full".into()),
        mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
    })
}

impl Sink for MpvSink {
    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            native_adaptive: true,
            visual_surface: self.video,
        }
    }

    fn listen(&mut self, generation: Generation) {
        lock(&self.shared).listener = Some(generation);
    }

    fn unlisten(&mut self) {
        lock(&self.shared).listener = None;
    }

    fn set_source(&mut self, url: &str) -> Result<(), SinkError> {
        let looping = self.loop_progressive && classify(url) == TransportMode::Progressive;
        {
            let mut mirror = lock(&self.shared);
            mirror.source_loaded = true;
            mirror.pending_loads += 1;
        }
        let result = self.send(SinkCommand::Load {
            url: url.to_string(),
            looping,
        });
        if result.is_err() {
            let mut mirror = lock(&self.shared);
            mirror.pending_loads = mirror.pending_loads.saturating_sub(1);
            mirror.source_loaded = false;
        }
        result
    }

    fn clear_source(&mut self) {
        lock(&self.shared).source_loaded = false;
        if let Err(e) = self.send(SinkCommand::Stop) {
            debug!("sink: stop not sent: {}", e);
        }
    }

    fn play(&mut self) -> Result<(), PlayError> {
        if !lock(&self.shared).source_loaded {
            return Err(PlayError::Sink(SinkError::Backend("no source loaded".into())));
        }
        self.send(SinkCommand::SetPause(false))?;
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(e) = self.send(SinkCommand::SetPause(true)) {
            debug!("sink: pause not sent: {}", e);
        }
    }

    fn is_paused(&self) -> bool {
        lock(&self.shared).paused
    }

    fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    fn set_volume(&mut self, level: f32) {
        if let Err(e) = self.send(SinkCommand::SetVolume(level.clamp(0.0, 1.0))) {
            warn!("sink: volume not sent: {}", e);
        }
    }

    fn muted(&self) -> bool {
        lock(&self.shared).muted
    }

    fn set_muted(&mut self, muted: bool) {
        if let Err(e) = self.send(SinkCommand::SetMute(muted)) {
            warn!("sink: mute not sent: {}", e);
        }
    }
}

/// Toggles mpv's own `fullscreen` property.  Changes come back through the
/// observed property, whoever caused them.
pub struct MpvFullscreen {
    cmd_tx: mpsc::Sender<SinkCommand>,
}

impl FullscreenPlatform for MpvFullscreen {
    fn request_fullscreen(&mut self) -> Result<(), SinkError> {
        send_command(&self.cmd_tx, SinkCommand::SetFullscreen(true))
    }

    fn exit_fullscreen(&mut self) -> Result<(), SinkError> {
        send_command(&self.cmd_tx, SinkCommand::SetFullscreen(false))
    }
}

// ── tasks ─────────────────────────────────────────────────────────────────────

async fn emit(events: &EventSender, event: Option<PlayerEvent>) {
    if let Some(event) = event {
        if events.send(event).await.is_err() {
            debug!("sink: player event channel closed");
        }
    }
}

/// Return a live handle, spawning mpv when there is none.
async fn ensure_handle(
    driver: &mut MpvDriver,
    handle: &mut Option<MpvHandle>,
    mpv_tx: &mpsc::Sender<MpvEvent>,
    shared: &Shared,
) -> anyhow::Result<MpvHandle> {
    if let Some(h) = handle.as_ref() {
        if driver.process_alive() {
            return Ok(h.clone());
        }
        warn!("sink: mpv process gone, respawning");
    }
    {
        let mirror = lock(shared);
        driver.options.volume = mirror.volume;
        driver.options.muted = mirror.muted;
    }
    let h = driver.spawn_and_connect(mpv_tx.clone()).await?;
    h.observe_all_properties().await;
    *handle = Some(h.clone());
    Ok(h)
}

/// The running handle, without spawning.
fn live_handle(driver: &mut MpvDriver, handle: &Option<MpvHandle>) -> Option<MpvHandle> {
    match handle {
        Some(h) if driver.process_alive() => Some(h.clone()),
        _ => None,
    }
}

async fn driver_task(
    mut driver: MpvDriver,
    mut rx: mpsc::Receiver<SinkCommand>,
    mpv_tx: mpsc::Sender<MpvEvent>,
    shared: Shared,
    events: EventSender,
) {
    let mut handle: Option<MpvHandle> = None;

    while let Some(cmd) = rx.recv().await {
        debug!("sink: {:?}", cmd);
        match cmd {
            SinkCommand::Load { url, looping } => {
                let result = match ensure_handle(&mut driver, &mut handle, &mpv_tx, &shared).await {
                    Ok(h) => h.load_paused(&url, looping).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    warn!("sink: load {} failed: {}", url, e);
                    let event = {
                        let mut mirror = lock(&shared);
                        mirror.pending_loads = mirror.pending_loads.saturating_sub(1);
                        if mirror.pending_loads == 0 && mirror.source_loaded {
                            mirror.tag(SinkEvent::Error(e.to_string()))
                        } else {
                            None
                        }
                    };
                    emit(&events, event).await;
                } else {
                    info!("sink: loading {}", url);
                }
            }
            SinkCommand::Stop => {
                if let Some(h) = live_handle(&mut driver, &handle) {
                    if let Err(e) = h.stop().await {
                        debug!("sink: stop failed: {}", e);
                    }
                }
            }
            SinkCommand::SetPause(paused) => {
                let result = match live_handle(&mut driver, &handle) {
                    Some(h) => h.set_property("pause", json!(paused)).await,
                    None => Err(anyhow::anyhow!("mpv not running")),
                };
                if let Err(e) = result {
                    warn!("sink: pause={} failed: {}", paused, e);
                }
            }
            SinkCommand::SetVolume(level) => {
                driver.options.volume = level;
                match live_handle(&mut driver, &handle) {
                    Some(h) => {
                        let percent = (level * 100.0).round() as i64;
                        if let Err(e) = h.set_property("volume", json!(percent)).await {
                            warn!("sink: volume failed: {}", e);
                        }
                    }
                    None => {
                        // No process to echo the change; report it ourselves.
                        let event = {
                            let mut mirror = lock(&shared);
                            mirror.volume = level;
                            mirror.volume_event()
                        };
                        emit(&events, event).await;
                    }
                }
            }
            SinkCommand::SetMute(muted) => {
                driver.options.muted = muted;
                match live_handle(&mut driver, &handle) {
                    Some(h) => {
                        if let Err(e) = h.set_property("mute", json!(muted)).await {
                            warn!("sink: mute failed: {}", e);
                        }
                    }
                    None => {
                        let event = {
                            let mut mirror = lock(&shared);
                            mirror.muted = muted;
                            mirror.volume_event()
                        };
                        emit(&events, event).await;
                    }
                }
            }
            SinkCommand::SetFullscreen(on) => match live_handle(&mut driver, &handle) {
                Some(h) => {
                    if let Err(e) = h.set_property("fullscreen", json!(on)).await {
                        warn!("sink: fullscreen={} failed: {}", on, e);
                    }
                }
                None => debug!("sink: fullscreen={} ignored, no window", on),
            },
            SinkCommand::Shutdown => break,
        }
    }

    info!("sink: driver stopping");
    if let Some(h) = handle.take() {
        let _ = h.send(json!(["quit"])).await;
    }
    driver.kill().await;
}

async fn translator_task(mut rx: mpsc::Receiver<MpvEvent>, shared: Shared, events: EventSender) {
    while let Some(evt) = rx.recv().await {
        let event = lock(&shared).apply(&evt);
        emit(&events, event).await;
    }
    debug!("sink: translator exiting");
}
