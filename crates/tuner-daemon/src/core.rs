//! DaemonCore: owns the player and runs the single event loop.
//!
//! Everything that mutates playback state happens here:
//!
//! ```text
//!   socket clients ──DaemonEvent──┐
//!                                 ├──▶ DaemonCore::run ──▶ MediaPlaybackEngine<MpvSink>
//!   sink / hls / watchdog ─PlayerEvent─┘        │
//!                                               └──▶ StateManager + broadcast::StateUpdated
//! ```
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tuner_engine::hls::HlsEngine;
use tuner_engine::{event_channel, EngineSettings, EventReceiver, MediaPlaybackEngine, PlayerCapabilities, PlayerEvent};
use tuner_proto::config::Config;
use tuner_proto::protocol::{Command, PlaybackState};

use crate::channels::{load_channels, ChannelList};
use crate::sink::MpvSink;
use crate::state::StateManager;
use crate::BroadcastMessage;

#[derive(Debug)]
pub enum DaemonEvent {
    /// A command from a control client.
    ClientCommand(Command),
    /// Shutdown requested (signal or fatal socket error).
    Shutdown,
}

pub struct DaemonCore {
    player: MediaPlaybackEngine<MpvSink>,
    channels: ChannelList,
    state_manager: Arc<StateManager>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    /// Last state label logged, to log transitions once.
    last_state: PlaybackState,
}

impl DaemonCore {
    /// Load the channel list and build the player.  Returns the core together
    /// with the receiving end of the player event queue.
    pub async fn new(
        config: &Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
    ) -> anyhow::Result<(Self, EventReceiver)> {
        let channels = load_channels(&config.channels).await;
        let state_manager = Arc::new(StateManager::new(channels.clone()));

        let (events, player_rx) = event_channel();
        let kind = config.player.kind;
        let loop_progressive = config
            .player
            .loop_progressive
            .unwrap_or_else(|| kind.default_loop_progressive());
        let sink = MpvSink::spawn(
            kind.has_visual_surface(),
            loop_progressive,
            config.player.default_volume,
            events.clone(),
        );
        let fullscreen = sink.fullscreen();

        let caps = PlayerCapabilities::from_config(&config.player);
        let mut player = MediaPlaybackEngine::new(sink, caps, EngineSettings::from_config(&config.player), events);
        if config.engine.adaptive_engine {
            let hls = HlsEngine::new(
                Duration::from_secs(config.engine.manifest_timeout_secs),
                config.engine.max_bandwidth,
            )?;
            player = player.with_adaptive_engine(Box::new(hls));
        }
        if caps.supports_fullscreen {
            player = player.with_fullscreen(Box::new(fullscreen));
        }
        info!("DaemonCore: {:?} player, {:?}", kind, caps);

        let core = Self {
            player,
            channels: ChannelList::new(channels),
            state_manager,
            broadcast_tx,
            last_state: PlaybackState::Off,
        };
        Ok((core, player_rx))
    }

    pub fn state_manager(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    /// Run the core event loop.  Returns on `Shutdown` or when the client
    /// event channel closes.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<DaemonEvent>,
        mut player_rx: EventReceiver,
    ) -> anyhow::Result<()> {
        info!("DaemonCore: starting event loop");
        self.publish().await;

        loop {
            tokio::select! {
                evt = event_rx.recv() => match evt {
                    None => {
                        info!("DaemonCore: event channel closed, shutting down");
                        break;
                    }
                    Some(DaemonEvent::Shutdown) => {
                        info!("DaemonCore: shutdown requested");
                        break;
                    }
                    Some(DaemonEvent::ClientCommand(cmd)) => {
                        info!("DaemonCore: command {:?}", cmd);
                        if let Err(e) = self.handle_command(cmd) {
                            error!("DaemonCore: command error: {}", e);
                            let _ = self.broadcast_tx.send(BroadcastMessage::Error(e.to_string()));
                        }
                    }
                },
                Some(evt) = player_rx.recv() => {
                    self.handle_player_event(evt);
                }
            }
            self.publish().await;
        }

        self.cleanup();
        Ok(())
    }

    fn handle_player_event(&mut self, evt: PlayerEvent) {
        if self.player.handle_event(evt) {
            let state = self.player.state();
            if *state != self.last_state {
                match state {
                    PlaybackState::Error(message) => warn!("DaemonCore: playback error: {}", message),
                    other => info!("DaemonCore: {} -> {}", self.last_state.label(), other.label()),
                }
                self.last_state = state.clone();
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::Select { index } => self.tune(index)?,
            Command::SelectUrl { url } => {
                self.channels.clear_current();
                self.player.select_source(&url);
            }
            Command::Next => {
                let index = self.channels.next_index().ok_or_else(no_channels)?;
                self.tune(index)?;
            }
            Command::Prev => {
                let index = self.channels.prev_index().ok_or_else(no_channels)?;
                self.tune(index)?;
            }
            Command::Random => {
                let index = self.channels.random_index().ok_or_else(no_channels)?;
                self.tune(index)?;
            }
            Command::TogglePower => {
                if !self.player.toggle_power() {
                    debug!("DaemonCore: power toggle changed nothing");
                }
            }
            Command::Volume { percent } => self.player.set_volume(percent),
            Command::ToggleMute => self.player.toggle_mute(),
            Command::SetMuted { muted } => self.player.set_muted(muted),
            Command::Fullscreen { on } => {
                if on {
                    self.player.enter_fullscreen()?;
                } else {
                    self.player.exit_fullscreen()?;
                }
            }
            // Answered by the socket from the shared state.
            Command::GetState | Command::Search { .. } => {}
        }
        Ok(())
    }

    fn tune(&mut self, index: usize) -> anyhow::Result<()> {
        let channel = self
            .channels
            .select(index)
            .ok_or_else(|| anyhow::anyhow!("no channel at index {}", index))?;
        info!("DaemonCore: tuning to {} ({})", channel.name, channel.url);
        let url = channel.url.clone();
        self.player.select_source(&url);
        Ok(())
    }

    async fn publish(&mut self) {
        let mut snapshot = self.player.snapshot();
        snapshot.channel = self.channels.current();
        if self.state_manager.publish(snapshot).await {
            // No receivers is fine.
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }

    fn cleanup(&mut self) {
        info!("DaemonCore: cleaning up");
        self.player.dispose();
        self.player.sink().shutdown();
    }
}

fn no_channels() -> anyhow::Error {
    anyhow::anyhow!("channel list is empty")
}
