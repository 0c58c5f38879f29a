mod channels;
mod core;
mod mpv;
mod sink;
mod socket;
mod state;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tuner_proto::config::{Config, PlayerKind};

#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    StateUpdated,
    Log(String),
    /// A client command failed.
    Error(String),
}

/// A custom tracing layer that forwards log messages to the broadcast channel
struct BroadcastLayer {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        // Only WARN and ERROR reach clients
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = String::new();
        let now = chrono::Local::now();
        message.push_str(&format!("{} ", now.format("%H:%M:%S")));
        message.push_str(&format!("[{}] ", level));

        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // No receivers is OK
        let _ = self.sender.send(BroadcastMessage::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tunerd", version, about = "Radio/TV playback daemon")]
struct Args {
    /// Player kind, overrides `[player] kind`
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Channel list URL or path, overrides `[channels] playlist`
    #[arg(long)]
    playlist: Option<String>,

    /// Control port, overrides `[daemon] port`
    #[arg(long)]
    port: Option<u16>,

    /// Look up mpv on PATH only
    #[arg(long)]
    use_system_deps: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum KindArg {
    Radio,
    Tv,
}

impl From<KindArg> for PlayerKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Radio => PlayerKind::Radio,
            KindArg::Tv => PlayerKind::Tv,
        }
    }
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(kind) = self.kind {
            config.player.kind = kind.into();
        }
        if let Some(playlist) = &self.playlist {
            config.channels.playlist = playlist.clone();
        }
        if let Some(port) = self.port {
            config.daemon.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tuner_proto::platform::set_use_system_deps(args.use_system_deps);

    // Broadcast channel first so logging can use it
    let (broadcast_tx, _) = broadcast::channel::<BroadcastMessage>(100);

    let data_dir = tuner_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    let broadcast_layer = BroadcastLayer::new(broadcast_tx.clone());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(broadcast_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tuner_daemon=debug,tuner_engine=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let mut config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());
    args.apply(&mut config);

    // All client input funnels into DaemonCore
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<core::DaemonEvent>(256);

    let (daemon_core, player_rx) = core::DaemonCore::new(&config, broadcast_tx.clone()).await?;
    let state_manager = daemon_core.state_manager();

    let listener = socket::bind(&config.daemon.bind_address, config.daemon.port).await?;
    let _socket_handle = socket::start_server(listener, state_manager, event_tx.clone(), broadcast_tx.clone());

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(core::DaemonEvent::Shutdown).await;
        }
    });

    info!("Daemon initialised, running event loop");
    daemon_core.run(event_rx, player_rx).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from(["tunerd", "--kind", "tv", "--port", "7000", "--playlist", "/tmp/x.m3u"]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.player.kind, PlayerKind::Tv);
        assert_eq!(config.daemon.port, 7000);
        assert_eq!(config.channels.playlist, "/tmp/x.m3u");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["tunerd"]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.player.kind, PlayerKind::Radio);
        assert!(!args.use_system_deps);
    }
}
