pub mod adaptive;
pub mod classify;
pub mod controller;
pub mod engine;
pub mod error;
pub mod event;
pub mod fullscreen;
pub mod hls;
pub mod session;
pub mod sink;
pub mod volume;

pub use adaptive::{AdaptiveEngine, EngineHandle};
pub use classify::classify;
pub use engine::{EngineSettings, MediaPlaybackEngine, PlayerCapabilities};
pub use error::{PlayError, PlaybackError, SinkError};
pub use event::{event_channel, EngineSignal, EventReceiver, EventSender, Generation, PlayerEvent, SinkEvent};
pub use sink::{FullscreenPlatform, Sink, SinkCapabilities};
