use crate::error::{PlayError, SinkError};
use crate::event::Generation;

/// What a sink can do on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCapabilities {
    /// Plays `.m3u8` manifests handed to `set_source` without an engine.
    pub native_adaptive: bool,
    /// Renders video.
    pub visual_surface: bool,
}

/// The audio/video output the player writes to and listens on.
///
/// Commands are fire-and-forget; results arrive later as
/// [`SinkEvent`](crate::event::SinkEvent)s tagged with the generation passed
/// to the most recent [`listen`](Sink::listen).  After
/// [`unlisten`](Sink::unlisten) a sink must emit nothing.
pub trait Sink: Send {
    fn capabilities(&self) -> SinkCapabilities;

    /// Route all further notifications under `generation`.
    fn listen(&mut self, generation: Generation);

    fn unlisten(&mut self);

    /// Load `url`, paused.  Play-out starts with [`play`](Sink::play).
    fn set_source(&mut self, url: &str) -> Result<(), SinkError>;

    /// Hand the rendition chosen by an adaptive engine to the sink.
    fn attach_rendition(&mut self, media_url: &str) -> Result<(), SinkError> {
        self.set_source(media_url)
    }

    /// Unload whatever is playing.
    fn clear_source(&mut self);

    fn play(&mut self) -> Result<(), PlayError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Linear volume in [0, 1].
    fn volume(&self) -> f32;

    fn set_volume(&mut self, level: f32);

    fn muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);
}

/// Platform fullscreen for the player's container.  State changes come back
/// as [`PlayerEvent::FullscreenChanged`](crate::event::PlayerEvent).
pub trait FullscreenPlatform: Send {
    fn request_fullscreen(&mut self) -> Result<(), SinkError>;

    fn exit_fullscreen(&mut self) -> Result<(), SinkError>;
}
