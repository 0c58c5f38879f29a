use serde::{Deserialize, Serialize};

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.  Clients check this on connect and can refuse to talk to an
/// incompatible daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame body a peer may announce.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Messages sent from a control client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Tune to the channel at `index` in the daemon's channel list.
    Select { index: usize },
    /// Tune to an arbitrary stream URL that is not in the channel list.
    SelectUrl { url: String },
    Next,
    Prev,
    Random,
    TogglePower,
    /// Volume in percent, 0–100.
    Volume { percent: f32 },
    ToggleMute,
    SetMuted { muted: bool },
    Fullscreen { on: bool },
    GetState,
    /// Ask for the channel list filtered by name/category.
    Search { term: String },
}

/// Messages sent from the daemon to clients (broadcasts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: daemon version + full state snapshot.
    Hello {
        protocol_version: u32,
        daemon_rev: u64,
        state: PlayerSnapshot,
    },
    State {
        data: PlayerSnapshot,
    },
    Channels {
        channels: Vec<ChannelRecord>,
    },
    Log {
        message: String,
    },
    Error {
        message: String,
    },
}

/// One entry of a station/channel directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: String,
    pub url: String,
    /// Logo / favicon URL, empty when the directory has none.
    #[serde(default)]
    pub artwork_url: String,
    /// Group / genre label.
    #[serde(default)]
    pub category: String,
}

/// How a source URL is delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportMode {
    /// A single file or endless byte stream, handed straight to the sink.
    Progressive,
    /// Segmented stream described by an `.m3u8` manifest.
    AdaptiveStream,
}

/// Controller state.  Exactly one value at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Off,
    Loading,
    Playing,
    Error(String),
}

impl PlaybackState {
    /// Short label for status lines.
    pub fn label(&self) -> &str {
        match self {
            PlaybackState::Off => "off",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error(_))
    }
}

/// Volume as last reported by the sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VolumeState {
    /// Linear level in [0, 1].
    pub level: f32,
    pub muted: bool,
}

impl Default for VolumeState {
    fn default() -> Self {
        Self {
            level: 0.7,
            muted: false,
        }
    }
}

impl VolumeState {
    /// Level as a whole percentage, for display.
    pub fn percent(&self) -> u8 {
        (self.level.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// True when nothing is audible, either by mute or by zero level.
    pub fn is_silent(&self) -> bool {
        self.muted || self.level <= 0.0
    }
}

/// Externally observable player state.  `rev` is a monotonically increasing
/// counter incremented every time the snapshot changes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PlayerSnapshot {
    #[serde(default)]
    pub rev: u64,
    pub state: PlaybackState,
    pub source: Option<String>,
    /// Index of `source` in the daemon's channel list, when it came from there.
    #[serde(default)]
    pub channel: Option<usize>,
    pub transport: Option<TransportMode>,
    pub generation: u64,
    pub volume: VolumeState,
    /// Whether the sink itself reports being paused.  Can be true while
    /// `state` is `Playing` when autoplay was refused.
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub fullscreen: bool,
    pub position_secs: Option<f64>,
    pub duration_secs: Option<f64>,
}

impl PlayerSnapshot {
    /// Playback position as a percentage of a finite duration.
    pub fn progress_percent(&self) -> Option<f64> {
        match (self.position_secs, self.duration_secs) {
            (Some(pos), Some(dur)) if dur.is_finite() && dur > 0.0 => {
                Some((pos / dur * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        }
    }
}

/// Render seconds as `m:ss`.
pub fn format_clock(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_string();
    }
    let total = secs.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Wrapper for socket communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    /// Body length announced by the frame header, if the header is complete.
    pub fn frame_len(data: &[u8]) -> Option<usize> {
        let header: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(header) as usize)
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<(Self, usize)> {
        if data.len() < 4 {
            anyhow::bail!("Insufficient data for length header");
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() < 4 + len {
            anyhow::bail!("Insufficient data for message");
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len])?;
        Ok((msg, 4 + len))
    }
}
