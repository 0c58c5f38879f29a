//! Manifest engine for `.m3u8` sources.
//!
//! ```text
//!   HlsEngine::load(url, gen)
//!         │
//!         └── task: GET manifest ──┬── master playlist → pick variant → GET variant → media URL
//!                                  └── media playlist  → manifest URL itself
//!                    │
//!                    └── PlayerEvent::Engine { gen, ManifestParsed | Fatal }
//! ```
//!
//! Segment fetching and decoding stay with the sink; the engine only decides
//! which rendition it gets.

use std::time::Duration;

use hls_m3u8::tags::VariantStream;
use hls_m3u8::{MasterPlaylist, MediaPlaylist};
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adaptive::{AdaptiveEngine, EngineHandle};
use crate::event::{EngineSignal, EventSender, Generation, PlayerEvent};

/// Largest manifest body accepted.
pub const MAX_MANIFEST_BYTES: usize = 512 * 1024;

const HEADER: &str = "#EXTM3U";
const STREAM_INF: &str = "#EXT-X-STREAM-INF";
const ENDLIST: &str = "#EXT-X-ENDLIST";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest fetch failed: {0}")]
    Network(String),
    #[error("manifest request returned HTTP {0}")]
    Status(u16),
    #[error("manifest larger than {} bytes", MAX_MANIFEST_BYTES)]
    TooLarge,
    #[error("not an m3u8 manifest (missing #EXTM3U)")]
    MissingHeader,
    #[error("manifest parse error: {0}")]
    Parse(String),
    #[error("master playlist lists no variants")]
    NoVariants,
    #[error("media playlist has no segments")]
    NoSegments,
    #[error("variant playlist is itself a master playlist")]
    NestedMaster,
    #[error("invalid uri {0}")]
    InvalidUri(String),
}

impl From<reqwest::Error> for ManifestError {
    fn from(e: reqwest::Error) -> Self {
        ManifestError::Network(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub bandwidth: u64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    Master(Vec<Variant>),
    Media {
        segments: usize,
        target_duration: Duration,
        /// `#EXT-X-ENDLIST` present: on-demand rather than live.
        ended: bool,
    },
}

pub fn parse_manifest(text: &str) -> Result<Manifest, ManifestError> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if !text.starts_with(HEADER) {
        return Err(ManifestError::MissingHeader);
    }

    if text.contains(STREAM_INF) {
        let master = MasterPlaylist::try_from(text).map_err(|e| ManifestError::Parse(e.to_string()))?;
        // I-frame streams are trick-play only.
        let variants: Vec<Variant> = master
            .variant_streams
            .iter()
            .filter_map(|stream| match stream {
                VariantStream::ExtXStreamInf { uri, stream_data, .. } => Some(Variant {
                    bandwidth: stream_data.bandwidth(),
                    uri: uri.to_string(),
                }),
                VariantStream::ExtXIFrame { .. } => None,
            })
            .collect();
        if variants.is_empty() {
            return Err(ManifestError::NoVariants);
        }
        return Ok(Manifest::Master(variants));
    }

    let media = MediaPlaylist::try_from(text).map_err(|e| ManifestError::Parse(e.to_string()))?;
    let segments = media.segments.iter().count();
    if segments == 0 {
        return Err(ManifestError::NoSegments);
    }
    Ok(Manifest::Media {
        segments,
        target_duration: media.target_duration,
        ended: text.contains(ENDLIST),
    })
}

/// Highest bandwidth not above `max_bandwidth`; the lowest one if every
/// variant is above it.
pub fn select_variant(variants: &[Variant], max_bandwidth: Option<u64>) -> Option<&Variant> {
    let cap = max_bandwidth.unwrap_or(u64::MAX);
    variants
        .iter()
        .filter(|v| v.bandwidth <= cap)
        .max_by_key(|v| v.bandwidth)
        .or_else(|| variants.iter().min_by_key(|v| v.bandwidth))
}

pub fn resolve_uri(base: &str, uri: &str) -> Result<String, ManifestError> {
    let base = Url::parse(base).map_err(|_| ManifestError::InvalidUri(base.to_string()))?;
    base.join(uri)
        .map(|u| u.to_string())
        .map_err(|_| ManifestError::InvalidUri(uri.to_string()))
}

/// Built-in engine: validates the manifest and picks a rendition over HTTP.
#[derive(Clone)]
pub struct HlsEngine {
    client: reqwest::Client,
    max_bandwidth: Option<u64>,
}

impl HlsEngine {
    pub fn new(timeout: Duration, max_bandwidth: Option<u64>) -> Result<Self, ManifestError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tuner/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_bandwidth,
        })
    }

    /// Resolve `manifest_url` to the media playlist the sink should play.
    pub async fn resolve(&self, manifest_url: &str) -> Result<String, ManifestError> {
        let text = self.fetch(manifest_url).await?;
        match parse_manifest(&text)? {
            Manifest::Media { segments, ended, .. } => {
                debug!("hls: media playlist {} segments={} ended={}", manifest_url, segments, ended);
                Ok(manifest_url.to_string())
            }
            Manifest::Master(variants) => {
                let variant =
                    select_variant(&variants, self.max_bandwidth).ok_or(ManifestError::NoVariants)?;
                let media_url = resolve_uri(manifest_url, &variant.uri)?;
                info!(
                    "hls: {} variants, picked {} bps ({})",
                    variants.len(),
                    variant.bandwidth,
                    media_url
                );
                let media = self.fetch(&media_url).await?;
                match parse_manifest(&media)? {
                    Manifest::Media { .. } => Ok(media_url),
                    Manifest::Master(_) => Err(ManifestError::NestedMaster),
                }
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ManifestError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ManifestError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_MANIFEST_BYTES)
        {
            return Err(ManifestError::TooLarge);
        }
        let body = response.text().await?;
        if body.len() > MAX_MANIFEST_BYTES {
            return Err(ManifestError::TooLarge);
        }
        Ok(body)
    }
}

impl AdaptiveEngine for HlsEngine {
    fn name(&self) -> &str {
        "hls"
    }

    fn load(&self, manifest_url: &str, generation: Generation, events: EventSender) -> EngineHandle {
        let engine = self.clone();
        let url = manifest_url.to_string();
        let task = tokio::spawn(async move {
            let signal = match engine.resolve(&url).await {
                Ok(media_url) => EngineSignal::ManifestParsed { media_url },
                Err(e) => {
                    warn!("hls: {} failed: {}", url, e);
                    EngineSignal::Fatal(e.to_string())
                }
            };
            let _ = events.send(PlayerEvent::Engine { generation, signal }).await;
        });
        EngineHandle::from_task(format!("hls {generation}"), task)
    }
}
