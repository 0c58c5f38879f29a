use tuner_proto::protocol::TransportMode;

/// Suffix that marks a segmented-stream manifest.
pub const MANIFEST_EXTENSION: &str = ".m3u8";

/// Pick a transport from the URL text alone.  No network access.
pub fn classify(url: &str) -> TransportMode {
    if url.ends_with(MANIFEST_EXTENSION) {
        TransportMode::AdaptiveStream
    } else {
        TransportMode::Progressive
    }
}
