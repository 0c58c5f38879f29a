//! Extended M3U channel lists.
//!
//! ```text
//! #EXTM3U
//! #EXTINF:-1 tvg-logo="http://a/logo.png" group-title="News",Channel A
//! http://a/stream.m3u8
//! ```
//!
//! Parsing is best effort: an `#EXTINF` line opens a pending entry, the next
//! line carrying a URL scheme closes it.  Anything that does not fit that
//! shape is skipped silently.

use tracing::debug;

use crate::protocol::ChannelRecord;

const DIRECTIVE: &str = "#EXTINF:";
const LOGO_ATTR: &str = "tvg-logo";
const CATEGORY_ATTR: &str = "group-title";

/// Fields collected from a directive line, waiting for their URL.
#[derive(Debug, Default)]
struct PendingEntry {
    name: String,
    artwork_url: String,
    category: String,
}

impl PendingEntry {
    fn from_directive(body: &str) -> Self {
        let name = match body.rfind(',') {
            Some(idx) => body[idx + 1..].trim().to_string(),
            None => String::new(),
        };
        Self {
            name,
            artwork_url: attribute(body, LOGO_ATTR).unwrap_or_default(),
            category: attribute(body, CATEGORY_ATTR).unwrap_or_default(),
        }
    }

    fn complete(self, url: &str) -> ChannelRecord {
        let name = if self.name.is_empty() {
            url.to_string()
        } else {
            self.name
        };
        ChannelRecord {
            name,
            url: url.to_string(),
            artwork_url: self.artwork_url,
            category: self.category,
        }
    }
}

/// Parse an extended M3U document into channel records, in file order.
/// Duplicates are kept.
pub fn parse_playlist(content: &str) -> Vec<ChannelRecord> {
    let mut records = Vec::new();
    let mut pending: Option<PendingEntry> = None;

    for line in content.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        if let Some(body) = line.strip_prefix(DIRECTIVE) {
            // A directive that never got its URL is dropped here.
            pending = Some(PendingEntry::from_directive(body));
            continue;
        }

        if !has_url_scheme(line) {
            continue;
        }

        if let Some(entry) = pending.take() {
            records.push(entry.complete(line));
        }
    }

    records
}

pub fn load_playlist_file(path: &std::path::Path) -> anyhow::Result<Vec<ChannelRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_playlist(&content);
    debug!("playlist: {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Value of `key="value"` inside a directive line.
fn attribute(body: &str, key: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(found) = body[search_from..].find(key) {
        let start = search_from + found;
        let after_key = start + key.len();
        // Reject matches that are the tail of a longer attribute name.
        let boundary_ok = body[..start]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || c == ':');
        let rest = &body[after_key..];
        if boundary_ok {
            if let Some(quoted) = rest.strip_prefix("=\"") {
                let end = quoted.find('"')?;
                return Some(quoted[..end].trim().to_string());
            }
        }
        search_from = after_key;
    }
    None
}

/// `scheme://` where scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
fn has_url_scheme(line: &str) -> bool {
    let Some(idx) = line.find("://") else {
        return false;
    };
    let scheme = &line[..idx];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
