//! Channel list filtering and search, applied after a directory has been
//! loaded and before it is offered for selection.

use std::collections::HashSet;

use crate::config::ChannelsConfig;
use crate::protocol::ChannelRecord;

/// Results cap used when the caller does not ask for one.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct ChannelFilter {
    pub require_artwork: bool,
    /// Lower-case suffixes, e.g. `.m3u8`.  Empty accepts every URL.
    pub playable_extensions: Vec<String>,
    /// Lower-case category names to drop.
    pub exclude_categories: Vec<String>,
    pub dedupe: bool,
}

impl From<&ChannelsConfig> for ChannelFilter {
    fn from(cfg: &ChannelsConfig) -> Self {
        Self {
            require_artwork: cfg.require_artwork,
            playable_extensions: cfg
                .playable_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            exclude_categories: cfg
                .exclude_categories
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            dedupe: cfg.dedupe,
        }
    }
}

impl ChannelFilter {
    pub fn apply(&self, records: Vec<ChannelRecord>) -> Vec<ChannelRecord> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        records
            .into_iter()
            .filter(|r| !self.require_artwork || !r.artwork_url.is_empty())
            .filter(|r| self.is_playable(&r.url))
            .filter(|r| {
                !self
                    .exclude_categories
                    .iter()
                    .any(|c| *c == r.category.to_lowercase())
            })
            .filter(|r| !self.dedupe || seen.insert((r.name.clone(), r.url.clone())))
            .collect()
    }

    fn is_playable(&self, url: &str) -> bool {
        if self.playable_extensions.is_empty() {
            return true;
        }
        let path = url_path(url).to_ascii_lowercase();
        self.playable_extensions.iter().any(|ext| path.ends_with(ext))
    }
}

/// Case-insensitive match on name or category, first `limit` hits.
pub fn search<'a>(records: &'a [ChannelRecord], term: &str, limit: usize) -> Vec<&'a ChannelRecord> {
    let needle = term.trim().to_lowercase();
    records
        .iter()
        .filter(|r| {
            needle.is_empty()
                || r.name.to_lowercase().contains(&needle)
                || r.category.to_lowercase().contains(&needle)
        })
        .take(limit)
        .collect()
}

/// The URL without its query string or fragment.
pub fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
