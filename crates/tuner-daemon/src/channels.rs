use rand::Rng;
use tracing::{info, warn};
use tuner_proto::catalog::ChannelFilter;
use tuner_proto::config::ChannelsConfig;
use tuner_proto::playlist::{load_playlist_file, parse_playlist};
use tuner_proto::protocol::ChannelRecord;

/// Load the channel directory from a URL or a local file and filter it.
/// A missing or unreadable list gives an empty directory, not an error:
/// arbitrary URLs can still be tuned.
pub async fn load_channels(config: &ChannelsConfig) -> Vec<ChannelRecord> {
    let source = config.playlist.trim();
    let records = if source.starts_with("http://") || source.starts_with("https://") {
        match fetch_playlist(source).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to fetch channel list {}: {}", source, e);
                Vec::new()
            }
        }
    } else {
        let path = std::path::Path::new(source);
        if !path.exists() {
            info!("No channel list at {}", path.display());
            return Vec::new();
        }
        match load_playlist_file(path) {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to read channel list {}: {}", path.display(), e);
                Vec::new()
            }
        }
    };

    let parsed = records.len();
    let channels = ChannelFilter::from(config).apply(records);
    info!("Loaded {} channels ({} before filtering) from {}", channels.len(), parsed, source);
    channels
}

async fn fetch_playlist(url: &str) -> anyhow::Result<Vec<ChannelRecord>> {
    let response = reqwest::get(url).await?.error_for_status()?;
    let body = response.text().await?;
    Ok(parse_playlist(&body))
}

/// The directory plus the position of the tuned channel.
#[derive(Debug, Default, Clone)]
pub struct ChannelList {
    channels: Vec<ChannelRecord>,
    current: Option<usize>,
}

impl ChannelList {
    pub fn new(channels: Vec<ChannelRecord>) -> Self {
        Self {
            channels,
            current: None,
        }
    }

    pub fn channels(&self) -> &[ChannelRecord] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn get(&self, index: usize) -> Option<&ChannelRecord> {
        self.channels.get(index)
    }

    /// Make `index` current.  `None` when out of range.
    pub fn select(&mut self, index: usize) -> Option<&ChannelRecord> {
        if index >= self.channels.len() {
            return None;
        }
        self.current = Some(index);
        self.channels.get(index)
    }

    /// Forget the current channel, e.g. after tuning an ad-hoc URL.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Index after the current one, wrapping.  Starts at the first channel.
    pub fn next_index(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }
        Some(match self.current {
            Some(i) => (i + 1) % self.channels.len(),
            None => 0,
        })
    }

    /// Index before the current one, wrapping.  Starts at the last channel.
    pub fn prev_index(&self) -> Option<usize> {
        let len = self.channels.len();
        if len == 0 {
            return None;
        }
        Some(match self.current {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        })
    }

    /// Any index but the current one when there is a choice.
    pub fn random_index(&self) -> Option<usize> {
        let len = self.channels.len();
        match (len, self.current) {
            (0, _) => None,
            (1, _) => Some(0),
            (_, None) => Some(rand::thread_rng().gen_range(0..len)),
            (_, Some(current)) => {
                let pick = rand::thread_rng().gen_range(0..len - 1);
                Some(if pick >= current { pick + 1 } else { pick })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(n: usize) -> ChannelList {
        ChannelList::new(
            (0..n)
                .map(|i| ChannelRecord {
                    name: format!("ch{i}"),
                    url: format!("http://tv.example/{i}.m3u8"),
                    ..Default::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_next_prev_wrap() {
        let mut l = list(3);
        assert_eq!(l.next_index(), Some(0));
        assert_eq!(l.prev_index(), Some(2));
        l.select(2);
        assert_eq!(l.next_index(), Some(0));
        l.select(0);
        assert_eq!(l.prev_index(), Some(2));
    }

    #[test]
    fn test_empty_list_has_no_navigation() {
        let l = list(0);
        assert_eq!(l.next_index(), None);
        assert_eq!(l.prev_index(), None);
        assert_eq!(l.random_index(), None);
    }

    #[test]
    fn test_random_skips_current() {
        let mut l = list(4);
        l.select(1);
        for _ in 0..100 {
            let i = l.random_index().unwrap();
            assert_ne!(i, 1);
            assert!(i < 4);
        }
        assert_eq!(list(1).random_index(), Some(0));
    }

    #[test]
    fn test_select_out_of_range() {
        let mut l = list(2);
        assert!(l.select(5).is_none());
        assert_eq!(l.current(), None);
        assert_eq!(l.select(1).map(|c| c.name.as_str()), Some("ch1"));
    }

    #[tokio::test]
    async fn test_missing_file_gives_empty_directory() {
        let config = ChannelsConfig {
            playlist: "/nonexistent/tuner/channels.m3u".into(),
            ..Default::default()
        };
        assert!(load_channels(&config).await.is_empty());
    }
}
