use std::sync::Arc;

use tokio::sync::RwLock;
use tuner_proto::protocol::{ChannelRecord, PlayerSnapshot};

/// What control clients can read without going through the core loop.
#[derive(Debug, Clone, Default)]
pub struct DaemonView {
    pub snapshot: PlayerSnapshot,
    pub channels: Arc<Vec<ChannelRecord>>,
}

/// Shared, read-mostly copy of the player state.  Only the core writes.
pub struct StateManager {
    view: Arc<RwLock<DaemonView>>,
}

impl StateManager {
    pub fn new(channels: Vec<ChannelRecord>) -> Self {
        Self {
            view: Arc::new(RwLock::new(DaemonView {
                snapshot: PlayerSnapshot::default(),
                channels: Arc::new(channels),
            })),
        }
    }

    pub async fn get_state(&self) -> PlayerSnapshot {
        self.view.read().await.snapshot.clone()
    }

    pub async fn get_channels(&self) -> Arc<Vec<ChannelRecord>> {
        Arc::clone(&self.view.read().await.channels)
    }

    /// Store `snapshot` unless it is older than what is held.
    pub async fn publish(&self, snapshot: PlayerSnapshot) -> bool {
        let mut view = self.view.write().await;
        if snapshot.rev < view.snapshot.rev || snapshot == view.snapshot {
            return false;
        }
        view.snapshot = snapshot;
        true
    }
}
