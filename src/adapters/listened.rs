//! Listened-channel set shared by transport adapters.
//!
//! Transports receive every channel under the bus prefix and filter locally,
//! so the set can grow or shrink without touching the substrate's
//! subscription and without a window in which in-flight messages are lost.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct ListenedChannels {
    channels: RwLock<BTreeSet<String>>,
}

impl ListenedChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channels: &[String]) {
        let mut set = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        set.extend(channels.iter().cloned());
    }

    pub fn remove(&self, channels: &[String]) {
        let mut set = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        for channel in channels {
            set.remove(channel);
        }
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel)
    }

    pub fn clear(&self) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Sorted copy of the current set.
    pub fn snapshot(&self) -> Vec<String> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
