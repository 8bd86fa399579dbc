//! # Chat Channel Directory
//!
//! Channels are external collaborator entities referenced by name from the
//! session core: membership is a set of online player ids, resolved through
//! the session registry on use.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// One named chat channel.
pub struct Channel {
    pub name: String,
    pub topic: String,
    /// Joined automatically at login and advertised in the login stream.
    pub auto_join: bool,
    members: Mutex<HashSet<i32>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, auto_join: bool) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            auto_join,
            members: Mutex::new(HashSet::new()),
        }
    }

    /// Add a member. Re-joining is an idempotent no-op.
    pub fn join(&self, player_id: i32) -> bool {
        let inserted = self.members.lock().insert(player_id);
        if !inserted {
            debug!(channel = %self.name, player_id, "player re-joined channel they were already in");
        }
        inserted
    }

    /// Remove a member. Leaving while absent is an idempotent no-op.
    pub fn leave(&self, player_id: i32) -> bool {
        let removed = self.members.lock().remove(&player_id);
        if !removed {
            debug!(channel = %self.name, player_id, "player left channel they were not in");
        }
        removed
    }

    pub fn contains(&self, player_id: i32) -> bool {
        self.members.lock().contains(&player_id)
    }

    pub fn member_ids(&self) -> Vec<i32> {
        self.members.lock().iter().copied().collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }
}

/// Directory of channels by name.
pub struct ChannelMap {
    inner: RwLock<HashMap<String, Arc<Channel>>>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMap {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// The stock channel set every server starts with.
    pub fn with_defaults() -> Self {
        let map = Self::new();
        map.insert(Channel::new("#osu", "Main discussion channel.", true));
        map.insert(Channel::new("#announce", "Score announcements.", true));
        map.insert(Channel::new("#lobby", "Multiplayer lobby chat.", false));
        map
    }

    pub fn insert(&self, channel: Channel) {
        self.inner
            .write()
            .insert(channel.name.clone(), Arc::new(channel));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.inner.read().get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Channel>> {
        self.inner.read().values().cloned().collect()
    }

    pub fn auto_join(&self) -> Vec<Arc<Channel>> {
        self.inner
            .read()
            .values()
            .filter(|c| c.auto_join)
            .cloned()
            .collect()
    }
}
