//! # Session Registry
//!
//! The process-wide directory of currently-online players: the single point
//! of lookup, insertion, and removal, and the broadcast fan-out primitive.
//!
//! ## Invariants
//! - No two entries share a token, id, or safe name
//! - Membership changes are idempotent: redundant add/remove calls log a
//!   diagnostic and change nothing
//! - Broadcast iterates a consistent snapshot, so concurrent membership
//!   changes can never deliver to a player removed before the snapshot
//!
//! The registry is an explicitly owned single instance handed to every
//! request handler; there is no ambient global state.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::error::constants;
use crate::session::player::{make_safe_name, Player};
use crate::session::privileges::Privileges;

/// Directory of online players, insertion-ordered for enumeration.
///
/// Lookups are O(n) scans, acceptable at expected population sizes; the
/// external contract would be unchanged by indexing each identifier with a
/// hash map.
#[derive(Default)]
pub struct SessionRegistry {
    players: RwLock<Vec<Arc<Player>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }

    pub fn get_by_token(&self, token: &str) -> Option<Arc<Player>> {
        self.players
            .read()
            .iter()
            .find(|p| p.token() == token)
            .cloned()
    }

    pub fn get_by_id(&self, id: i32) -> Option<Arc<Player>> {
        self.players.read().iter().find(|p| p.id == id).cloned()
    }

    /// Case- and format-insensitive name lookup.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Player>> {
        let safe_name = make_safe_name(name);
        self.players
            .read()
            .iter()
            .find(|p| p.safe_name == safe_name)
            .cloned()
    }

    /// Register a player. A player already present (by id) is left alone.
    pub fn add(&self, player: Arc<Player>) {
        let mut players = self.players.write();
        if players.iter().any(|p| p.id == player.id) {
            warn!(player = %player.name, id = player.id, "{}", constants::DIAG_DOUBLE_ADD);
            return;
        }
        players.push(player);
    }

    /// Deregister a player. Removing an absent player is a no-op.
    pub fn remove(&self, player: &Player) {
        let mut players = self.players.write();
        match players.iter().position(|p| p.id == player.id) {
            Some(index) => {
                players.remove(index);
            }
            None => {
                warn!(player = %player.name, id = player.id, "{}", constants::DIAG_REMOVE_ABSENT);
            }
        }
    }

    /// Consistent snapshot of the current membership.
    pub fn snapshot(&self) -> Vec<Arc<Player>> {
        self.players.read().clone()
    }

    /// Append `data` to every online player's outbound queue except those in
    /// `exclude`. The fan-out works over a snapshot taken under the lock.
    pub fn broadcast(&self, data: &[u8], exclude: &[i32]) {
        for player in self.snapshot() {
            if !exclude.contains(&player.id) {
                player.enqueue(data);
            }
        }
    }

    /// Currently-online staff members.
    pub fn staff(&self) -> Vec<Arc<Player>> {
        self.players
            .read()
            .iter()
            .filter(|p| p.privileges().intersects(Privileges::STAFF))
            .cloned()
            .collect()
    }

    /// Currently-online restricted players.
    pub fn restricted(&self) -> Vec<Arc<Player>> {
        self.players
            .read()
            .iter()
            .filter(|p| p.is_restricted())
            .cloned()
            .collect()
    }

    /// Currently-online unrestricted players.
    pub fn unrestricted(&self) -> Vec<Arc<Player>> {
        self.players
            .read()
            .iter()
            .filter(|p| !p.is_restricted())
            .cloned()
            .collect()
    }

    /// Ids of every online player.
    pub fn online_ids(&self) -> HashSet<i32> {
        self.players.read().iter().map(|p| p.id).collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::session::player::{Player, PlayerOptions};

    fn online_player(id: i32, name: &str) -> Arc<Player> {
        Arc::new(Player::new(
            id,
            name,
            Privileges::UNRESTRICTED,
            PlayerOptions {
                token: Some(format!("token-{id}")),
                ..PlayerOptions::default()
            },
        ))
    }

    fn assert_identity_invariants(registry: &SessionRegistry) {
        let players = registry.snapshot();
        let mut tokens = HashSet::new();
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for p in &players {
            assert!(tokens.insert(p.token()), "duplicate token");
            assert!(ids.insert(p.id), "duplicate id");
            assert!(names.insert(p.safe_name.clone()), "duplicate safe name");
        }
    }

    #[test]
    fn lookups_resolve_by_token_id_and_name() {
        let registry = SessionRegistry::new();
        let player = online_player(3, "Some Guy");
        registry.add(player.clone());

        assert!(registry.get_by_token("token-3").is_some());
        assert!(registry.get_by_id(3).is_some());
        // Name lookup normalizes case and spaces
        assert!(registry.get_by_name("some guy").is_some());
        assert!(registry.get_by_name("SOME GUY").is_some());
        assert!(registry.get_by_name("someone else").is_none());
    }

    #[test]
    fn double_add_leaves_size_unchanged() {
        let registry = SessionRegistry::new();
        let player = online_player(1, "One");

        registry.add(player.clone());
        registry.add(player);
        assert_eq!(registry.len(), 1);
        assert_identity_invariants(&registry);
    }

    #[test]
    fn remove_of_absent_player_is_a_noop() {
        let registry = SessionRegistry::new();
        let present = online_player(1, "One");
        let absent = online_player(2, "Two");

        registry.add(present);
        registry.remove(&absent);
        assert_eq!(registry.len(), 1);

        registry.remove(&online_player(1, "One"));
        assert_eq!(registry.len(), 0);
        registry.remove(&online_player(1, "One"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn broadcast_respects_exclusion_set() {
        let registry = SessionRegistry::new();
        let a = online_player(1, "A");
        let b = online_player(2, "B");
        registry.add(a.clone());
        registry.add(b.clone());

        registry.broadcast(b"data", &[a.id]);

        assert!(a.dequeue().is_none());
        assert_eq!(&b.dequeue().unwrap()[..], b"data");
    }

    #[test]
    fn derived_views_partition_by_privileges() {
        let registry = SessionRegistry::new();

        let staff = Arc::new(Player::new(
            1,
            "Mod",
            Privileges::UNRESTRICTED | Privileges::MODERATOR,
            PlayerOptions {
                token: Some("t1".into()),
                ..PlayerOptions::default()
            },
        ));
        let restricted = Arc::new(Player::new(
            2,
            "Banned",
            Privileges::VERIFIED,
            PlayerOptions {
                token: Some("t2".into()),
                ..PlayerOptions::default()
            },
        ));
        registry.add(staff);
        registry.add(restricted);

        assert_eq!(registry.staff().len(), 1);
        assert_eq!(registry.restricted().len(), 1);
        assert_eq!(registry.unrestricted().len(), 1);
        assert_eq!(registry.online_ids(), HashSet::from([1, 2]));
    }
}
