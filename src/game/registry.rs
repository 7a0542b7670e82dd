//! Registry of live rooms keyed by match

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::config::Config;
use crate::ws::protocol::PlayerId;

use super::room::Room;
use super::snapshot::Outbound;

/// A room shared between the scheduler and its connections
pub type SharedRoom = Arc<Mutex<Room>>;

/// Room key for a client-supplied match name
pub fn room_key(match_name: &str) -> String {
    format!("match-{}", match_name)
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<String, SharedRoom>,
    config: Arc<Config>,
}

impl RoomRegistry {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<SharedRoom> {
        self.rooms.get(key).map(|r| r.value().clone())
    }

    /// Existing room for `key`, or a fresh one.
    ///
    /// The returned guard keeps the map shard locked, so no eviction sweep can remove
    /// the room while the caller holds it.
    fn get_or_create(&self, key: &str) -> RefMut<'_, String, SharedRoom> {
        self.rooms
            .entry(key.to_string())
            .or_insert_with(|| self.create(key))
    }

    /// Join the room for `key`, creating it if needed.
    ///
    /// The map entry stays locked until the player is in the room, so an eviction
    /// sweep can never remove a room between its lookup and the join.
    pub fn join(&self, key: &str, outbound: Outbound) -> (SharedRoom, PlayerId) {
        let entry = self.get_or_create(key);
        let room = entry.value().clone();
        let player_id = room.lock().join(outbound);
        drop(entry);
        (room, player_id)
    }

    /// Drop every empty room that has been idle or alive for too long
    pub fn evict_stale(&self, now: Instant) -> usize {
        let inactivity = self.config.room_inactivity;
        let retention = self.config.room_retention;

        let before = self.rooms.len();
        self.rooms.retain(|key, room| {
            let stale = room.lock().is_stale(now, inactivity, retention);
            if stale {
                info!(room = %key, "Evicting stale room");
            }
            !stale
        });
        before.saturating_sub(self.rooms.len())
    }

    /// All rooms ordered by key
    pub fn rooms(&self) -> Vec<SharedRoom> {
        let mut rooms: Vec<(String, SharedRoom)> = self
            .rooms
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        rooms.into_iter().map(|(_, room)| room).collect()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms().iter().map(|room| room.lock().player_count()).sum()
    }

    /// Periodic eviction sweep; the first sweep runs immediately
    pub async fn run_eviction(self: Arc<Self>) {
        let mut sweep = interval(self.config.eviction_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            sweep.tick().await;
            let evicted = self.evict_stale(Instant::now());
            if evicted > 0 {
                info!(evicted, remaining = self.active_rooms(), "Eviction sweep finished");
            }
        }
    }

    fn create(&self, key: &str) -> SharedRoom {
        info!(room = %key, "Creating room");
        Arc::new(Mutex::new(Room::new(key, &self.config)))
    }
}
