//! Snapshot building and fan-out to room members

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::ws::protocol::{ScoreTable, ServerMsg};

use super::physics::PhysicsWorld;
use super::player::Player;

/// One encoded server message, shared between every recipient
pub type Frame = Arc<str>;

/// Frames a connection may have queued before new ones are dropped
pub const OUTBOUND_CAPACITY: usize = 256;

/// Outbound half of a player's connection
pub type Outbound = mpsc::Sender<Frame>;

/// Queue between a room and the writer task of one connection
pub fn outbound_channel() -> (Outbound, mpsc::Receiver<Frame>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// Encodes room messages once and fans them out to members
#[derive(Debug, Default)]
pub struct SnapshotBroadcaster {
    frames_dropped: u64,
}

impl SnapshotBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-state snapshot of the room
    pub fn build<'a>(
        players: impl IntoIterator<Item = &'a Player>,
        world: &PhysicsWorld,
        scores: &ScoreTable,
        round: u32,
    ) -> ServerMsg {
        let mut players: Vec<_> = players.into_iter().map(|p| p.snapshot(world)).collect();
        players.sort_by_key(|p| p.id);

        ServerMsg::Snapshot {
            players,
            scores: scores.clone(),
            round,
        }
    }

    /// Serialize a message for the wire
    pub fn encode(msg: &ServerMsg) -> Option<Frame> {
        match serde_json::to_string(msg) {
            Ok(json) => Some(Frame::from(json)),
            Err(e) => {
                error!(error = %e, "Failed to encode server message");
                None
            }
        }
    }

    /// Send a message to one connection
    pub fn send_to(&mut self, outbound: &Outbound, msg: &ServerMsg) {
        if let Some(frame) = Self::encode(msg) {
            self.push(outbound, frame);
        }
    }

    /// Send the same encoded message to every recipient, returns how many got it
    pub fn broadcast<'a>(
        &mut self,
        recipients: impl IntoIterator<Item = &'a Outbound>,
        msg: &ServerMsg,
    ) -> usize {
        let Some(frame) = Self::encode(msg) else {
            return 0;
        };

        recipients
            .into_iter()
            .filter(|outbound| self.push(outbound, frame.clone()))
            .count()
    }

    fn push(&mut self, outbound: &Outbound, frame: Frame) -> bool {
        match outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // Snapshots carry full state, a stalled reader only misses stale ones
                self.frames_dropped += 1;
                if self.frames_dropped.is_power_of_two() {
                    warn!(
                        frames_dropped = self.frames_dropped,
                        "Outbound queue full, dropping frames"
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => {
                // Connection task already gone; its leave is on the way
                debug!("Dropping frame for closed connection");
                false
            }
        }
    }
}
