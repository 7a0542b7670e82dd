//! Player state owned by a room

use crate::ws::protocol::{PlayerId, PlayerSnapshot};

use super::input::InputBuffer;
use super::physics::{BodyHandle, PhysicsWorld};
use super::snapshot::Outbound;

/// Simulation-side state of one connected player
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub body: BodyHandle,
    pub inputs: InputBuffer,
    /// Newest input timestamp applied, echoed back for client reconciliation
    pub last_processed_input: Option<f64>,
    pub jump_eligible: bool,
    pub alive: bool,
    pub rigid: bool,
    pub outbound: Outbound,
}

impl Player {
    pub fn new(id: PlayerId, body: BodyHandle, outbound: Outbound) -> Self {
        Self {
            id,
            body,
            inputs: InputBuffer::default(),
            last_processed_input: None,
            jump_eligible: false,
            alive: true,
            rigid: false,
            outbound,
        }
    }

    /// Put the player back at a spawn point for a new round
    pub fn respawn(&mut self, world: &mut PhysicsWorld, x: f32, y: f32) {
        world.reset_body(self.body, x, y);
        world.set_rigid(self.body, false);
        self.inputs.clear();
        self.alive = true;
        self.jump_eligible = false;
        self.rigid = false;
    }

    pub fn snapshot(&self, world: &PhysicsWorld) -> PlayerSnapshot {
        let (x, y) = world.position(self.body).unwrap_or_default();
        PlayerSnapshot {
            id: self.id,
            x,
            y,
            alive: self.alive,
            last_processed_input: self.last_processed_input.unwrap_or(0.0),
            is_rigid: self.rigid,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_player(
    world: &mut PhysicsWorld,
) -> (Player, tokio::sync::mpsc::Receiver<super::snapshot::Frame>) {
    let (tx, rx) = super::snapshot::outbound_channel();
    let body = world.add_player_body(0.0, 0.0);
    (Player::new(uuid::Uuid::new_v4(), body, tx), rx)
}
