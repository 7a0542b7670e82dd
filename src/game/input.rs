//! Input reconciliation - per-player buffers replayed in timestamp order each tick

use crate::ws::protocol::KeyState;

use super::physics::PhysicsWorld;
use super::player::Player;
use super::tuning::{JUMP_IMPULSE, LATERAL_FORCE};

/// Intent keys held in one input sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keys {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub rigid: bool,
}

impl From<KeyState> for Keys {
    fn from(keys: KeyState) -> Self {
        Self {
            left: keys.a,
            right: keys.d,
            jump: keys.w,
            rigid: keys.space,
        }
    }
}

/// One buffered input sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Input {
    /// Client timestamp, only meaningful relative to the same client's other inputs
    pub timestamp: f64,
    pub keys: Keys,
}

/// Pending inputs of a single player
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: Vec<Input>,
}

impl InputBuffer {
    pub fn push(&mut self, input: Input) {
        self.pending.push(input);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Empty the buffer, oldest timestamp first. Equal timestamps keep arrival order.
    pub fn take_ordered(&mut self) -> Vec<Input> {
        let mut inputs = std::mem::take(&mut self.pending);
        // sort_by is stable
        inputs.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        inputs
    }
}

/// Replay every pending input of `player` against its body.
///
/// Returns how many inputs were applied.
pub fn drain(player: &mut Player, world: &mut PhysicsWorld) -> usize {
    let inputs = player.inputs.take_ordered();
    for input in &inputs {
        apply(player, world, input);
    }
    inputs.len()
}

fn apply(player: &mut Player, world: &mut PhysicsWorld, input: &Input) {
    let keys = input.keys;

    if keys.left {
        world.apply_force(player.body, -LATERAL_FORCE, 0.0);
    }
    if keys.right {
        world.apply_force(player.body, LATERAL_FORCE, 0.0);
    }

    // One jump per ground contact
    if keys.jump && player.jump_eligible {
        world.apply_impulse(player.body, 0.0, -JUMP_IMPULSE);
        player.jump_eligible = false;
    }

    if keys.rigid != player.rigid {
        player.rigid = keys.rigid;
        world.set_rigid(player.body, keys.rigid);
    }

    player.last_processed_input = Some(match player.last_processed_input {
        Some(acked) => acked.max(input.timestamp),
        None => input.timestamp,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::test_player;

    fn input(timestamp: f64, keys: Keys) -> Input {
        Input { timestamp, keys }
    }

    #[test]
    fn take_ordered_sorts_by_timestamp() {
        let mut buffer = InputBuffer::default();
        buffer.push(input(3.0, Keys::default()));
        buffer.push(input(1.0, Keys::default()));
        buffer.push(input(2.0, Keys::default()));

        let order: Vec<f64> = buffer.take_ordered().iter().map(|i| i.timestamp).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut buffer = InputBuffer::default();
        let first = Keys {
            left: true,
            ..Keys::default()
        };
        let second = Keys {
            right: true,
            ..Keys::default()
        };
        buffer.push(input(5.0, first));
        buffer.push(input(1.0, Keys::default()));
        buffer.push(input(5.0, second));

        let ordered = buffer.take_ordered();
        assert_eq!(ordered[1].keys, first);
        assert_eq!(ordered[2].keys, second);
    }

    #[test]
    fn drain_applies_everything_and_acks_newest() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let (mut player, _rx) = test_player(&mut world);

        player.inputs.push(input(30.0, Keys::default()));
        player.inputs.push(input(10.0, Keys::default()));
        player.inputs.push(input(20.0, Keys::default()));

        assert_eq!(drain(&mut player, &mut world), 3);
        assert_eq!(player.last_processed_input, Some(30.0));
        assert!(player.inputs.is_empty());
    }

    #[test]
    fn negative_timestamps_are_acked_as_sent() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let (mut player, _rx) = test_player(&mut world);

        player.inputs.push(input(-3.0, Keys::default()));
        player.inputs.push(input(-9.0, Keys::default()));
        player.inputs.push(input(-5.0, Keys::default()));

        drain(&mut player, &mut world);
        assert_eq!(player.last_processed_input, Some(-3.0));
    }

    #[test]
    fn jump_without_ground_contact_is_ignored() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let (mut player, _rx) = test_player(&mut world);
        let jump = Keys {
            jump: true,
            ..Keys::default()
        };

        player.inputs.push(input(1.0, jump));
        drain(&mut player, &mut world);
        world.step();

        assert!(!player.jump_eligible);
        let (_, vy) = world.velocity(player.body).unwrap();
        assert!(vy > 0.0, "only gravity should act, vy = {}", vy);
    }

    #[test]
    fn jump_consumes_eligibility_once() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let (mut player, _rx) = test_player(&mut world);
        let jump = Keys {
            jump: true,
            ..Keys::default()
        };

        player.jump_eligible = true;
        player.inputs.push(input(1.0, jump));
        player.inputs.push(input(2.0, jump));
        drain(&mut player, &mut world);
        world.step();

        assert!(!player.jump_eligible);
        let (_, vy) = world.velocity(player.body).unwrap();
        assert!(vy < 0.0, "jump should move the body up, vy = {}", vy);
        // a second impulse in the same tick would double the launch speed
        assert!(vy > -2.0 * JUMP_IMPULSE);
    }

    #[test]
    fn rigid_flag_follows_last_applied_input() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let (mut player, _rx) = test_player(&mut world);
        let rigid = Keys {
            rigid: true,
            ..Keys::default()
        };

        player.inputs.push(input(2.0, Keys::default()));
        player.inputs.push(input(1.0, rigid));
        drain(&mut player, &mut world);
        assert!(!player.rigid);

        player.inputs.push(input(3.0, rigid));
        drain(&mut player, &mut world);
        assert!(player.rigid);
    }

    #[test]
    fn lateral_keys_push_sideways() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let (mut player, _rx) = test_player(&mut world);
        let left = Keys {
            left: true,
            ..Keys::default()
        };

        player.inputs.push(input(1.0, left));
        drain(&mut player, &mut world);
        world.step();

        let (vx, _) = world.velocity(player.body).unwrap();
        assert!(vx < 0.0);
    }
}
