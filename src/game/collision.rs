//! Collision reactions - jump eligibility and player knockback
//!
//! The room turns raw contact pairs into [`CollisionEvent`]s and feeds them through
//! [`react`], then applies the returned [`ContactEffect`]s itself.

use crate::ws::protocol::PlayerId;

use super::physics::BodyHandle;
use super::tuning::{
    IMPACT_FORCE, IMPACT_VELOCITY_THRESHOLD, RIGID_ATTACK_MULTIPLIER, RIGID_DEFENSE_MULTIPLIER,
};

/// A contact that matters to gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionEvent {
    /// A player body touched static terrain
    TerrainContact {
        player: PlayerId,
        terrain: BodyHandle,
    },
    /// Two distinct player bodies touched
    PlayerContact { a: PlayerId, b: PlayerId },
}

/// What the reactor needs to know about a player body at contact time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBody {
    pub alive: bool,
    pub rigid: bool,
    pub position: (f32, f32),
    /// Velocity before the solver resolved the contact
    pub velocity: (f32, f32),
}

/// State change the room must apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactEffect {
    /// Player may jump again
    Grounded { player: PlayerId },
    /// Instant push on a player body
    Knockback {
        player: PlayerId,
        impulse: (f32, f32),
    },
}

/// Compute the effects of one event.
///
/// `body` looks up a player's contact state; `terrain_center` the centre of a terrain body.
pub fn react<B, T>(event: CollisionEvent, body: B, terrain_center: T) -> Vec<ContactEffect>
where
    B: Fn(PlayerId) -> Option<ContactBody>,
    T: Fn(BodyHandle) -> Option<(f32, f32)>,
{
    match event {
        CollisionEvent::TerrainContact { player, terrain } => {
            let (Some(state), Some(center)) = (body(player), terrain_center(terrain)) else {
                return Vec::new();
            };
            if state.alive && lands_on(state.position, center) {
                vec![ContactEffect::Grounded { player }]
            } else {
                Vec::new()
            }
        }
        CollisionEvent::PlayerContact { a, b } => {
            if a == b {
                return Vec::new();
            }
            let (Some(state_a), Some(state_b)) = (body(a), body(b)) else {
                return Vec::new();
            };
            if !state_a.alive || !state_b.alive {
                return Vec::new();
            }
            match knockback(&state_a, &state_b) {
                Some((impulse_a, impulse_b)) => vec![
                    ContactEffect::Knockback {
                        player: a,
                        impulse: impulse_a,
                    },
                    ContactEffect::Knockback {
                        player: b,
                        impulse: impulse_b,
                    },
                ],
                None => Vec::new(),
            }
        }
    }
}

/// A body centre above the terrain centre counts as standing on it (y grows downward)
pub fn lands_on(player: (f32, f32), terrain: (f32, f32)) -> bool {
    player.1 < terrain.1
}

/// Knockback impulses for bodies `a` and `b`, or `None` below the impact threshold.
///
/// `b` is pushed along the sign of `a.velocity - b.velocity` on each axis and `a` the
/// opposite way. A rigid body hits twice as hard and takes half the push.
pub fn knockback(a: &ContactBody, b: &ContactBody) -> Option<((f32, f32), (f32, f32))> {
    let dvx = a.velocity.0 - b.velocity.0;
    let dvy = a.velocity.1 - b.velocity.1;
    if (dvx * dvx + dvy * dvy).sqrt() <= IMPACT_VELOCITY_THRESHOLD {
        return None;
    }

    let (sx, sy) = (signum(dvx), signum(dvy));
    let len = (sx * sx + sy * sy).sqrt();
    let dir = (sx / len, sy / len);

    let force_a = IMPACT_FORCE * impact_scale(a.rigid, b.rigid);
    let force_b = IMPACT_FORCE * impact_scale(b.rigid, a.rigid);

    Some((
        (-dir.0 * force_a, -dir.1 * force_a),
        (dir.0 * force_b, dir.1 * force_b),
    ))
}

fn impact_scale(self_rigid: bool, opponent_rigid: bool) -> f32 {
    let mut scale = 1.0;
    if opponent_rigid {
        scale *= RIGID_ATTACK_MULTIPLIER;
    }
    if self_rigid {
        scale *= RIGID_DEFENSE_MULTIPLIER;
    }
    scale
}

fn signum(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use uuid::Uuid;

    fn moving(vx: f32, vy: f32, rigid: bool) -> ContactBody {
        ContactBody {
            alive: true,
            rigid,
            position: (0.0, 0.0),
            velocity: (vx, vy),
        }
    }

    fn magnitude(v: (f32, f32)) -> f32 {
        (v.0 * v.0 + v.1 * v.1).sqrt()
    }

    #[test]
    fn slow_contacts_do_not_knock_back() {
        let a = moving(IMPACT_VELOCITY_THRESHOLD / 2.0, 0.0, false);
        let b = moving(0.0, 0.0, false);
        assert!(knockback(&a, &b).is_none());
    }

    #[test]
    fn equal_bodies_get_equal_opposite_pushes() {
        let a = moving(300.0, 0.0, false);
        let b = moving(-100.0, 0.0, false);
        let (ia, ib) = knockback(&a, &b).unwrap();

        assert_approx_eq!(ia.0, -IMPACT_FORCE, 1e-3);
        assert_approx_eq!(ib.0, IMPACT_FORCE, 1e-3);
        assert_approx_eq!(ia.1, 0.0, 1e-3);
        assert_approx_eq!(ib.1, 0.0, 1e-3);
    }

    #[test]
    fn rigid_attacker_gets_four_to_one_advantage() {
        let rigid = moving(400.0, 0.0, true);
        let soft = moving(0.0, 0.0, false);
        let (on_rigid, on_soft) = knockback(&rigid, &soft).unwrap();

        assert_approx_eq!(magnitude(on_soft), IMPACT_FORCE * RIGID_ATTACK_MULTIPLIER, 1e-3);
        assert_approx_eq!(magnitude(on_rigid), IMPACT_FORCE * RIGID_DEFENSE_MULTIPLIER, 1e-3);
        assert_approx_eq!(magnitude(on_soft) / magnitude(on_rigid), 4.0, 1e-3);
        assert!(on_soft.0 > 0.0 && on_rigid.0 < 0.0);
    }

    #[test]
    fn both_rigid_cancels_to_base_force() {
        let a = moving(0.0, 300.0, true);
        let b = moving(0.0, -50.0, true);
        let (ia, ib) = knockback(&a, &b).unwrap();

        assert_approx_eq!(magnitude(ia), IMPACT_FORCE, 1e-3);
        assert_approx_eq!(magnitude(ib), IMPACT_FORCE, 1e-3);
        assert!(ib.1 > 0.0 && ia.1 < 0.0);
    }

    #[test]
    fn diagonal_push_is_unit_length() {
        let a = moving(200.0, 200.0, false);
        let b = moving(0.0, 0.0, false);
        let (_, ib) = knockback(&a, &b).unwrap();
        assert_approx_eq!(magnitude(ib), IMPACT_FORCE, 1e-3);
        assert_approx_eq!(ib.0, ib.1, 1e-3);
    }

    #[test]
    fn terrain_contact_from_above_grounds_player() {
        let id = Uuid::new_v4();
        let terrain = BodyHandle::invalid();
        let standing = ContactBody {
            position: (0.0, 50.0),
            ..moving(0.0, 0.0, false)
        };

        let effects = react(
            CollisionEvent::TerrainContact {
                player: id,
                terrain,
            },
            |_| Some(standing),
            |_| Some((0.0, 100.0)),
        );
        assert_eq!(effects, vec![ContactEffect::Grounded { player: id }]);

        // hitting the underside of a platform does not allow a jump
        let below = ContactBody {
            position: (0.0, 130.0),
            ..standing
        };
        let effects = react(
            CollisionEvent::TerrainContact {
                player: id,
                terrain,
            },
            |_| Some(below),
            |_| Some((0.0, 100.0)),
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn dead_players_do_not_react() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let effects = react(
            CollisionEvent::PlayerContact { a, b },
            |id| {
                Some(ContactBody {
                    alive: id == a,
                    ..moving(if id == a { 500.0 } else { 0.0 }, 0.0, false)
                })
            },
            |_| None,
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn player_contact_yields_knockback_for_both() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let effects = react(
            CollisionEvent::PlayerContact { a, b },
            |id| Some(moving(if id == a { 500.0 } else { 0.0 }, 0.0, false)),
            |_| None,
        );
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[0], ContactEffect::Knockback { player, .. } if player == a));
        assert!(matches!(effects[1], ContactEffect::Knockback { player, .. } if player == b));
    }
}
