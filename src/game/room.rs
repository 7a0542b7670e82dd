//! Room state and the per-room tick

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::ws::protocol::{Platform, PlayerId, RoundOutcome, ScoreTable, ServerMsg};

use super::collision::{self, CollisionEvent, ContactBody, ContactEffect};
use super::input::{self, Input};
use super::map::platform_layout;
use super::physics::{BodyHandle, ContactStart, PhysicsWorld};
use super::player::Player;
use super::round::{PauseStep, RoundResolution, RoundState, RoundStatus};
use super::snapshot::{Outbound, SnapshotBroadcaster};
use super::tuning::{FALL_LIMIT_Y, PLAYER_RADIUS, SPAWN_ORIGIN};

/// Horizontal gap between spawn slots so bodies never start overlapped
const SPAWN_SPACING: f32 = PLAYER_RADIUS * 2.5;

/// One isolated match: physics world, players, scores and round state
pub struct Room {
    key: String,
    world: PhysicsWorld,
    platforms: Vec<Platform>,
    players: HashMap<PlayerId, Player>,
    bodies: HashMap<BodyHandle, PlayerId>,
    scores: ScoreTable,
    round: RoundState,
    broadcaster: SnapshotBroadcaster,
    tick_period: Duration,
    created_at: Instant,
    last_activity: Instant,
}

impl Room {
    pub fn new(key: impl Into<String>, config: &Config) -> Self {
        let mut world = PhysicsWorld::new(config.tick_delta());
        let platforms = platform_layout();
        for platform in &platforms {
            world.add_platform(platform);
        }

        let now = Instant::now();
        Self {
            key: key.into(),
            world,
            platforms,
            players: HashMap::new(),
            bodies: HashMap::new(),
            scores: ScoreTable::new(),
            round: RoundState::new(config.min_players, config.winning_score, config.round_pause),
            broadcaster: SnapshotBroadcaster::new(),
            tick_period: config.tick_period(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Add a player bound to `outbound` and greet it
    pub fn join(&mut self, outbound: Outbound) -> PlayerId {
        let id = Uuid::new_v4();
        let (x, y) = spawn_point(self.players.len());
        let body = self.world.add_player_body(x, y);

        self.broadcaster.send_to(
            &outbound,
            &ServerMsg::Welcome {
                id,
                map: self.platforms.clone(),
                round: self.round.round(),
            },
        );

        self.players.insert(id, Player::new(id, body, outbound));
        self.bodies.insert(body, id);
        self.scores.entry(id).or_insert(0);
        self.last_activity = Instant::now();

        info!(
            room = %self.key,
            player_id = %id,
            player_count = self.players.len(),
            "Player joined room"
        );

        if self.round.ready_to_start(self.players.len()) {
            self.start_round();
        }

        id
    }

    /// Remove a player and its body. The round carries on without it.
    pub fn leave(&mut self, id: &PlayerId) -> bool {
        let Some(player) = self.players.remove(id) else {
            return false;
        };
        self.bodies.remove(&player.body);
        self.world.remove_body(player.body);
        self.last_activity = Instant::now();

        info!(
            room = %self.key,
            player_id = %id,
            player_count = self.players.len(),
            "Player left room"
        );
        true
    }

    /// Buffer an input for the next tick. Unknown players are ignored.
    pub fn enqueue(&mut self, id: &PlayerId, input: Input) -> bool {
        let Some(player) = self.players.get_mut(id) else {
            return false;
        };
        player.inputs.push(input);
        self.last_activity = Instant::now();
        true
    }

    /// Empty and idle past `inactivity`, or empty and older than `retention`
    pub fn is_stale(&self, now: Instant, inactivity: Duration, retention: Duration) -> bool {
        self.players.is_empty()
            && (now.saturating_duration_since(self.last_activity) > inactivity
                || now.saturating_duration_since(self.created_at) > retention)
    }

    /// Advance the room by one fixed step
    pub fn tick(&mut self) {
        match self.round.status() {
            RoundStatus::Playing => self.simulate(),
            RoundStatus::Paused => {
                self.discard_inputs();
                if self.round.advance_pause(self.tick_period) == PauseStep::Restart {
                    if self.players.is_empty() {
                        self.round.reset_to_waiting();
                        debug!(room = %self.key, "Room emptied during pause, waiting again");
                    } else {
                        self.start_round();
                    }
                }
            }
            RoundStatus::Waiting | RoundStatus::Ended => self.discard_inputs(),
        }
    }

    /// Reset everyone to spawn and announce the next round
    fn start_round(&mut self) {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort();
        for (slot, id) in ids.iter().enumerate() {
            let (x, y) = spawn_point(slot);
            if let Some(player) = self.players.get_mut(id) {
                player.respawn(&mut self.world, x, y);
            }
        }

        let round = self.round.begin_round();
        info!(room = %self.key, round, players = ids.len(), "Round started");

        self.broadcast(&ServerMsg::Start { round });
        self.broadcast_snapshot();
    }

    fn simulate(&mut self) {
        for player in self.players.values_mut() {
            input::drain(player, &mut self.world);
        }

        // Contacts are judged on the velocities bodies had going into the step
        let velocities: HashMap<PlayerId, (f32, f32)> = self
            .players
            .values()
            .filter_map(|p| self.world.velocity(p.body).map(|v| (p.id, v)))
            .collect();

        let contacts = self.world.step();
        self.react_to_contacts(&contacts, &velocities);

        for player in self.players.values_mut() {
            if !player.alive {
                continue;
            }
            if let Some((_, y)) = self.world.position(player.body) {
                if y > FALL_LIMIT_Y {
                    player.alive = false;
                    debug!(room = %self.key, player_id = %player.id, "Player fell out");
                }
            }
        }

        self.broadcast_snapshot();

        let alive: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect();
        if let Some(resolution) = self.round.resolve(&alive, &mut self.scores) {
            self.announce(resolution);
        }
    }

    fn classify(&self, contact: ContactStart) -> Option<CollisionEvent> {
        let a = self.bodies.get(&contact.a).copied();
        let b = self.bodies.get(&contact.b).copied();
        match (a, b) {
            (Some(a), Some(b)) => Some(CollisionEvent::PlayerContact { a, b }),
            (Some(player), None) if self.world.is_terrain(contact.b) => {
                Some(CollisionEvent::TerrainContact {
                    player,
                    terrain: contact.b,
                })
            }
            (None, Some(player)) if self.world.is_terrain(contact.a) => {
                Some(CollisionEvent::TerrainContact {
                    player,
                    terrain: contact.a,
                })
            }
            _ => None,
        }
    }

    fn react_to_contacts(
        &mut self,
        contacts: &[ContactStart],
        velocities: &HashMap<PlayerId, (f32, f32)>,
    ) {
        let effects: Vec<ContactEffect> = contacts
            .iter()
            .filter_map(|c| self.classify(*c))
            .flat_map(|event| {
                collision::react(
                    event,
                    |id| {
                        let player = self.players.get(&id)?;
                        Some(ContactBody {
                            alive: player.alive,
                            rigid: player.rigid,
                            position: self.world.position(player.body)?,
                            velocity: velocities
                                .get(&id)
                                .copied()
                                .or_else(|| self.world.velocity(player.body))?,
                        })
                    },
                    |terrain| self.world.position(terrain),
                )
            })
            .collect();

        for effect in effects {
            match effect {
                ContactEffect::Grounded { player } => {
                    if let Some(player) = self.players.get_mut(&player) {
                        player.jump_eligible = true;
                    }
                }
                ContactEffect::Knockback { player, impulse } => {
                    if let Some(player) = self.players.get(&player) {
                        self.world.apply_impulse(player.body, impulse.0, impulse.1);
                    }
                }
            }
        }
    }

    fn announce(&mut self, resolution: RoundResolution) {
        info!(
            room = %self.key,
            round = resolution.round,
            outcome = ?resolution.outcome,
            "Round finished"
        );

        self.broadcast(&ServerMsg::RoundWinner {
            round: resolution.round,
            winner: resolution.outcome,
        });

        if matches!(resolution.outcome, RoundOutcome::Winner(_)) {
            self.broadcast(&ServerMsg::ScoreUpdate {
                scores: self.scores.clone(),
            });
        }

        if let Some(winner) = resolution.match_winner {
            info!(room = %self.key, winner = %winner, "Match won");
            self.broadcast(&ServerMsg::MatchWinner {
                winner,
                scores: self.scores.clone(),
            });
        }
    }

    fn broadcast_snapshot(&mut self) {
        let snapshot = SnapshotBroadcaster::build(
            self.players.values(),
            &self.world,
            &self.scores,
            self.round.round(),
        );
        self.broadcast(&snapshot);
    }

    fn broadcast(&mut self, msg: &ServerMsg) {
        self.broadcaster
            .broadcast(self.players.values().map(|p| &p.outbound), msg);
    }

    fn discard_inputs(&mut self) {
        for player in self.players.values_mut() {
            player.inputs.clear();
        }
    }
}

#[cfg(test)]
impl Room {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> RoundStatus {
        self.round.status()
    }

    pub fn round_number(&self) -> u32 {
        self.round.round()
    }

    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }
}

/// Spawn slots spread left and right of the spawn origin.
///
/// Only slot 0 sits on the origin itself. Stacking everyone there would start the
/// round with overlapping bodies and a player contact on the first tick.
fn spawn_point(slot: usize) -> (f32, f32) {
    let offset = match slot {
        0 => 0.0,
        n if n % 2 == 1 => ((n + 1) / 2) as f32,
        n => -((n / 2) as f32),
    };
    (SPAWN_ORIGIN.0 + offset * SPAWN_SPACING, SPAWN_ORIGIN.1)
}
