//! Gameplay tuning for player bodies and collisions.
//!
//! Keep this separate from runtime/server configuration (tick rate, windows, etc.).
//! World units are pixels, y grows downward.

/// Radius of the player circle
pub const PLAYER_RADIUS: f32 = 20.0;

/// Mass of a player body outside rigid mode
pub const PLAYER_MASS: f32 = 1.0;

/// Restitution of a player body
pub const PLAYER_BOUNCE: f32 = 0.0;

/// Friction of a player body
pub const PLAYER_FRICTION: f32 = 0.05;

/// Continuous force while left/right is held, per input
pub const LATERAL_FORCE: f32 = 600.0;

/// Upward impulse of a jump (negative y is up)
pub const JUMP_IMPULSE: f32 = 480.0;

/// Relative speed above which a player contact knocks both players back
pub const IMPACT_VELOCITY_THRESHOLD: f32 = 120.0;

/// Base knockback impulse of a player contact
pub const IMPACT_FORCE: f32 = 240.0;

/// Mass multiplier while rigid mode is held
pub const RIGID_MASS_MULTIPLIER: f32 = 3.0;

/// Attack multiplier of a rigid body's own knockback on its opponent
pub const RIGID_ATTACK_MULTIPLIER: f32 = 2.0;

/// Multiplier on the knockback a rigid body receives
pub const RIGID_DEFENSE_MULTIPLIER: f32 = 0.5;

/// Downward gravity in pixels per second squared
pub const GRAVITY: f32 = 980.0;

/// Players below this height are out of the round
pub const FALL_LIMIT_Y: f32 = 600.0;

/// Where every player is placed at round start
pub const SPAWN_ORIGIN: (f32, f32) = (0.0, 0.0);
