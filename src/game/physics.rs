//! Physics world adapter over rapier2d
//!
//! The room never touches rapier types directly except the body handle. Everything
//! it needs (bodies, forces, stepping, collision-start pairs) goes through here.

use parking_lot::Mutex;
use rapier2d::prelude::*;

use crate::ws::protocol::Platform;

use super::tuning::{
    GRAVITY, PLAYER_BOUNCE, PLAYER_FRICTION, PLAYER_MASS, PLAYER_RADIUS, RIGID_MASS_MULTIPLIER,
};

/// Handle to a body owned by a [`PhysicsWorld`]
pub type BodyHandle = RigidBodyHandle;

/// Two bodies that started touching during the last step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactStart {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

/// Collects collision-start pairs while the pipeline steps
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(h1, h2, _) = event {
            self.started.lock().push((h1, h2));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// One isolated rigid-body simulation
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: ContactCollector,
    terrain: Vec<BodyHandle>,
}

impl PhysicsWorld {
    /// Create an empty world stepping `dt` seconds per tick
    pub fn new(dt: f32) -> Self {
        let params = IntegrationParameters {
            dt,
            ..IntegrationParameters::default()
        };

        Self {
            gravity: vector![0.0, GRAVITY],
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: ContactCollector::default(),
            terrain: Vec::new(),
        }
    }

    /// Add an immovable platform
    pub fn add_platform(&mut self, platform: &Platform) -> BodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![platform.x, platform.y])
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(platform.w / 2.0, platform.h / 2.0).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.terrain.push(handle);
        handle
    }

    /// Add a player circle at (x, y)
    pub fn add_player_body(&mut self, x: f32, y: f32) -> BodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![x, y])
            .lock_rotations()
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::ball(PLAYER_RADIUS)
            .restitution(PLAYER_BOUNCE)
            .friction(PLAYER_FRICTION)
            .mass(PLAYER_MASS)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    /// Remove a body and its colliders. Unknown handles are ignored.
    pub fn remove_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        self.terrain.retain(|h| *h != handle);
    }

    pub fn is_terrain(&self, handle: BodyHandle) -> bool {
        self.terrain.contains(&handle)
    }

    #[cfg(test)]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Accumulate a force for the next step
    pub fn apply_force(&mut self, handle: BodyHandle, fx: f32, fy: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force(vector![fx, fy], true);
        }
    }

    /// Instant change of momentum
    pub fn apply_impulse(&mut self, handle: BodyHandle, ix: f32, iy: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_impulse(vector![ix, iy], true);
        }
    }

    /// Switch a player body between normal and rigid mass
    pub fn set_rigid(&mut self, handle: BodyHandle, rigid: bool) {
        let extra = if rigid {
            PLAYER_MASS * (RIGID_MASS_MULTIPLIER - 1.0)
        } else {
            0.0
        };
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_additional_mass(extra, true);
        }
    }

    /// Teleport a body to (x, y) at rest
    pub fn reset_body(&mut self, handle: BodyHandle, x: f32, y: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_translation(vector![x, y], true);
            body.set_linvel(vector![0.0, 0.0], true);
            body.set_angvel(0.0, true);
            body.reset_forces(true);
        }
    }

    pub fn position(&self, handle: BodyHandle) -> Option<(f32, f32)> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            (t.x, t.y)
        })
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<(f32, f32)> {
        self.bodies.get(handle).map(|b| {
            let v = b.linvel();
            (v.x, v.y)
        })
    }

    /// Advance one tick and return the body pairs that started touching
    pub fn step(&mut self) -> Vec<ContactStart> {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &self.collector,
        );

        // User forces persist in rapier until cleared; ours are per tick
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
        }

        let started = std::mem::take(&mut *self.collector.started.lock());
        started
            .into_iter()
            .filter_map(|(c1, c2)| {
                let a = self.colliders.get(c1)?.parent()?;
                let b = self.colliders.get(c2)?.parent()?;
                Some(ContactStart { a, b })
            })
            .collect()
    }
}
