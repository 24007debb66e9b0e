//! Physics simulation using `Rapier2D`, expressed in per-tick gameplay units.
//!
//! Gameplay code tunes everything per tick (px/tick, rad/tick) the way the
//! level designers think about it. Rapier integrates in seconds, so every
//! velocity that crosses this boundary is scaled by [`TICK_RATE`].

use std::fmt;
use std::sync::mpsc;

use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

/// Simulation ticks per second.
pub const TICK_RATE: f32 = 60.0;

/// Fixed timestep for physics simulation (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / TICK_RATE;

/// World units (pixels) treated as one meter by the solver tolerances.
pub const LENGTH_UNIT: f32 = 50.0;

/// Default gravity vector (downward, in pixels/s²).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, 981.0)
}

// ============================================================================
// Collision filtering
// ============================================================================

/// Bitmask pair deciding which colliders generate contacts.
///
/// Two colliders interact only when each one's `memberships` intersects the
/// other's `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub memberships: u32,
    pub filter: u32,
}

impl CollisionFilter {
    pub const PLAYER: u32 = 0b0001;
    pub const TERRAIN: u32 = 0b0010;
    pub const ROPE: u32 = 0b0100;
    pub const ALL: u32 = u32::MAX;

    pub const fn new(memberships: u32, filter: u32) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    /// The player collides with everything.
    pub const fn player() -> Self {
        Self::new(Self::PLAYER, Self::ALL)
    }

    pub const fn terrain() -> Self {
        Self::new(Self::TERRAIN, Self::ALL)
    }

    /// Rope anchors and segments only ever touch the player.
    pub const fn rope() -> Self {
        Self::new(Self::ROPE, Self::PLAYER)
    }

    /// Returns a copy that no longer accepts contacts from `bits`.
    pub const fn without(self, bits: u32) -> Self {
        Self::new(self.memberships, self.filter & !bits)
    }

    pub const fn interacts_with(self, other: Self) -> bool {
        self.memberships & other.filter != 0 && other.memberships & self.filter != 0
    }

    pub fn groups(self) -> InteractionGroups {
        InteractionGroups::all()
            .with_memberships(Group::from_bits_truncate(self.memberships))
            .with_filter(Group::from_bits_truncate(self.filter))
    }

    fn from_groups(groups: InteractionGroups) -> Self {
        Self::new(groups.memberships.bits(), groups.filter.bits())
    }
}

// ============================================================================
// user_data tagging
// ============================================================================

const TAG_PLAYER: u64 = 1;
const TAG_BLOCK: u64 = 2;
const TAG_ROPE_ANCHOR: u64 = 3;
const TAG_ROPE_SEGMENT: u64 = 4;
const TAG_PIVOT_ANCHOR: u64 = 5;

/// Identifies what game entity a rapier body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTag {
    Player,
    /// Terrain block, by index into the level's block list.
    Block(usize),
    /// Rope anchor, by index of the block that spawned it.
    RopeAnchor(usize),
    /// Rope segment, by rope index.
    RopeSegment(usize),
    PivotAnchor,
}

impl BodyTag {
    /// Encodes the tag into rapier `user_data` as `(tag << 64) | id`.
    pub fn encode(self) -> u128 {
        let (tag, id) = match self {
            Self::Player => (TAG_PLAYER, 0),
            Self::Block(id) => (TAG_BLOCK, id as u64),
            Self::RopeAnchor(id) => (TAG_ROPE_ANCHOR, id as u64),
            Self::RopeSegment(id) => (TAG_ROPE_SEGMENT, id as u64),
            Self::PivotAnchor => (TAG_PIVOT_ANCHOR, 0),
        };
        (u128::from(tag) << 64) | u128::from(id)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(user_data: u128) -> Option<Self> {
        let tag = (user_data >> 64) as u64;
        let id = user_data as u64 as usize;
        match tag {
            TAG_PLAYER => Some(Self::Player),
            TAG_BLOCK => Some(Self::Block(id)),
            TAG_ROPE_ANCHOR => Some(Self::RopeAnchor(id)),
            TAG_ROPE_SEGMENT => Some(Self::RopeSegment(id)),
            TAG_PIVOT_ANCHOR => Some(Self::PivotAnchor),
            _ => None,
        }
    }
}

// ============================================================================
// Joints
// ============================================================================

/// Soft point-to-point constraint.
///
/// `stiffness` and `damping` are the fraction of the length error corrected
/// per tick, the same scale the level tuning uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSpec {
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

/// A body pinned to a world point: the fixed anchor body plus the revolute
/// joint holding the two together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pivot {
    pub anchor: RigidBodyHandle,
    pub joint: ImpulseJointHandle,
}

/// A "collision started" notification for one collider pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionStarted {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
}

impl CollisionStarted {
    /// Returns the collider paired with `handle`, if `handle` is involved.
    pub fn other(&self, handle: ColliderHandle) -> Option<ColliderHandle> {
        if self.collider1 == handle {
            Some(self.collider2)
        } else if self.collider2 == handle {
            Some(self.collider1)
        } else {
            None
        }
    }
}

// ============================================================================
// World
// ============================================================================

/// Physics world containing all `Rapier2D` components.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("joint_count", &self.impulse_joint_set.len())
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates a new physics world with default settings.
    pub fn new() -> Self {
        Self::with_gravity(default_gravity())
    }

    /// Creates a new physics world with custom gravity.
    pub fn with_gravity(gravity: Vector) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            length_unit: LENGTH_UNIT,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity,
            frame: 0,
        }
    }

    /// Advances the simulation by one tick and returns the collider pairs
    /// that started touching during it.
    pub fn step(&mut self) -> Vec<CollisionStarted> {
        let (collision_send, collision_recv) = mpsc::channel::<CollisionEvent>();
        let (force_send, _force_recv) = mpsc::channel::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &event_handler,
        );
        self.frame += 1;

        let mut started = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            if let CollisionEvent::Started(collider1, collider2, _flags) = event {
                started.push(CollisionStarted {
                    collider1,
                    collider2,
                });
            }
        }
        started
    }

    /// Advances the simulation by multiple ticks, discarding events.
    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Returns the current simulation frame number.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Discards every body, collider and joint.
    pub fn reset(&mut self) {
        *self = Self::with_gravity(self.gravity);
    }

    // ------------------------------------------------------------------
    // Bodies and colliders
    // ------------------------------------------------------------------

    /// Adds a rigid body to the world and returns its handle.
    pub fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    /// Adds a collider attached to a rigid body.
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Removes a rigid body together with its colliders and joints.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    /// Gets an immutable reference to a rigid body.
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Gets a mutable reference to a rigid body.
    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    pub fn body_tag(&self, handle: RigidBodyHandle) -> Option<BodyTag> {
        self.rigid_body_set
            .get(handle)
            .and_then(|body| BodyTag::decode(body.user_data))
    }

    /// Resolves a collider to its parent body and that body's tag.
    pub fn collider_owner(&self, handle: ColliderHandle) -> Option<(RigidBodyHandle, BodyTag)> {
        let parent = self.collider_set.get(handle)?.parent()?;
        Some((parent, self.body_tag(parent)?))
    }

    pub fn collision_filter(&self, handle: ColliderHandle) -> Option<CollisionFilter> {
        self.collider_set
            .get(handle)
            .map(|collider| CollisionFilter::from_groups(collider.collision_groups()))
    }

    pub fn set_collision_filter(&mut self, handle: ColliderHandle, filter: CollisionFilter) {
        if let Some(collider) = self.collider_set.get_mut(handle) {
            collider.set_collision_groups(filter.groups());
        }
    }

    pub fn set_friction(&mut self, handle: ColliderHandle, friction: f32) {
        if let Some(collider) = self.collider_set.get_mut(handle) {
            collider.set_friction(friction);
        }
    }

    // ------------------------------------------------------------------
    // Pose and velocity, in tick units
    // ------------------------------------------------------------------

    pub fn translation(&self, handle: RigidBodyHandle) -> Option<Vector> {
        self.rigid_body_set.get(handle).map(|body| {
            let pos = body.translation();
            Vector::new(pos.x, pos.y)
        })
    }

    pub fn set_translation(&mut self, handle: RigidBodyHandle, translation: Vector) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_translation(translation, true);
        }
    }

    /// Shifts a body by `offset` without touching its velocity.
    pub fn translate(&mut self, handle: RigidBodyHandle, offset: Vector) {
        if let Some(pos) = self.translation(handle) {
            self.set_translation(handle, Vector::new(pos.x + offset.x, pos.y + offset.y));
        }
    }

    pub fn angle(&self, handle: RigidBodyHandle) -> Option<f32> {
        self.rigid_body_set
            .get(handle)
            .map(|body| body.rotation().angle())
    }

    pub fn set_angle(&mut self, handle: RigidBodyHandle, angle: f32) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_rotation(Rotation::from_angle(angle), true);
        }
    }

    /// Linear velocity in px/tick.
    pub fn velocity(&self, handle: RigidBodyHandle) -> Option<Vector> {
        self.rigid_body_set.get(handle).map(|body| {
            let vel = body.linvel();
            Vector::new(vel.x / TICK_RATE, vel.y / TICK_RATE)
        })
    }

    /// Overwrites linear velocity, given in px/tick.
    pub fn set_velocity(&mut self, handle: RigidBodyHandle, velocity: Vector) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_linvel(
                Vector::new(velocity.x * TICK_RATE, velocity.y * TICK_RATE),
                true,
            );
        }
    }

    /// Adds `delta` (px/tick) to a body's velocity through a mass-scaled impulse.
    pub fn apply_velocity_impulse(&mut self, handle: RigidBodyHandle, delta: Vector) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            let mass = body.mass();
            body.apply_impulse(
                Vector::new(delta.x * TICK_RATE * mass, delta.y * TICK_RATE * mass),
                true,
            );
        }
    }

    /// Angular velocity in rad/tick.
    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> Option<f32> {
        self.rigid_body_set
            .get(handle)
            .map(|body| body.angvel() / TICK_RATE)
    }

    /// Overwrites angular velocity, given in rad/tick.
    pub fn set_angular_velocity(&mut self, handle: RigidBodyHandle, angvel: f32) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_angvel(angvel * TICK_RATE, true);
        }
    }

    /// Queues the next pose of a kinematic body.
    pub fn set_next_kinematic_translation(&mut self, handle: RigidBodyHandle, translation: Vector) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_next_kinematic_translation(translation);
        }
    }

    // ------------------------------------------------------------------
    // Joints
    // ------------------------------------------------------------------

    /// Connects two bodies with a soft spring at their origins.
    pub fn add_link(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        spec: LinkSpec,
    ) -> ImpulseJointHandle {
        let joint = SpringJointBuilder::new(
            spec.rest_length,
            spec.stiffness * TICK_RATE * TICK_RATE,
            spec.damping * TICK_RATE,
        )
        .spring_model(MotorModel::AccelerationBased);
        self.impulse_joint_set.insert(body1, body2, joint, true)
    }

    /// Pins `body`'s origin to the world point `at`, leaving rotation free.
    ///
    /// `body` must already sit with its origin on `at`.
    pub fn add_pivot(&mut self, body: RigidBodyHandle, at: Vector) -> Pivot {
        let anchor = self.add_rigid_body(
            RigidBodyBuilder::fixed()
                .translation(at)
                .user_data(BodyTag::PivotAnchor.encode())
                .build(),
        );
        let joint = self
            .impulse_joint_set
            .insert(anchor, body, RevoluteJointBuilder::new(), true);
        Pivot { anchor, joint }
    }

    /// Removes a pivot; the pinned body itself stays in the world.
    pub fn remove_pivot(&mut self, pivot: Pivot) {
        self.remove_rigid_body(pivot.anchor);
    }

    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) {
        self.impulse_joint_set.remove(handle, true);
    }

    pub fn contains_joint(&self, handle: ImpulseJointHandle) -> bool {
        self.impulse_joint_set.get(handle).is_some()
    }
}

/// Builds a convex collider from a polygon given in body-local space.
pub fn polygon_collider(points: &[[f32; 2]]) -> Option<ColliderBuilder> {
    let points: Vec<Vector> = points.iter().map(|p| Vector::new(p[0], p[1])).collect();
    ColliderBuilder::convex_hull(&points)
}
