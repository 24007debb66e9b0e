//! Terrain blocks: one per non-blank bitmap cell.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rapier2d::prelude::*;
use tracing::{debug, info, trace};

use crate::catalog::{
    Behavior, BlockSpec, BreakParams, Catalog, Downhill, MoveParams, PivotParams, RopeParams,
};
use crate::collision::{self, Contact};
use crate::events::GameEvent;
use crate::physics::{BodyTag, CollisionFilter, PhysicsWorld, Pivot, polygon_collider};
use crate::rope::{PendingRope, RopeId};
use crate::seesaw::{PendingSeesaw, SeesawId};

/// Air drag for free-swinging bodies, per second.
pub(crate) const AIR_DAMPING: f32 = 3.0;

/// Per-tick decay of seesaw angular velocity.
const PIVOT_SPIN_DECAY: f32 = 0.98;
/// Angular velocity kept when a seesaw hits its rotation limit.
const PIVOT_CLAMP_RETENTION: f32 = 0.3;
/// Angular velocity kept the tick a rider steps off.
const PIVOT_RELEASE_RETENTION: f32 = 0.9;
const PIVOT_RELEASE_RESTORING: f32 = 0.03;
/// Push pressing the rider onto a seesaw surface, px/tick.
const PIVOT_ATTACH_ACCEL: f32 = 0.04;

const SHARD_GRAVITY: f32 = 0.1;
const SHARD_SPIN_DECAY: f32 = 0.98;

/// Registries a level build hands to every block it spawns. Consumed once
/// the bitmap has been walked.
#[derive(Debug, Default)]
pub struct PendingAssembly {
    pub ropes: Vec<PendingRope>,
    pub seesaws: Vec<PendingSeesaw>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingState {
    pub params: MoveParams,
    /// Starting (lowest) center height.
    pub baseline: f32,
    pub moving_up: bool,
}

impl MovingState {
    /// Next center height for a platform at `y`; flips direction at either end.
    pub fn advance(&mut self, y: f32) -> f32 {
        if self.moving_up {
            if y > self.baseline - self.params.distance {
                return y - self.params.speed;
            }
            self.moving_up = false;
        } else {
            if y < self.baseline {
                return y + self.params.speed;
            }
            self.moving_up = true;
        }
        y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotState {
    pub params: PivotParams,
    /// Pin to the world; `None` for members folded into a seesaw group.
    pub pivot: Option<Pivot>,
    pub seesaw: Option<SeesawId>,
    /// Only the primary block of a group drives the shared body.
    pub primary: bool,
    pub player_on: bool,
    pub width: f32,
}

impl PivotState {
    pub fn merged(&self) -> bool {
        self.seesaw.is_some()
    }
}

/// Where a rope block sits in its rope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RopeRole {
    Single,
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopeBlockState {
    pub params: RopeParams,
    pub anchor: Vector,
    pub rope: Option<RopeId>,
    pub role: RopeRole,
}

/// A flying glass shard. Purely visual, never enters the physics world.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vector,
    pub velocity: Vector,
    pub angle: f32,
    pub spin: f32,
    pub vertices: Vec<[f32; 2]>,
    pub lifetime: i32,
    pub max_lifetime: i32,
}

impl Particle {
    pub fn update(&mut self) {
        self.velocity.y += SHARD_GRAVITY;
        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;
        self.angle += self.spin * SHARD_SPIN_DECAY;
        self.spin *= SHARD_SPIN_DECAY;
        self.lifetime -= 1;
    }

    /// Remaining life as an opacity in `0..=255`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn opacity(&self) -> u8 {
        if self.max_lifetime <= 0 {
            return 0;
        }
        let ratio = (self.lifetime.max(0) as f32 / self.max_lifetime as f32).min(1.0);
        (ratio * 255.0) as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlassState {
    pub params: BreakParams,
    pub broken: bool,
    pub particles: Vec<Particle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockState {
    Static,
    Moving(MovingState),
    Pivoting(PivotState),
    Rope(RopeBlockState),
    Breakable(GlassState),
}

/// Per-tick inputs for reacting to the player.
pub struct ContactContext<'a> {
    pub player_body: RigidBodyHandle,
    pub player_collider: ColliderHandle,
    /// Player velocity before the physics step, px/tick.
    pub impact_velocity: Vector,
    pub rng: &'a mut ChaCha8Rng,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub index: usize,
    pub symbol: char,
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub slope: Option<Downhill>,
    pub goal: bool,
    pub hidden: bool,
    pub state: BlockState,
    /// Contact points with the player from the last tick.
    pub supports: Vec<Vector>,
    pub contact_angle: Option<f32>,
    pub size: [f32; 2],
}

impl Block {
    /// Spawns the block for `spec` with its top-left cell corner at `corner`.
    pub fn spawn(
        world: &mut PhysicsWorld,
        spec: &BlockSpec,
        index: usize,
        corner: Vector,
        pending: &mut PendingAssembly,
    ) -> Self {
        let tag = BodyTag::Block(index).encode();
        let (body, collider, state) = match spec.behavior {
            Behavior::Rope(params) => {
                let body = world.add_rigid_body(
                    RigidBodyBuilder::fixed()
                        .translation(corner)
                        .user_data(BodyTag::RopeAnchor(index).encode())
                        .build(),
                );
                let collider = world.add_collider(
                    ColliderBuilder::ball(params.segment_radius * 2.0)
                        .collision_groups(CollisionFilter::rope().groups())
                        .build(),
                    body,
                );
                pending.ropes.push(PendingRope {
                    block: index,
                    anchor: corner,
                });
                let state = BlockState::Rope(RopeBlockState {
                    params,
                    anchor: corner,
                    rope: None,
                    role: RopeRole::Single,
                });
                (body, collider, state)
            }
            Behavior::Pivoting(params) => {
                let body = world.add_rigid_body(
                    RigidBodyBuilder::dynamic()
                        .translation(corner)
                        .linear_damping(AIR_DAMPING)
                        .angular_damping(AIR_DAMPING)
                        .user_data(tag)
                        .build(),
                );
                let collider = world.add_collider(
                    shape_collider(&spec.shape.points)
                        .collision_groups(CollisionFilter::terrain().groups())
                        .density(params.density)
                        .friction(params.friction)
                        .restitution(params.restitution)
                        .build(),
                    body,
                );
                let pivot = world.add_pivot(body, corner);
                pending.seesaws.push(PendingSeesaw {
                    block: index,
                    position: corner,
                });
                let state = BlockState::Pivoting(PivotState {
                    params,
                    pivot: Some(pivot),
                    seesaw: None,
                    primary: true,
                    player_on: false,
                    width: spec.shape.size()[0],
                });
                (body, collider, state)
            }
            behavior => {
                let (points, center) = spec.shape.recentered();
                let translation = Vector::new(corner.x + center[0], corner.y + center[1]);
                let builder = if matches!(behavior, Behavior::Moving(_)) {
                    RigidBodyBuilder::kinematic_position_based()
                } else {
                    RigidBodyBuilder::fixed()
                };
                let body =
                    world.add_rigid_body(builder.translation(translation).user_data(tag).build());
                let collider = world.add_collider(
                    shape_collider(&points)
                        .collision_groups(CollisionFilter::terrain().groups())
                        .build(),
                    body,
                );
                let state = match behavior {
                    Behavior::Moving(params) => BlockState::Moving(MovingState {
                        params,
                        baseline: translation.y,
                        moving_up: true,
                    }),
                    Behavior::Breakable(params) => BlockState::Breakable(GlassState {
                        params,
                        broken: false,
                        particles: Vec::new(),
                    }),
                    _ => BlockState::Static,
                };
                (body, collider, state)
            }
        };

        debug!(index, symbol = %spec.symbol, x = corner.x, y = corner.y, "spawned block");
        Self {
            index,
            symbol: spec.symbol,
            body,
            collider,
            slope: spec.slope,
            goal: spec.goal,
            hidden: false,
            state,
            supports: Vec::new(),
            contact_angle: None,
            size: spec.shape.size(),
        }
    }

    /// Whether this block takes part in the per-tick update and contact pass.
    pub fn is_active(&self) -> bool {
        match &self.state {
            BlockState::Rope(_) => !self.hidden,
            BlockState::Pivoting(pivot) => pivot.primary,
            BlockState::Breakable(glass) => !glass.broken,
            _ => true,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(&self.state, BlockState::Breakable(glass) if glass.broken)
    }

    pub fn particles(&self) -> &[Particle] {
        match &self.state {
            BlockState::Breakable(glass) => &glass.particles,
            _ => &[],
        }
    }

    /// Autonomous behavior: platform travel, seesaw limits, shard decay.
    pub fn update(&mut self, world: &mut PhysicsWorld) {
        match &mut self.state {
            BlockState::Moving(moving) => {
                if let Some(pos) = world.translation(self.body) {
                    let y = moving.advance(pos.y);
                    world.set_next_kinematic_translation(self.body, Vector::new(pos.x, y));
                }
            }
            BlockState::Pivoting(pivot) if pivot.primary => {
                let (Some(angle), Some(angvel)) =
                    (world.angle(self.body), world.angular_velocity(self.body))
                else {
                    return;
                };
                let mut angvel = angvel * PIVOT_SPIN_DECAY;
                if !pivot.merged() {
                    angvel -= angle * pivot.params.restoring;
                }
                let (clamped, angvel) = clamp_pivot(angle, angvel, pivot.params.max_angle);
                if let Some(limit) = clamped {
                    world.set_angle(self.body, limit);
                }
                world.set_angular_velocity(self.body, angvel);
            }
            BlockState::Breakable(glass) => {
                for particle in &mut glass.particles {
                    particle.update();
                }
                glass.particles.retain(|p| p.lifetime > 0);
            }
            _ => {}
        }
    }

    /// Reacts to this tick's contact with the player.
    pub fn run(
        &mut self,
        world: &mut PhysicsWorld,
        ctx: &mut ContactContext<'_>,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !self.is_active() || matches!(self.state, BlockState::Rope(_)) {
            return events;
        }

        let Some(contact) = collision::classify(world, self.collider, ctx.player_collider) else {
            self.clear_contact(world);
            return events;
        };

        trace!(index = self.index, supports = contact.supports.len(), "player contact");
        self.contact_angle = Some(contact.tangent_angle());
        self.supports.clone_from(&contact.supports);

        if self.goal {
            events.push(GameEvent::GoalReached { block: self.index });
        }

        match &mut self.state {
            BlockState::Breakable(glass) => {
                if exceeds_break_speed(ctx.impact_velocity, glass.params.break_speed) {
                    let center = world.translation(self.body).unwrap_or_default();
                    world.remove_rigid_body(self.body);
                    glass.broken = true;
                    glass.particles =
                        shatter(center, self.size, ctx.impact_velocity, &glass.params, ctx.rng);
                    self.supports.clear();
                    self.contact_angle = None;
                    info!(index = self.index, shards = glass.particles.len(), "glass broken");
                    events.push(GameEvent::GlassBroken { block: self.index });
                }
            }
            BlockState::Pivoting(pivot) => {
                pivot.player_on = true;
                react_to_rider(world, self.body, &contact, pivot, ctx);
            }
            _ => {}
        }
        events
    }

    fn clear_contact(&mut self, world: &mut PhysicsWorld) {
        self.supports.clear();
        self.contact_angle = None;

        let BlockState::Pivoting(pivot) = &mut self.state else {
            return;
        };
        if !pivot.player_on {
            return;
        }
        pivot.player_on = false;
        if let (Some(angle), Some(angvel)) =
            (world.angle(self.body), world.angular_velocity(self.body))
        {
            world.set_angular_velocity(
                self.body,
                angvel * PIVOT_RELEASE_RETENTION - angle * PIVOT_RELEASE_RESTORING,
            );
        }
    }
}

/// Convex collider for a body-local polygon, falling back to its bounding box.
fn shape_collider(points: &[[f32; 2]]) -> ColliderBuilder {
    polygon_collider(points).unwrap_or_else(|| {
        let shape = crate::catalog::Shape {
            points: points.to_vec(),
        };
        let [w, h] = shape.size();
        ColliderBuilder::cuboid(w / 2.0, h / 2.0)
    })
}

/// Tilts the seesaw toward the rider's side and presses the rider onto it.
fn react_to_rider(
    world: &mut PhysicsWorld,
    body: RigidBodyHandle,
    contact: &Contact,
    pivot: &PivotState,
    ctx: &ContactContext<'_>,
) {
    let (Some(center), Some(rider), Some(angle), Some(angvel)) = (
        world.translation(body),
        world.translation(ctx.player_body),
        world.angle(body),
        world.angular_velocity(body),
    ) else {
        return;
    };
    if !contact.supporting {
        return;
    }

    let half = (pivot.width / 2.0).max(1.0);
    let lever = ((rider.x - center.x) / half).clamp(-1.0, 1.0);
    world.set_angular_velocity(body, angvel + lever * pivot.params.tilt_response);

    let normal = Vector::new(-angle.sin(), angle.cos());
    world.apply_velocity_impulse(
        ctx.player_body,
        Vector::new(normal.x * PIVOT_ATTACH_ACCEL, normal.y * PIVOT_ATTACH_ACCEL),
    );
}

/// Wraps `angle` into `[-π, π]` and clamps it to `±max_angle`.
///
/// Returns the limit angle to write back when clamping happened, plus the
/// resulting angular velocity.
pub fn clamp_pivot(angle: f32, angvel: f32, max_angle: f32) -> (Option<f32>, f32) {
    use std::f32::consts::{PI, TAU};

    let mut wrapped = angle % TAU;
    if wrapped > PI {
        wrapped -= TAU;
    } else if wrapped < -PI {
        wrapped += TAU;
    }
    if wrapped.abs() > max_angle {
        (
            Some(max_angle.copysign(wrapped)),
            angvel * PIVOT_CLAMP_RETENTION,
        )
    } else {
        (None, angvel)
    }
}

/// Glass breaks when the larger velocity component beats the threshold.
pub fn exceeds_break_speed(velocity: Vector, break_speed: f32) -> bool {
    velocity.x.abs().max(velocity.y.abs()) > break_speed
}

/// Spawns shards spread over the block, thrown along the impact direction.
pub fn shatter(
    center: Vector,
    size: [f32; 2],
    impact: Vector,
    params: &BreakParams,
    rng: &mut ChaCha8Rng,
) -> Vec<Particle> {
    use std::f32::consts::TAU;

    const DIRECTION_BIAS: f32 = 0.7;
    const IRREGULARITY: f32 = 0.5;

    let speed = impact.x.hypot(impact.y);
    let dir = if speed > 0.0 {
        Vector::new(impact.x / speed, impact.y / speed)
    } else {
        Vector::new(0.0, 0.0)
    };

    (0..params.particle_count)
        .map(|_| {
            let radius = rng.random_range(5.0..15.0_f32);
            let vertex_count: usize = rng.random_range(3..6);
            #[allow(clippy::cast_precision_loss)]
            let vertices = (0..vertex_count)
                .map(|j| {
                    let theta = j as f32 / vertex_count as f32 * TAU;
                    let jitter = rng.random_range(0.0..IRREGULARITY * 2.0);
                    let r = radius * (1.0 - IRREGULARITY + jitter);
                    [theta.cos() * r, theta.sin() * r]
                })
                .collect();

            let offset = Vector::new(
                rng.random_range(-size[0] / 2.0..=size[0] / 2.0),
                rng.random_range(-size[1] / 2.0..=size[1] / 2.0),
            );
            let throw = rng.random_range(2.0..8.0_f32);
            let spread_x = rng.random_range(-1.0..1.0_f32);
            let vx = (dir.x * DIRECTION_BIAS + spread_x * (1.0 - DIRECTION_BIAS)) * throw;
            let spread_y = rng.random_range(-1.0..1.0_f32);
            let lift = rng.random_range(1.0..3.0_f32);
            let vy = (dir.y * DIRECTION_BIAS + spread_y * (1.0 - DIRECTION_BIAS)) * throw - lift;
            let lifetime = params.particle_lifetime + rng.random_range(-10..=10);

            Particle {
                position: Vector::new(center.x + offset.x, center.y + offset.y),
                velocity: Vector::new(vx, vy),
                angle: rng.random_range(0.0..TAU),
                spin: rng.random_range(-0.2..0.2_f32),
                vertices,
                lifetime,
                max_lifetime: lifetime,
            }
        })
        .collect()
}

/// Spawns the block for the bitmap cell at `(row, column)`.
pub(crate) fn spawn_cell(
    world: &mut PhysicsWorld,
    catalog: &Catalog,
    spec: &BlockSpec,
    index: usize,
    row: usize,
    column: usize,
    pending: &mut PendingAssembly,
) -> Block {
    let bs = catalog.block_size();
    #[allow(clippy::cast_precision_loss)]
    let corner = Vector::new(column as f32 * bs, row as f32 * bs);
    Block::spawn(world, spec, index, corner, pending)
}
