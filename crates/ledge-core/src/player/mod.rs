//! The player: body, sensors and the per-tick controller.

mod motion;
mod rope_grab;
mod sensors;

pub use motion::{Motion, Steer, slope_modifier};
pub use rope_grab::RopeGrab;
pub use sensors::Sensors;

use rapier2d::prelude::*;
use tracing::{debug, trace};

use crate::block::{Block, BlockState};
use crate::catalog::{Downhill, PivotParams};
use crate::config::{GameConfig, PlayerConfig};
use crate::events::{GameEvent, Side};
use crate::input::{InputSource, Key};
use crate::level::Level;
use crate::physics::{BodyTag, CollisionFilter, CollisionStarted, PhysicsWorld};

/// Seesaw tilt past which the rider gets extra grip help, in radians.
const SEESAW_STEEP: f32 = 0.2;
const SEESAW_BASE_FRICTION: f32 = 0.2;
/// Downward push on the low side of a tilted seesaw, px/tick.
const SEESAW_PRESS: f32 = 0.04;
/// Upward velocity kept when bouncing on the high side.
const SEESAW_BOUNCE_RETENTION: f32 = 0.8;
/// How much of a seesaw's own tilt response the rider adds while standing.
const SEESAW_RIDER_TORQUE: f32 = 0.4;
/// Tilt past which the rider's speed follows the seesaw surface, in radians.
const SEESAW_CARRY_ANGLE: f32 = 0.3;
/// Seesaw spin, rad/tick, below which the surface is treated as still.
const SEESAW_CARRY_MIN_SPIN: f32 = 0.01;
/// Share of the surface's tangential speed blended into the rider's speed.
const SEESAW_CARRY_BLEND: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct JumpState {
    /// Set once a jump fires; cleared when the key is released.
    latched: bool,
    consecutive: u32,
    grounded_ticks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub width: f32,
    pub height: f32,
    pub motion: Motion,
    pub sensors: Sensors,
    /// Distinct surface angles touching the player, reported on change.
    pub contact_angles: Vec<i32>,
    pub grab: Option<RopeGrab>,
    pub died: bool,
    jump: JumpState,
    regrab_cooldown: u32,
}

impl Player {
    /// Creates the player body centered on `position`.
    pub fn spawn(world: &mut PhysicsWorld, position: Vector, config: &PlayerConfig) -> Self {
        let body = world.add_rigid_body(
            RigidBodyBuilder::dynamic()
                .translation(position)
                .lock_rotations()
                .can_sleep(false)
                .ccd_enabled(true)
                .user_data(BodyTag::Player.encode())
                .build(),
        );
        let collider = world.add_collider(
            ColliderBuilder::cuboid(config.width / 2.0, config.height / 2.0)
                .collision_groups(CollisionFilter::player().groups())
                .friction(config.friction)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            body,
        );
        debug!(x = position.x, y = position.y, "spawned player");

        Self {
            body,
            collider,
            width: config.width,
            height: config.height,
            motion: Motion::default(),
            sensors: Sensors::default(),
            contact_angles: Vec::new(),
            grab: None,
            died: false,
            jump: JumpState::default(),
            regrab_cooldown: 0,
        }
    }

    pub fn position(&self, world: &PhysicsWorld) -> Option<Vector> {
        world.translation(self.body)
    }

    pub fn is_grabbing(&self) -> bool {
        self.grab.is_some()
    }

    pub fn consecutive_jumps(&self) -> u32 {
        self.jump.consecutive
    }

    /// Grabs a rope when the player falls onto one of its segments.
    pub fn on_collision_started(
        &mut self,
        world: &mut PhysicsWorld,
        event: CollisionStarted,
        level: &Level,
        config: &GameConfig,
    ) -> Option<GameEvent> {
        let other = event.other(self.collider)?;
        let (_, BodyTag::RopeSegment(rope)) = world.collider_owner(other)? else {
            return None;
        };
        if self.grab.is_some() || self.regrab_cooldown > 0 {
            return None;
        }
        if world.velocity(self.body)?.y <= 0.0 {
            return None;
        }
        let links = &level.ropes.get(rope)?.links;
        self.grab_rope(world, rope, other, links, &config.rope)
    }

    /// Runs the controller for one tick, after blocks have classified contact.
    pub fn run(
        &mut self,
        world: &mut PhysicsWorld,
        level: &Level,
        input: &impl InputSource,
        config: &GameConfig,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(center) = world.translation(self.body) else {
            return events;
        };
        self.regrab_cooldown = self.regrab_cooldown.saturating_sub(1);

        let supports: Vec<Vector> = level
            .blocks
            .iter()
            .flat_map(|block| block.supports.iter().copied())
            .collect();
        self.track_contact_angles(&level.blocks, &mut events);
        self.sensors = Sensors::detect(&supports, center, self.width, self.height);

        self.assist_seesaw(world, level, center, config);

        if self.grab.is_some() {
            self.swing(world, input, &config.rope);
            if input.is_down(Key::Release) {
                events.extend(self.release_rope(world, &config.rope));
            }
        } else {
            let slope = self.slope_underfoot(&level.blocks, center);
            let steer = Steer {
                left: input.is_down(Key::Left),
                right: input.is_down(Key::Right),
            };
            self.motion.step(&config.player, slope, steer);

            let vy = world.velocity(self.body).map_or(0.0, |v| v.y);
            let max_fall = config.world.max_fall_speed;
            let vy = vy.clamp(-max_fall, max_fall);
            world.set_velocity(self.body, Vector::new(self.motion.speed, vy));

            events.extend(self.jump(world, input, &config.player));
            self.track_grounded(&config.player);
        }

        if center.y > level.height + config.world.death_margin {
            debug!(y = center.y, "player fell out of the level");
            self.died = true;
            events.push(GameEvent::Died);
        }
        events
    }

    fn track_contact_angles(&mut self, blocks: &[Block], events: &mut Vec<GameEvent>) {
        #[allow(clippy::cast_possible_truncation)]
        let mut angles: Vec<i32> = blocks
            .iter()
            .filter_map(|block| block.contact_angle)
            .map(|angle| (angle + 90.0).round() as i32)
            .collect();
        angles.sort_unstable();
        angles.dedup();
        if angles != self.contact_angles {
            trace!(?angles, "contact angles changed");
            self.contact_angles.clone_from(&angles);
            events.push(GameEvent::ContactAnglesChanged { angles });
        }
    }

    /// Slope of the first block with a support point on the feet line.
    fn slope_underfoot(&self, blocks: &[Block], center: Vector) -> Option<Downhill> {
        if !self.sensors.bottom {
            return None;
        }
        blocks
            .iter()
            .find(|block| {
                block
                    .supports
                    .iter()
                    .any(|&point| Sensors::at_feet(point, center, self.height))
            })
            .and_then(|block| block.slope)
    }

    /// Keeps a rider planted on a tilting seesaw.
    fn assist_seesaw(
        &mut self,
        world: &mut PhysicsWorld,
        level: &Level,
        center: Vector,
        config: &GameConfig,
    ) {
        let riding = level.blocks.iter().find_map(|block| match &block.state {
            BlockState::Pivoting(pivot) if pivot.primary && pivot.player_on => {
                Some((block.body, pivot.params))
            }
            _ => None,
        });
        let Some((seesaw, params)) = riding.filter(|_| self.sensors.bottom) else {
            world.set_friction(self.collider, config.player.friction);
            return;
        };
        self.ride(world, seesaw, &params, center, &config.player);
    }

    fn ride(
        &mut self,
        world: &mut PhysicsWorld,
        seesaw: RigidBodyHandle,
        params: &PivotParams,
        center: Vector,
        config: &PlayerConfig,
    ) {
        let (Some(pivot), Some(angle), Some(angvel), Some(velocity)) = (
            world.translation(seesaw),
            world.angle(seesaw),
            world.angular_velocity(seesaw),
            world.velocity(self.body),
        ) else {
            return;
        };
        let rel_x = center.x - pivot.x;

        let tilt = angle.sin().abs();
        world.set_friction(
            self.collider,
            SEESAW_BASE_FRICTION + tilt * (config.seesaw_friction - SEESAW_BASE_FRICTION),
        );

        if angle.abs() > SEESAW_STEEP {
            if angle * rel_x > 0.0 {
                world.apply_velocity_impulse(self.body, Vector::new(0.0, SEESAW_PRESS));
            } else if angle * rel_x < 0.0 && velocity.y < 0.0 {
                world.set_velocity(
                    self.body,
                    Vector::new(velocity.x, velocity.y * SEESAW_BOUNCE_RETENTION),
                );
            }
        }

        let nudge = params.tilt_response * SEESAW_RIDER_TORQUE;
        world.set_angular_velocity(seesaw, angvel + nudge.copysign(rel_x));

        if angle.abs() > SEESAW_CARRY_ANGLE && angvel.abs() > SEESAW_CARRY_MIN_SPIN {
            self.motion.speed = carried_speed(self.motion.speed, angvel, rel_x);
        }
    }

    fn jump(
        &mut self,
        world: &mut PhysicsWorld,
        input: &impl InputSource,
        config: &PlayerConfig,
    ) -> Option<GameEvent> {
        let held = input.is_down(Key::Jump) || input.is_down(Key::Up);
        if !held {
            self.jump.latched = false;
            return None;
        }
        if self.jump.latched {
            return None;
        }

        let sensors = self.sensors;
        if sensors.bottom && !sensors.left && !sensors.right {
            self.jump.consecutive += 1;
            self.motion.apply_jump_penalty(config, self.jump.consecutive);
            world.translate(self.body, Vector::new(0.0, -config.jump_nudge));
            world.apply_velocity_impulse(self.body, Vector::new(0.0, -config.jump_speed));
            self.sensors.bottom = false;
            self.jump.latched = true;
            trace!(consecutive = self.jump.consecutive, "jump");
            return Some(GameEvent::Jumped {
                consecutive: self.jump.consecutive,
            });
        }

        // `bottom` may still be set by a wall contact on the feet line.
        if config.wall_jump && sensors.single_wall() {
            let (side, dir) = if sensors.left {
                (Side::Left, 1.0)
            } else {
                (Side::Right, -1.0)
            };
            let [wall_x, wall_y] = config.wall_jump_speed;
            self.motion.speed = dir * config.speed / 2.0;
            world.set_velocity(self.body, Vector::new(dir * wall_x, -wall_y));
            world.translate(self.body, Vector::new(dir * config.jump_nudge, -config.jump_nudge));
            self.sensors.left = false;
            self.sensors.right = false;
            self.jump.latched = true;
            trace!(?side, "wall jump");
            return Some(GameEvent::WallJumped { side });
        }
        None
    }

    fn track_grounded(&mut self, config: &PlayerConfig) {
        if self.sensors.bottom {
            self.jump.grounded_ticks += 1;
            if self.jump.grounded_ticks > config.grounded_reset_ticks {
                self.jump.consecutive = 0;
            }
        } else {
            self.jump.grounded_ticks = 0;
        }
    }
}

/// Rider speed blended with the seesaw surface moving under it.
fn carried_speed(speed: f32, angvel: f32, rel_x: f32) -> f32 {
    let tangential = angvel * rel_x;
    speed * (1.0 - SEESAW_CARRY_BLEND) + tangential * SEESAW_CARRY_BLEND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::input::KeyState;
    use crate::level::{Level, LevelDef};

    fn build(rows: &[&str]) -> (PhysicsWorld, Level, Player, GameConfig) {
        let config = GameConfig::default();
        let catalog = Catalog::new(&config);
        let def = LevelDef::new(rows);
        let mut world = PhysicsWorld::new();
        let (level, player) = Level::build(&def, 0, &catalog, &config, &mut world).unwrap();
        (world, level, player, config)
    }

    #[test]
    fn test_carried_speed_blends_half() {
        // 0.02 rad/tick at 100 px from the pivot moves the surface 2 px/tick.
        assert!((carried_speed(4.0, 0.02, 100.0) - 3.0).abs() < 1e-5);
        assert!((carried_speed(0.0, -0.02, 100.0) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_spawn_filter_and_tag() {
        let (world, _, player, _) = build(&["@", "0"]);
        assert_eq!(world.collision_filter(player.collider), Some(CollisionFilter::player()));
        assert_eq!(world.body_tag(player.body), Some(BodyTag::Player));
        assert!(!player.is_grabbing());
    }

    #[test]
    fn test_grab_and_release_restore_filters() {
        let (mut world, level, mut player, config) = build(&["r  ", "r  ", "   ", "@  ", "000"]);
        let rope = &level.ropes[0];
        let segment_collider = *rope.segment_colliders.last().unwrap();

        let player_before = world.collision_filter(player.collider).unwrap();
        let segment_before = world.collision_filter(segment_collider).unwrap();

        let event = player.grab_rope(&mut world, 0, segment_collider, &rope.links, &config.rope);
        assert_eq!(event, Some(GameEvent::RopeGrabbed { rope: 0 }));
        assert!(player.is_grabbing());
        let grab = player.grab.unwrap();
        assert_eq!(grab.anchor, rope.anchor);
        assert!(world.contains_joint(grab.anchor_joint));
        assert!(world.contains_joint(grab.segment_joint));
        assert!(!world
            .collision_filter(player.collider)
            .unwrap()
            .interacts_with(world.collision_filter(segment_collider).unwrap()));

        // A second grab while holding is ignored.
        assert_eq!(
            player.grab_rope(&mut world, 0, segment_collider, &rope.links, &config.rope),
            None
        );

        world.step_n(5);
        assert_eq!(player.release_rope(&mut world, &config.rope), Some(GameEvent::RopeReleased));
        assert!(!world.contains_joint(grab.anchor_joint));
        assert!(!world.contains_joint(grab.segment_joint));
        assert_eq!(world.collision_filter(player.collider), Some(player_before));
        assert_eq!(world.collision_filter(segment_collider), Some(segment_before));

        // Releasing twice changes nothing.
        assert_eq!(player.release_rope(&mut world, &config.rope), None);
        assert_eq!(world.collision_filter(player.collider), Some(player_before));
    }

    #[test]
    fn test_collision_grabs_only_while_falling() {
        let (mut world, level, mut player, config) = build(&["r  ", "r  ", "   ", "@  ", "000"]);
        let segment = level.ropes[0].segment_colliders[2];
        let touch = CollisionStarted {
            collider1: segment,
            collider2: player.collider,
        };

        world.set_velocity(player.body, Vector::new(1.0, -3.0));
        assert_eq!(player.on_collision_started(&mut world, touch, &level, &config), None);
        assert!(!player.is_grabbing());

        world.set_velocity(player.body, Vector::new(1.0, 3.0));
        assert_eq!(
            player.on_collision_started(&mut world, touch, &level, &config),
            Some(GameEvent::RopeGrabbed { rope: 0 })
        );

        player.release_rope(&mut world, &config.rope);
        world.set_velocity(player.body, Vector::new(1.0, 3.0));
        assert_eq!(player.on_collision_started(&mut world, touch, &level, &config), None);
    }

    #[test]
    fn test_release_scales_velocity() {
        let (mut world, level, mut player, config) = build(&["r  ", "   ", "@  ", "000"]);
        let rope = &level.ropes[0];
        player.grab_rope(&mut world, 0, rope.segment_colliders[0], &rope.links, &config.rope);

        world.set_velocity(player.body, Vector::new(4.0, -2.0));
        player.release_rope(&mut world, &config.rope);
        let velocity = world.velocity(player.body).unwrap();
        assert!((velocity.x - 3.2).abs() < 1e-3);
        assert!((velocity.y + 1.6).abs() < 1e-3);
    }

    #[test]
    fn test_climb_respects_minimum_length() {
        let (mut world, level, mut player, config) = build(&["r  ", "   ", "@  ", "000"]);
        let rope = &level.ropes[0];
        player.grab_rope(&mut world, 0, rope.segment_colliders[0], &rope.links, &config.rope);
        let start = player.grab.unwrap().length;
        assert!(start > config.rope.min_length);

        let up = KeyState::from_keys(&[Key::Up]);
        for _ in 0..200 {
            player.swing(&mut world, &up, &config.rope);
        }
        let grab = player.grab.unwrap();
        assert!((grab.length - config.rope.min_length).abs() < 1e-4);
        assert!(world.contains_joint(grab.anchor_joint));

        let down = KeyState::from_keys(&[Key::Down]);
        player.swing(&mut world, &down, &config.rope);
        let expected = config.rope.min_length + config.rope.climb_step;
        assert!((player.grab.unwrap().length - expected).abs() < 1e-4);
    }
}
