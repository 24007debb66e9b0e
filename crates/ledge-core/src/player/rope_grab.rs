//! Grabbing, swinging on and releasing ropes.

use rapier2d::prelude::*;
use tracing::{debug, warn};

use super::Player;
use crate::config::RopeConfig;
use crate::events::GameEvent;
use crate::input::{InputSource, Key};
use crate::physics::{BodyTag, CollisionFilter, LinkSpec, PhysicsWorld};
use crate::rope::{RopeLink, find_anchor};

/// An active hold on a rope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopeGrab {
    pub rope: usize,
    pub segment: RigidBodyHandle,
    pub segment_collider: ColliderHandle,
    pub anchor: RigidBodyHandle,
    pub anchor_joint: ImpulseJointHandle,
    pub segment_joint: ImpulseJointHandle,
    /// Current player-to-anchor rest length.
    pub length: f32,
    pub saved_player_filter: CollisionFilter,
    pub saved_segment_filter: CollisionFilter,
}

/// Unit vector perpendicular to the anchor-to-player direction.
fn swing_tangent(anchor: Vector, player: Vector) -> Vector {
    let angle = (player.y - anchor.y).atan2(player.x - anchor.x) + std::f32::consts::FRAC_PI_2;
    Vector::new(angle.cos(), angle.sin())
}

impl Player {
    /// Attaches the player to `segment`, converting its tangential velocity
    /// into swing.
    ///
    /// Returns `None` without touching the world when no anchor can be
    /// reached from the segment.
    pub fn grab_rope(
        &mut self,
        world: &mut PhysicsWorld,
        rope: usize,
        segment_collider: ColliderHandle,
        links: &[RopeLink],
        config: &RopeConfig,
    ) -> Option<GameEvent> {
        if self.grab.is_some() {
            return None;
        }
        let (segment, _) = world.collider_owner(segment_collider)?;
        let anchor = find_anchor(links, segment, self.body, |handle| {
            matches!(world.body_tag(handle), Some(BodyTag::RopeAnchor(_)))
        });
        let Some(anchor) = anchor else {
            warn!(rope, "could not find rope anchor");
            return None;
        };

        let (Some(position), Some(anchor_pos), Some(velocity)) = (
            world.translation(self.body),
            world.translation(anchor),
            world.velocity(self.body),
        ) else {
            return None;
        };
        let saved_player_filter = world.collision_filter(self.collider)?;
        let saved_segment_filter = world.collision_filter(segment_collider)?;

        let length = (position.x - anchor_pos.x).hypot(position.y - anchor_pos.y);
        let anchor_joint = world.add_link(
            self.body,
            anchor,
            LinkSpec {
                rest_length: length,
                stiffness: config.anchor_stiffness,
                damping: config.anchor_damping,
            },
        );
        let segment_joint = world.add_link(
            self.body,
            segment,
            LinkSpec {
                rest_length: 0.0,
                stiffness: config.hold_stiffness,
                damping: config.hold_damping,
            },
        );

        world.set_collision_filter(
            self.collider,
            saved_player_filter.without(CollisionFilter::ROPE),
        );
        world.set_collision_filter(
            segment_collider,
            saved_segment_filter.without(CollisionFilter::PLAYER),
        );

        let tangent = swing_tangent(anchor_pos, position);
        let along = velocity.x * tangent.x + velocity.y * tangent.y;
        let boost = along * config.grab_retention;
        world.set_velocity(
            self.body,
            Vector::new(velocity.x + tangent.x * boost, velocity.y + tangent.y * boost),
        );

        self.grab = Some(RopeGrab {
            rope,
            segment,
            segment_collider,
            anchor,
            anchor_joint,
            segment_joint,
            length,
            saved_player_filter,
            saved_segment_filter,
        });
        debug!(rope, length, "grabbed rope");
        Some(GameEvent::RopeGrabbed { rope })
    }

    /// Drops the rope, restoring both filters and damping the exit velocity.
    pub fn release_rope(
        &mut self,
        world: &mut PhysicsWorld,
        config: &RopeConfig,
    ) -> Option<GameEvent> {
        let grab = self.grab.take()?;
        let velocity = world.velocity(self.body).unwrap_or_default();

        world.remove_joint(grab.anchor_joint);
        world.remove_joint(grab.segment_joint);
        world.set_collision_filter(self.collider, grab.saved_player_filter);
        world.set_collision_filter(grab.segment_collider, grab.saved_segment_filter);
        world.set_velocity(
            self.body,
            Vector::new(
                velocity.x * config.release_retention,
                velocity.y * config.release_retention,
            ),
        );

        self.regrab_cooldown = config.regrab_cooldown_ticks;
        debug!(rope = grab.rope, "released rope");
        Some(GameEvent::RopeReleased)
    }

    /// Rope-mode controls: swing with left/right, climb with up/down.
    pub(super) fn swing(
        &mut self,
        world: &mut PhysicsWorld,
        input: &impl InputSource,
        config: &RopeConfig,
    ) {
        let Some(grab) = self.grab.as_mut() else {
            return;
        };
        let (Some(position), Some(anchor_pos)) =
            (world.translation(self.body), world.translation(grab.anchor))
        else {
            return;
        };

        let tangent = swing_tangent(anchor_pos, position);
        let push = Vector::new(
            tangent.x * config.swing_acceleration,
            tangent.y * config.swing_acceleration,
        );
        if input.is_down(Key::Left) {
            world.apply_velocity_impulse(self.body, push);
        }
        if input.is_down(Key::Right) {
            world.apply_velocity_impulse(self.body, Vector::new(-push.x, -push.y));
        }

        let mut length = grab.length;
        if input.is_down(Key::Up) && length > config.min_length {
            length = (length - config.climb_step).max(config.min_length);
        }
        if input.is_down(Key::Down) {
            length += config.climb_step;
        }
        if (length - grab.length).abs() > f32::EPSILON {
            world.remove_joint(grab.anchor_joint);
            grab.anchor_joint = world.add_link(
                self.body,
                grab.anchor,
                LinkSpec {
                    rest_length: length,
                    stiffness: config.anchor_stiffness,
                    damping: config.anchor_damping,
                },
            );
            grab.length = length;
        }
    }
}
