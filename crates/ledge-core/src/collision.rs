//! Contact classification between a block and the player.

use rapier2d::prelude::*;

use crate::physics::PhysicsWorld;

/// Solver contacts closer than this count as touching, in pixels.
pub const SUPPORT_TOLERANCE: f32 = 0.5;

/// The contact between one block and the player for the current tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// At least one contact point is touching rather than merely predicted.
    pub supporting: bool,
    /// World-space contact points.
    pub supports: Vec<Vector>,
    /// Surface tangent, perpendicular to the block's outward normal.
    pub tangent: Vector,
}

impl Contact {
    /// Tangent direction in degrees, in `(-180, 180]`.
    pub fn tangent_angle(&self) -> f32 {
        self.tangent.y.atan2(self.tangent.x).to_degrees()
    }
}

/// Classifies the contact between `block` and `player`, if there is one.
pub fn classify(
    world: &PhysicsWorld,
    block: ColliderHandle,
    player: ColliderHandle,
) -> Option<Contact> {
    let pair = world.narrow_phase.contact_pair(block, player)?;
    let flip = pair.collider1 != block;

    let mut supports = Vec::new();
    let mut normal = None;
    let mut supporting = false;
    for manifold in &pair.manifolds {
        if manifold.data.solver_contacts.is_empty() {
            continue;
        }
        let n = manifold.data.normal;
        let n = if flip {
            Vector::new(-n.x, -n.y)
        } else {
            Vector::new(n.x, n.y)
        };
        normal.get_or_insert(n);

        for contact in &manifold.data.solver_contacts {
            supports.push(Vector::new(contact.point.x, contact.point.y));
            supporting |= contact.dist <= SUPPORT_TOLERANCE;
        }
    }

    let normal = normal?;
    Some(Contact {
        supporting,
        supports,
        tangent: Vector::new(-normal.y, normal.x),
    })
}
