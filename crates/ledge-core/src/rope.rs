//! Ropes: vertical runs of rope blocks assembled into one hanging chain.

use std::collections::BTreeMap;

use rapier2d::prelude::*;
use tracing::{debug, warn};

use crate::block::{AIR_DAMPING, Block, BlockState, RopeRole};
use crate::config::RopeConfig;
use crate::physics::{BodyTag, CollisionFilter, LinkSpec, PhysicsWorld};

/// Rope blocks closer than this horizontally share a column.
const COLUMN_TOLERANCE: f32 = 10.0;
/// Rope length per segment, in pixels.
const SEGMENT_SPACING: f32 = 20.0;
const MIN_SEGMENTS: usize = 5;

/// Index into a level's rope list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RopeId(pub usize);

/// A rope block waiting for assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRope {
    pub block: usize,
    pub anchor: Vector,
}

/// One distance constraint in a rope chain, `parent` being closer to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RopeLink {
    pub parent: RigidBodyHandle,
    pub child: RigidBodyHandle,
    pub joint: ImpulseJointHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rope {
    pub id: RopeId,
    pub anchor: RigidBodyHandle,
    pub segments: Vec<RigidBodyHandle>,
    pub segment_colliders: Vec<ColliderHandle>,
    pub links: Vec<RopeLink>,
    pub length: f32,
    pub segment_length: f32,
    /// Member block indices, top to bottom.
    pub members: Vec<usize>,
}

impl Rope {
    pub fn last_segment(&self) -> Option<RigidBodyHandle> {
        self.segments.last().copied()
    }
}

/// Number of segments for a rope of `length` pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn segment_count(length: f32) -> usize {
    ((length / SEGMENT_SPACING).floor() as usize).max(MIN_SEGMENTS)
}

/// Splits pending rope blocks into vertical runs, each sorted top to bottom.
///
/// Blocks group by column first; a vertical gap of more than one cell
/// starts a new run in the same column.
pub fn group_runs(pending: &[PendingRope], block_size: f32) -> Vec<Vec<PendingRope>> {
    let mut columns: BTreeMap<i64, Vec<PendingRope>> = BTreeMap::new();
    for rope in pending {
        #[allow(clippy::cast_possible_truncation)]
        let key = (rope.anchor.x / COLUMN_TOLERANCE).round() as i64;
        columns.entry(key).or_default().push(*rope);
    }

    let mut runs = Vec::new();
    for mut column in columns.into_values() {
        column.sort_by(|a, b| a.anchor.y.total_cmp(&b.anchor.y));
        let mut run: Vec<PendingRope> = Vec::new();
        for rope in column {
            let gap = run.last().map(|last| rope.anchor.y - last.anchor.y);
            if gap.is_some_and(|gap| gap > block_size * 1.5) {
                runs.push(std::mem::take(&mut run));
            }
            run.push(rope);
        }
        if !run.is_empty() {
            runs.push(run);
        }
    }
    runs
}

/// Builds one rope per vertical run of pending rope blocks.
///
/// The top block of each run keeps its anchor; every other member's anchor
/// is removed and the block is hidden.
pub fn assemble(
    world: &mut PhysicsWorld,
    blocks: &mut [Block],
    pending: &[PendingRope],
    block_size: f32,
    config: &RopeConfig,
) -> Vec<Rope> {
    let mut ropes = Vec::new();
    for run in group_runs(pending, block_size) {
        let (Some(top), Some(bottom)) = (run.first(), run.last()) else {
            continue;
        };
        let id = RopeId(ropes.len());
        let anchor = blocks[top.block].body;
        let BlockState::Rope(params) = &blocks[top.block].state else {
            warn!(block = top.block, "pending rope is not a rope block");
            continue;
        };
        let radius = params.params.segment_radius;

        let length = bottom.anchor.y + block_size - top.anchor.y;
        let count = segment_count(length);
        #[allow(clippy::cast_precision_loss)]
        let segment_length = length / count as f32;

        let mut segments = Vec::with_capacity(count);
        let mut segment_colliders = Vec::with_capacity(count);
        for i in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let y = top.anchor.y + (i as f32 + 0.5) * segment_length;
            let body = world.add_rigid_body(
                RigidBodyBuilder::dynamic()
                    .translation(Vector::new(top.anchor.x, y))
                    .linear_damping(AIR_DAMPING)
                    .user_data(BodyTag::RopeSegment(id.0).encode())
                    .build(),
            );
            let collider = world.add_collider(
                ColliderBuilder::ball(radius)
                    .collision_groups(CollisionFilter::rope().groups())
                    .friction(0.5)
                    .build(),
                body,
            );
            segments.push(body);
            segment_colliders.push(collider);
        }

        let spec = LinkSpec {
            rest_length: segment_length,
            stiffness: config.link_stiffness,
            damping: config.link_damping,
        };
        let mut links = Vec::with_capacity(count);
        let mut parent = anchor;
        for &child in &segments {
            let joint = world.add_link(parent, child, spec);
            links.push(RopeLink {
                parent,
                child,
                joint,
            });
            parent = child;
        }

        let members: Vec<usize> = run.iter().map(|r| r.block).collect();
        let last = members.len() - 1;
        for (position, &member) in members.iter().enumerate() {
            let block = &mut blocks[member];
            if position > 0 {
                world.remove_rigid_body(block.body);
                block.hidden = true;
            }
            if let BlockState::Rope(state) = &mut block.state {
                state.rope = Some(id);
                state.role = match position {
                    _ if last == 0 => RopeRole::Single,
                    0 => RopeRole::Top,
                    p if p == last => RopeRole::Bottom,
                    _ => RopeRole::Middle,
                };
            }
        }

        debug!(rope = id.0, members = members.len(), segments = count, length, "assembled rope");
        ropes.push(Rope {
            id,
            anchor,
            segments,
            segment_colliders,
            links,
            length,
            segment_length,
            members,
        });
    }
    ropes
}

/// Walks constraints from `start` toward the anchor.
///
/// Follows the link whose child is the current body and whose parent is
/// not `exclude`, stopping at the first body `is_anchor` accepts. Gives up
/// after `links.len() + 1` hops, so a malformed chain cannot loop forever.
pub fn find_anchor(
    links: &[RopeLink],
    start: RigidBodyHandle,
    exclude: RigidBodyHandle,
    is_anchor: impl Fn(RigidBodyHandle) -> bool,
) -> Option<RigidBodyHandle> {
    let mut current = start;
    for _ in 0..=links.len() {
        let link = links
            .iter()
            .find(|link| link.child == current && link.parent != exclude)?;
        current = link.parent;
        if is_anchor(current) {
            return Some(current);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::PendingAssembly;
    use crate::catalog::Catalog;
    use crate::config::GameConfig;

    fn handle(i: u32) -> RigidBodyHandle {
        RigidBodyHandle::from_raw_parts(i, 0)
    }

    fn joint(i: u32) -> ImpulseJointHandle {
        ImpulseJointHandle::from_raw_parts(i, 0)
    }

    fn chain(len: u32) -> Vec<RopeLink> {
        (0..len)
            .map(|i| RopeLink {
                parent: handle(i),
                child: handle(i + 1),
                joint: joint(i),
            })
            .collect()
    }

    #[test]
    fn test_segment_count_floor() {
        assert_eq!(segment_count(50.0), 5);
        assert_eq!(segment_count(150.0), 7);
        assert_eq!(segment_count(250.0), 12);
        assert_eq!(segment_count(0.0), 5);
    }

    #[test]
    fn test_find_anchor_walks_to_root() {
        let links = chain(6);
        let found = find_anchor(&links, handle(6), handle(99), |h| h == handle(0));
        assert_eq!(found, Some(handle(0)));
    }

    #[test]
    fn test_find_anchor_skips_excluded_parent() {
        let mut links = chain(3);
        // A grab joint pointing at the player must not be followed.
        links.insert(
            0,
            RopeLink {
                parent: handle(50),
                child: handle(3),
                joint: joint(50),
            },
        );
        let found = find_anchor(&links, handle(3), handle(50), |h| h == handle(0));
        assert_eq!(found, Some(handle(0)));
    }

    #[test]
    fn test_find_anchor_bounded_on_cycle() {
        let links = vec![
            RopeLink {
                parent: handle(1),
                child: handle(2),
                joint: joint(0),
            },
            RopeLink {
                parent: handle(2),
                child: handle(1),
                joint: joint(1),
            },
        ];
        assert_eq!(find_anchor(&links, handle(2), handle(99), |_| false), None);
    }

    #[test]
    fn test_find_anchor_dead_end() {
        let links = chain(2);
        assert_eq!(find_anchor(&links, handle(7), handle(99), |_| true), None);
    }

    #[test]
    fn test_group_runs_splits_columns_and_gaps() {
        let at = |block, x, y| PendingRope {
            block,
            anchor: Vector::new(x, y),
        };
        let pending = [
            at(0, 100.0, 100.0),
            at(1, 300.0, 0.0),
            at(2, 100.0, 50.0),
            at(3, 100.0, 300.0),
        ];
        let runs = group_runs(&pending, 50.0);
        let blocks: Vec<Vec<usize>> = runs
            .iter()
            .map(|run| run.iter().map(|r| r.block).collect())
            .collect();
        assert_eq!(blocks, vec![vec![2, 0], vec![3], vec![1]]);
    }

    fn build_column(rows: usize) -> (PhysicsWorld, Vec<Block>, Vec<Rope>) {
        let mut world = PhysicsWorld::new();
        let config = GameConfig::default();
        let catalog = Catalog::new(&config);
        let spec = catalog.lookup('r').unwrap();
        let mut pending = PendingAssembly::default();
        #[allow(clippy::cast_precision_loss)]
        let mut blocks: Vec<Block> = (0..rows)
            .map(|row| {
                let corner = Vector::new(100.0, row as f32 * 50.0);
                Block::spawn(&mut world, spec, row, corner, &mut pending)
            })
            .collect();
        let ropes = assemble(&mut world, &mut blocks, &pending.ropes, 50.0, &config.rope);
        (world, blocks, ropes)
    }

    #[test]
    fn test_assembled_rope_counts() {
        for (rows, expected) in [(1, 5), (3, 7), (5, 12)] {
            let (world, blocks, ropes) = build_column(rows);
            assert_eq!(ropes.len(), 1);
            let rope = &ropes[0];
            assert_eq!(rope.segments.len(), expected, "{rows} rope blocks");
            assert_eq!(rope.links.len(), expected);
            // One surviving anchor plus the segments.
            assert_eq!(world.rigid_body_set.len(), 1 + expected);
            assert_eq!(blocks.iter().filter(|b| b.hidden).count(), rows - 1);
            assert!(!blocks[0].hidden);
        }
    }

    #[test]
    fn test_assembled_rope_roles_and_filters() {
        let (world, blocks, ropes) = build_column(3);
        let roles: Vec<RopeRole> = blocks
            .iter()
            .map(|b| match &b.state {
                BlockState::Rope(state) => state.role,
                other => panic!("not a rope block: {other:?}"),
            })
            .collect();
        assert_eq!(roles, vec![RopeRole::Top, RopeRole::Middle, RopeRole::Bottom]);

        let rope = &ropes[0];
        assert_eq!(rope.links[0].parent, rope.anchor);
        for collider in &rope.segment_colliders {
            assert_eq!(world.collision_filter(*collider), Some(CollisionFilter::rope()));
        }
        let tail = rope.last_segment().unwrap();
        assert_eq!(
            find_anchor(&rope.links, tail, tail, |h| h == rope.anchor),
            Some(rope.anchor)
        );
    }

    #[test]
    fn test_single_rope_block_role() {
        let (_, blocks, _) = build_column(1);
        assert!(matches!(
            &blocks[0].state,
            BlockState::Rope(state) if state.role == RopeRole::Single
        ));
    }
}
