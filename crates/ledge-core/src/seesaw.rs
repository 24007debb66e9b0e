//! Seesaws: horizontal runs of pivot blocks merged into one wide plank.

use std::collections::BTreeMap;

use rapier2d::prelude::*;
use tracing::{debug, warn};

use crate::block::{AIR_DAMPING, Block, BlockState};
use crate::physics::{BodyTag, CollisionFilter, PhysicsWorld, Pivot};

const ROW_TOLERANCE: f32 = 10.0;

/// Index into a level's seesaw list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeesawId(pub usize);

/// A pivot block waiting for assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSeesaw {
    pub block: usize,
    pub position: Vector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Seesaw {
    pub id: SeesawId,
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub pivot: Pivot,
    /// Member block indices, left to right.
    pub members: Vec<usize>,
    /// The member that drives the shared body.
    pub primary: usize,
    pub width: f32,
}

/// Position of the pivot member in a run of `len` blocks.
pub fn pivot_index(len: usize) -> usize {
    len.saturating_sub(1) / 2
}

/// Splits pending seesaws into horizontal runs, each sorted left to right.
pub fn group_runs(pending: &[PendingSeesaw], block_size: f32) -> Vec<Vec<PendingSeesaw>> {
    let mut rows: BTreeMap<i64, Vec<PendingSeesaw>> = BTreeMap::new();
    for seesaw in pending {
        #[allow(clippy::cast_possible_truncation)]
        let key = (seesaw.position.y / ROW_TOLERANCE).round() as i64;
        rows.entry(key).or_default().push(*seesaw);
    }

    let mut runs = Vec::new();
    for mut row in rows.into_values() {
        row.sort_by(|a, b| a.position.x.total_cmp(&b.position.x));
        let mut run: Vec<PendingSeesaw> = Vec::new();
        for seesaw in row {
            let gap = run.last().map(|last| seesaw.position.x - last.position.x);
            if gap.is_some_and(|gap| gap > block_size * 1.5) {
                runs.push(std::mem::take(&mut run));
            }
            run.push(seesaw);
        }
        if !run.is_empty() {
            runs.push(run);
        }
    }
    runs
}

/// Replaces every run of two or more pivot blocks with one plank pinned at
/// the pivot member's position. Single blocks keep their own body.
pub fn assemble(
    world: &mut PhysicsWorld,
    blocks: &mut [Block],
    pending: &[PendingSeesaw],
    block_size: f32,
) -> Vec<Seesaw> {
    let mut seesaws = Vec::new();
    for run in group_runs(pending, block_size) {
        if run.len() < 2 {
            continue;
        }
        let id = SeesawId(seesaws.len());
        let primary = run[pivot_index(run.len())];
        let BlockState::Pivoting(state) = &blocks[primary.block].state else {
            warn!(block = primary.block, "pending seesaw is not a pivot block");
            continue;
        };
        let params = state.params;

        #[allow(clippy::cast_precision_loss)]
        let width = run.len() as f32 * block_size;
        let thickness = block_size * 0.3;

        for member in &run {
            let block = &mut blocks[member.block];
            if let BlockState::Pivoting(state) = &mut block.state {
                if let Some(pivot) = state.pivot.take() {
                    world.remove_pivot(pivot);
                }
            }
            world.remove_rigid_body(block.body);
        }

        let body = world.add_rigid_body(
            RigidBodyBuilder::dynamic()
                .translation(primary.position)
                .linear_damping(AIR_DAMPING)
                .angular_damping(AIR_DAMPING)
                .user_data(BodyTag::Block(primary.block).encode())
                .build(),
        );
        let collider = world.add_collider(
            ColliderBuilder::cuboid(width / 2.0, thickness / 2.0)
                .collision_groups(CollisionFilter::terrain().groups())
                .density(params.density)
                .friction(params.friction)
                .restitution(params.restitution)
                .build(),
            body,
        );
        let pivot = world.add_pivot(body, primary.position);

        let members: Vec<usize> = run.iter().map(|s| s.block).collect();
        for &member in &members {
            let is_primary = member == primary.block;
            let block = &mut blocks[member];
            block.body = body;
            block.collider = collider;
            block.hidden = !is_primary;
            block.size = [width, thickness];
            if let BlockState::Pivoting(state) = &mut block.state {
                state.seesaw = Some(id);
                state.primary = is_primary;
                state.width = width;
                state.pivot = is_primary.then_some(pivot);
            }
        }

        debug!(seesaw = id.0, members = members.len(), width, "merged seesaw");
        seesaws.push(Seesaw {
            id,
            body,
            collider,
            pivot,
            members,
            primary: primary.block,
            width,
        });
    }
    seesaws
}
