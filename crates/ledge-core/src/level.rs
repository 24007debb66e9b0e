//! Level definitions and construction.

use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::{self, Block, PendingAssembly};
use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::error::LevelError;
use crate::physics::PhysicsWorld;
use crate::player::Player;
use crate::rope::{self, Rope};
use crate::seesaw::{self, Seesaw};

/// The blank cell.
pub const EMPTY: char = ' ';
/// The player spawn cell.
pub const SPAWN: char = '@';

/// Default levels shipped with the crate.
const DEFAULT_LEVELS: &str = include_str!("../levels/default.json");

/// A single level: bitmap rows plus an optional intro message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDef {
    pub bitmap: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LevelDef {
    pub fn new(rows: &[&str]) -> Self {
        Self {
            bitmap: rows.iter().map(|&row| row.to_owned()).collect(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Height of the bitmap in pixels.
    #[allow(clippy::cast_precision_loss)]
    pub fn height(&self, block_size: f32) -> f32 {
        self.bitmap.len() as f32 * block_size
    }

    /// Checks the bitmap shape, every symbol, and that there is exactly one spawn.
    pub fn validate(&self, level: usize, catalog: &Catalog) -> Result<(), LevelError> {
        let Some(first) = self.bitmap.first() else {
            return Err(LevelError::EmptyBitmap { level });
        };
        let expected = first.chars().count();

        let mut spawns = 0;
        for (row, line) in self.bitmap.iter().enumerate() {
            let found = line.chars().count();
            if found != expected {
                return Err(LevelError::RaggedRows {
                    level,
                    row,
                    expected,
                    found,
                });
            }
            for (column, symbol) in line.chars().enumerate() {
                match symbol {
                    EMPTY => {}
                    SPAWN => spawns += 1,
                    _ => {
                        catalog.get(symbol, level, row, column)?;
                    }
                }
            }
        }

        match spawns {
            0 => Err(LevelError::MissingSpawn { level }),
            1 => Ok(()),
            _ => Err(LevelError::DuplicateSpawn { level }),
        }
    }
}

/// An ordered set of levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSet {
    pub levels: Vec<LevelDef>,
}

impl LevelSet {
    pub fn new(levels: Vec<LevelDef>) -> Result<Self, LevelError> {
        if levels.is_empty() {
            return Err(LevelError::NoLevels);
        }
        Ok(Self { levels })
    }

    /// Parses a level set from JSON.
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let set: Self = serde_json::from_str(json)?;
        Self::new(set.levels)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The levels compiled into the crate.
    pub fn default_set() -> Result<Self, LevelError> {
        Self::from_json(DEFAULT_LEVELS)
    }

    /// Validates every level up front.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), LevelError> {
        self.levels
            .iter()
            .enumerate()
            .try_for_each(|(index, level)| level.validate(index, catalog))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&LevelDef, LevelError> {
        self.levels.get(index).ok_or(LevelError::OutOfRange {
            index,
            count: self.levels.len(),
        })
    }
}

/// A built level: every block plus the assembled ropes and seesaws.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub index: usize,
    pub blocks: Vec<Block>,
    pub ropes: Vec<Rope>,
    pub seesaws: Vec<Seesaw>,
    pub spawn: Vector,
    /// Bitmap height in pixels.
    pub height: f32,
    pub message: Option<String>,
}

impl Level {
    /// Builds `def` into `world`, which should be empty.
    ///
    /// The definition is validated before any body is created.
    pub fn build(
        def: &LevelDef,
        index: usize,
        catalog: &Catalog,
        config: &GameConfig,
        world: &mut PhysicsWorld,
    ) -> Result<(Self, Player), LevelError> {
        def.validate(index, catalog)?;
        let bs = catalog.block_size();

        let mut blocks = Vec::new();
        let mut pending = PendingAssembly::default();
        let mut spawn = None;
        for (row, line) in def.bitmap.iter().enumerate() {
            for (column, symbol) in line.chars().enumerate() {
                match symbol {
                    EMPTY => {}
                    SPAWN => {
                        #[allow(clippy::cast_precision_loss)]
                        let at = Vector::new(column as f32 * bs, row as f32 * bs);
                        spawn = Some(at);
                    }
                    _ => {
                        let spec = catalog.get(symbol, index, row, column)?;
                        let block_index = blocks.len();
                        blocks.push(block::spawn_cell(
                            world,
                            catalog,
                            spec,
                            block_index,
                            row,
                            column,
                            &mut pending,
                        ));
                    }
                }
            }
        }
        let spawn = spawn.ok_or(LevelError::MissingSpawn { level: index })?;

        let ropes = rope::assemble(world, &mut blocks, &pending.ropes, bs, &config.rope);
        let seesaws = seesaw::assemble(world, &mut blocks, &pending.seesaws, bs);
        let player = Player::spawn(world, spawn, &config.player);

        debug!(
            level = index,
            blocks = blocks.len(),
            ropes = ropes.len(),
            seesaws = seesaws.len(),
            bodies = world.rigid_body_set.len(),
            "built level"
        );
        info!(level = index, "level loaded");

        Ok((
            Self {
                index,
                blocks,
                ropes,
                seesaws,
                spawn,
                height: def.height(bs),
                message: def.message.clone(),
            },
            player,
        ))
    }
}
