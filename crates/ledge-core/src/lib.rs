//! Ledge Core Library
//!
//! Interactive terrain and the player controller for a tile-based 2D
//! platformer, simulated with `Rapier2D`.
//!
//! Levels are ASCII bitmaps. Each symbol maps to a block with a behavior
//! (static, moving, pivoting, rope or breakable), and [`Game::tick`] advances
//! physics, block reactions and the player by one fixed step.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod camera;
pub mod catalog;
pub mod collision;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod input;
pub mod level;
pub mod physics;
pub mod player;
pub mod rope;
pub mod seesaw;

pub use block::{Block, BlockState, Particle};
pub use camera::Camera;
pub use catalog::{Behavior, BlockSpec, Catalog, Downhill, Shape};
pub use config::{GameConfig, PlayerConfig, RopeConfig, WorldConfig};
pub use error::LevelError;
pub use events::{GameEvent, Side, TickReport};
pub use game::{Game, Phase};
pub use input::{InputScript, InputSource, Key, KeyState, ScriptError};
pub use level::{Level, LevelDef, LevelSet};
pub use physics::{CollisionFilter, PHYSICS_DT, PhysicsWorld, TICK_RATE, default_gravity};
pub use player::Player;
