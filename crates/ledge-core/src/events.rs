//! Gameplay events reported by each tick.

use serde::{Deserialize, Serialize};

/// Which wall a wall jump pushed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Jumped { consecutive: u32 },
    WallJumped { side: Side },
    RopeGrabbed { rope: usize },
    RopeReleased,
    /// Distinct surface angles (degrees, rounded) touching the player.
    ContactAnglesChanged { angles: Vec<i32> },
    GlassBroken { block: usize },
    GoalReached { block: usize },
    Died,
    LevelReset { level: usize },
    LevelAdvanced { level: usize },
    Won,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub frame: u64,
    pub events: Vec<GameEvent>,
}

impl TickReport {
    pub fn contains(&self, predicate: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.iter().any(predicate)
    }
}
