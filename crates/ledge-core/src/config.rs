//! Gameplay tunables.
//!
//! Values are expressed per tick (px/tick, rad/tick) unless a field says
//! otherwise. Every field has a default, so a config file only needs to
//! name what it changes.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub world: WorldConfig,
    pub player: PlayerConfig,
    pub rope: RopeConfig,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Edge length of one bitmap cell in pixels.
    pub block_size: f32,
    /// Downward gravity in px/s².
    pub gravity: f32,
    /// Vertical speed clamp for the player.
    pub max_fall_speed: f32,
    /// How far below the level's bottom edge the player may fall before dying.
    pub death_margin: f32,
    pub viewport: [f32; 2],
    pub camera: bool,
    /// Larger values make the camera trail further behind.
    pub camera_friction: f32,
    /// Starting opacity of the level message, faded by one per tick.
    pub message_opacity: u8,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            block_size: 50.0,
            gravity: 981.0,
            max_fall_speed: 15.0,
            death_margin: 500.0,
            viewport: [1000.0, 500.0],
            camera: true,
            camera_friction: 10.0,
            message_opacity: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub width: f32,
    pub height: f32,
    /// Flat-ground maximum horizontal speed.
    pub speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub jump_speed: f32,
    /// Upward shift applied on takeoff so the feet clear the ground contact.
    pub jump_nudge: f32,
    pub wall_jump: bool,
    /// Horizontal and vertical speed of a wall jump.
    pub wall_jump_speed: [f32; 2],
    pub downhill_multiplier: f32,
    pub uphill_multiplier: f32,
    pub momentum_decay: f32,
    /// Upper bound on carried downhill momentum.
    pub momentum_cap: f32,
    /// Speed lost per consecutive jump.
    pub jump_penalty_step: f32,
    pub jump_penalty_max_steps: u32,
    /// Ticks on the ground after which the consecutive-jump count resets.
    pub grounded_reset_ticks: u32,
    pub friction: f32,
    /// Ground friction while riding a seesaw.
    pub seesaw_friction: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            width: 30.0,
            height: 50.0,
            speed: 5.0,
            acceleration: 0.5,
            deceleration: 5.0,
            jump_speed: 9.0,
            jump_nudge: 5.0,
            wall_jump: true,
            wall_jump_speed: [6.0, 9.0],
            downhill_multiplier: 1.3,
            uphill_multiplier: 0.7,
            momentum_decay: 0.98,
            momentum_cap: 2.5,
            jump_penalty_step: 0.15,
            jump_penalty_max_steps: 4,
            grounded_reset_ticks: 20,
            friction: 0.1,
            seesaw_friction: 0.8,
        }
    }
}

impl PlayerConfig {
    /// Glass shatters when hit faster than this.
    pub fn break_speed(&self) -> f32 {
        self.speed * 1.2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeConfig {
    /// Tangential push per tick while swinging.
    pub swing_acceleration: f32,
    pub climb_step: f32,
    pub min_length: f32,
    /// Fraction of velocity kept on release.
    pub release_retention: f32,
    /// Fraction of tangential velocity added back when grabbing.
    pub grab_retention: f32,
    pub anchor_stiffness: f32,
    pub anchor_damping: f32,
    pub hold_stiffness: f32,
    pub hold_damping: f32,
    pub link_stiffness: f32,
    pub link_damping: f32,
    /// Ticks after a release before another grab is accepted.
    pub regrab_cooldown_ticks: u32,
}

impl Default for RopeConfig {
    fn default() -> Self {
        Self {
            swing_acceleration: 0.1,
            climb_step: 2.0,
            min_length: 50.0,
            release_retention: 0.8,
            grab_retention: 0.8,
            anchor_stiffness: 0.1,
            anchor_damping: 0.01,
            hold_stiffness: 0.2,
            hold_damping: 0.1,
            link_stiffness: 0.9,
            link_damping: 0.1,
            regrab_cooldown_ticks: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GameConfig::from_json(r#"{ "player": { "speed": 7.0 } }"#).unwrap();
        assert_eq!(config.player.speed, 7.0);
        assert_eq!(config.player.height, 50.0);
        assert_eq!(config.world, WorldConfig::default());
        assert_eq!(config.rope, RopeConfig::default());
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = GameConfig::from_json("{}").unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_break_speed_tracks_player_speed() {
        let player = PlayerConfig::default();
        assert!((player.break_speed() - 6.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = GameConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(GameConfig::from_json(&json).unwrap(), config);
    }
}
