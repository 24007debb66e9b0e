//! Horizontal speed: acceleration, slope response and downhill momentum.

use crate::catalog::Downhill;
use crate::config::PlayerConfig;

/// Momentum below this is dropped.
const MOMENTUM_FLOOR: f32 = 0.1;
/// Extra smoothing when easing back toward a lower top speed.
const OVERSPEED_EASE: f32 = 5.0;

/// Horizontal steering for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Steer {
    pub left: bool,
    pub right: bool,
}

impl Steer {
    pub fn idle(self) -> bool {
        !self.left && !self.right
    }
}

/// Top-speed multiplier for steering on a slope.
pub fn slope_modifier(config: &PlayerConfig, slope: Option<Downhill>, steer: Steer) -> f32 {
    match slope {
        Some(Downhill::Right) if steer.right => config.downhill_multiplier,
        Some(Downhill::Left) if steer.left => config.downhill_multiplier,
        Some(Downhill::Left) if steer.right => config.uphill_multiplier,
        Some(Downhill::Right) if steer.left => config.uphill_multiplier,
        _ => 1.0,
    }
}

/// Horizontal motion state carried between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    /// Signed horizontal speed, px/tick. Positive is right.
    pub speed: f32,
    /// Extra top speed carried off a downhill slope.
    pub downhill_momentum: f32,
    prev_slope: Option<Downhill>,
}

impl Motion {
    /// Advances one tick. `slope` is the slope under the player's feet, if any.
    pub fn step(&mut self, config: &PlayerConfig, slope: Option<Downhill>, steer: Steer) {
        let modifier = slope_modifier(config, slope, steer);
        let accel = config.acceleration * modifier;

        if steer.right {
            self.accelerate(config, 1.0, accel, modifier, slope == Some(Downhill::Left));
        }
        if steer.left {
            self.accelerate(config, -1.0, accel, modifier, slope == Some(Downhill::Right));
        }
        if steer.idle() {
            let on_slope = slope.is_some();
            let factor = if on_slope && modifier < 1.0 { 3.0 } else { 1.0 };
            if !on_slope && self.speed.abs() > config.speed {
                self.speed *= config.momentum_decay;
            } else {
                self.speed -= self.speed / (config.deceleration / factor);
            }
        }

        self.track_momentum(config, slope);
    }

    /// Pushes speed toward `dir * top speed`.
    fn accelerate(
        &mut self,
        config: &PlayerConfig,
        dir: f32,
        accel: f32,
        modifier: f32,
        uphill: bool,
    ) {
        // Work in the direction of travel so both sides share one code path.
        let mut speed = self.speed * dir;
        if uphill {
            let cap = config.speed * config.uphill_multiplier;
            speed = if speed < cap { (speed + accel).min(cap) } else { cap };
        } else {
            let max = config.speed * modifier + self.downhill_momentum;
            if speed < max {
                speed = (speed + accel).min(max);
            } else {
                speed += (max - speed) / config.deceleration / OVERSPEED_EASE;
            }
        }
        self.speed = speed * dir;
    }

    fn track_momentum(&mut self, config: &PlayerConfig, slope: Option<Downhill>) {
        if slope.is_none() {
            if let Some(prev) = self.prev_slope {
                let downhill = match prev {
                    Downhill::Right => self.speed > 0.0,
                    Downhill::Left => self.speed < 0.0,
                };
                if downhill {
                    self.downhill_momentum = (self.speed.abs() - config.speed)
                        .max(0.0)
                        .min(config.momentum_cap);
                }
            }
            if self.downhill_momentum > 0.0 {
                self.downhill_momentum *= config.momentum_decay;
                if self.downhill_momentum < MOMENTUM_FLOOR {
                    self.downhill_momentum = 0.0;
                }
            }
        }
        self.prev_slope = slope;
    }

    /// Scales speed down after consecutive jumps.
    pub fn apply_jump_penalty(&mut self, config: &PlayerConfig, consecutive: u32) {
        if consecutive > 1 {
            #[allow(clippy::cast_precision_loss)]
            let steps = (consecutive - 1).min(config.jump_penalty_max_steps) as f32;
            self.speed *= 1.0 - config.jump_penalty_step * steps;
        }
    }
}
