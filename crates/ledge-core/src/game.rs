//! The game loop: one physics world, one level, one player.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rapier2d::prelude::*;
use tracing::{info, trace};

use crate::block::ContactContext;
use crate::camera::Camera;
use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::error::LevelError;
use crate::events::{GameEvent, TickReport};
use crate::input::{InputSource, Key};
use crate::level::{Level, LevelDef, LevelSet};
use crate::physics::PhysicsWorld;
use crate::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Playing,
    /// Every level is complete; ticks are no-ops.
    Won,
}

pub struct Game {
    config: GameConfig,
    catalog: Catalog,
    levels: LevelSet,
    world: PhysicsWorld,
    level: Level,
    player: Player,
    camera: Camera,
    rng: ChaCha8Rng,
    phase: Phase,
    frame: u64,
    message_opacity: u8,
    restart_held: bool,
}

impl Game {
    /// Starts at the first level. Every level is validated up front.
    pub fn new(config: GameConfig, levels: LevelSet, seed: u64) -> Result<Self, LevelError> {
        Self::starting_at(config, levels, seed, 0)
    }

    pub fn starting_at(
        config: GameConfig,
        levels: LevelSet,
        seed: u64,
        index: usize,
    ) -> Result<Self, LevelError> {
        let catalog = Catalog::new(&config);
        levels.validate(&catalog)?;
        let (world, level, player) = build_world(levels.get(index)?, index, &catalog, &config)?;
        let message_opacity = config.world.message_opacity;

        Ok(Self {
            config,
            catalog,
            levels,
            world,
            level,
            player,
            camera: Camera::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            phase: Phase::Playing,
            frame: 0,
            message_opacity,
            restart_held: false,
        })
    }

    /// Advances the game by one tick.
    ///
    /// Physics integrates first, then every block classifies and reacts to
    /// its contact with the player, then the player controller runs. Death,
    /// restart and level completion rebuild the world before returning.
    pub fn tick(&mut self, input: &impl InputSource) -> Result<TickReport, LevelError> {
        self.frame += 1;
        let mut report = TickReport {
            frame: self.frame,
            events: Vec::new(),
        };
        if self.phase == Phase::Won {
            return Ok(report);
        }

        let restart = input.is_down(Key::Restart);
        let restart_pressed = restart && !self.restart_held;
        self.restart_held = restart;
        if restart_pressed {
            info!(level = self.level.index, "restarting level");
            self.reset_level()?;
            report.events.push(GameEvent::LevelReset {
                level: self.level.index,
            });
            return Ok(report);
        }

        let impact_velocity = self.world.velocity(self.player.body).unwrap_or_default();
        let started = self.world.step();

        let mut ctx = ContactContext {
            player_body: self.player.body,
            player_collider: self.player.collider,
            impact_velocity,
            rng: &mut self.rng,
        };
        for block in &mut self.level.blocks {
            block.update(&mut self.world);
            report.events.extend(block.run(&mut self.world, &mut ctx));
        }

        for event in started {
            report.events.extend(self.player.on_collision_started(
                &mut self.world,
                event,
                &self.level,
                &self.config,
            ));
        }
        report
            .events
            .extend(self.player.run(&mut self.world, &self.level, input, &self.config));

        if self.config.world.camera {
            if let Some(position) = self.player.position(&self.world) {
                self.camera.follow(
                    position,
                    self.config.world.viewport,
                    self.config.world.camera_friction,
                );
            }
        }
        self.message_opacity = self.message_opacity.saturating_sub(1);

        if self.player.died {
            info!(level = self.level.index, frame = self.frame, "player died");
            self.reset_level()?;
            report.events.push(GameEvent::LevelReset {
                level: self.level.index,
            });
        } else if report.contains(|e| matches!(e, GameEvent::GoalReached { .. })) {
            self.advance(&mut report.events)?;
        }

        trace!(frame = self.frame, events = report.events.len(), "tick");
        Ok(report)
    }

    /// Rebuilds the current level from its definition.
    pub fn reset_level(&mut self) -> Result<(), LevelError> {
        self.load(self.level.index)
    }

    fn advance(&mut self, events: &mut Vec<GameEvent>) -> Result<(), LevelError> {
        let next = self.level.index + 1;
        if next < self.levels.len() {
            self.load(next)?;
            info!(level = next, "advanced to next level");
            events.push(GameEvent::LevelAdvanced { level: next });
        } else {
            info!(frame = self.frame, "all levels complete");
            self.phase = Phase::Won;
            events.push(GameEvent::Won);
        }
        Ok(())
    }

    /// Replaces world, level and player together, or leaves all three alone.
    fn load(&mut self, index: usize) -> Result<(), LevelError> {
        let def = self.levels.get(index)?;
        let (world, level, player) = build_world(def, index, &self.catalog, &self.config)?;
        self.world = world;
        self.level = level;
        self.player = player;
        self.message_opacity = self.config.world.message_opacity;
        Ok(())
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn player_position(&self) -> Option<Vector> {
        self.player.position(&self.world)
    }

    /// The level message and its current opacity, while still visible.
    pub fn message(&self) -> Option<(&str, u8)> {
        let message = self.level.message.as_deref()?;
        (self.message_opacity > 0).then_some((message, self.message_opacity))
    }
}

fn build_world(
    def: &LevelDef,
    index: usize,
    catalog: &Catalog,
    config: &GameConfig,
) -> Result<(PhysicsWorld, Level, Player), LevelError> {
    let mut world = PhysicsWorld::with_gravity(Vector::new(0.0, config.world.gravity));
    let (level, player) = Level::build(def, index, catalog, config, &mut world)?;
    Ok((world, level, player))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockState;
    use crate::catalog::Behavior;
    use crate::events::Side;
    use crate::input::KeyState;

    fn game(levels: &[&[&str]]) -> Game {
        let defs = levels.iter().map(|rows| LevelDef::new(rows)).collect();
        Game::new(GameConfig::default(), LevelSet::new(defs).unwrap(), 42).unwrap()
    }

    fn run(game: &mut Game, input: KeyState, ticks: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(game.tick(&input).unwrap().events);
        }
        events
    }

    fn jumps(events: &[GameEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Jumped { consecutive } => Some(*consecutive),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_player_settles_on_ground() {
        let mut game = game(&[&["     ", "  @  ", "00000"]]);
        run(&mut game, KeyState::new(), 60);

        assert!(game.player().sensors.bottom);
        let pos = game.player_position().unwrap();
        assert!((pos.y - 75.0).abs() < 1.0, "resting at {}", pos.y);
    }

    #[test]
    fn test_held_jump_fires_once() {
        let mut game = game(&[&["     ", "  @  ", "00000"]]);
        run(&mut game, KeyState::new(), 60);
        let rest_y = game.player_position().unwrap().y;

        let jump = KeyState::from_keys(&[Key::Jump]);
        let first = game.tick(&jump).unwrap();
        assert_eq!(jumps(&first.events), vec![1]);
        assert!(game.world().velocity(game.player().body).unwrap().y < 0.0);

        let held = run(&mut game, jump, 10);
        assert!(jumps(&held).is_empty());
        assert!(game.player_position().unwrap().y < rest_y - 10.0);

        // Landing while still holding does not jump again.
        let held = run(&mut game, jump, 80);
        assert!(jumps(&held).is_empty());
        assert!(game.player().sensors.bottom);

        // Release, stay grounded past the reset window, then press again.
        run(&mut game, KeyState::new(), 30);
        let again = game.tick(&jump).unwrap();
        assert_eq!(jumps(&again.events), vec![1]);
    }

    #[test]
    fn test_fall_death_resets_level() {
        let mut game = game(&[&["@    ", "     ", "   00"]]);
        let bodies = game.world().rigid_body_set.len();
        assert_eq!(bodies, 3);

        let events = run(&mut game, KeyState::new(), 200);
        assert!(events.contains(&GameEvent::Died));
        assert!(events.contains(&GameEvent::LevelReset { level: 0 }));
        assert_eq!(game.world().rigid_body_set.len(), 3);
        assert!(!game.player().died);
    }

    #[test]
    fn test_reset_restores_spawn() {
        let mut game = game(&[&["@    ", "     ", "   00"]]);
        loop {
            let report = game.tick(&KeyState::new()).unwrap();
            if report.contains(|e| *e == GameEvent::Died) {
                break;
            }
            assert!(game.frame() < 400, "never died");
        }
        assert_eq!(game.player_position(), Some(Vector::new(0.0, 0.0)));
    }

    #[test]
    fn test_restart_key_is_edge_triggered() {
        let mut game = game(&[&["     ", "  @  ", "00000"]]);
        run(&mut game, KeyState::from_keys(&[Key::Right]), 20);
        assert!(game.player_position().unwrap().x > 100.0);

        let restart = KeyState::from_keys(&[Key::Restart]);
        let report = game.tick(&restart).unwrap();
        assert_eq!(report.events, vec![GameEvent::LevelReset { level: 0 }]);
        assert_eq!(game.player_position(), Some(Vector::new(100.0, 50.0)));

        let held = run(&mut game, restart, 5);
        assert!(!held.iter().any(|e| matches!(e, GameEvent::LevelReset { .. })));
    }

    #[test]
    fn test_goal_advances_then_wins() {
        let mut game = game(&[&["  @  ", "0+++0"], &["@", "+"]]);
        let events = run(&mut game, KeyState::new(), 60);
        assert!(events.contains(&GameEvent::LevelAdvanced { level: 1 }));
        assert_eq!(game.level().index, 1);

        let events = run(&mut game, KeyState::new(), 60);
        assert!(events.contains(&GameEvent::Won));
        assert_eq!(game.phase(), Phase::Won);

        let report = game.tick(&KeyState::new()).unwrap();
        assert!(report.events.is_empty());
    }

    #[test]
    fn test_falling_onto_glass_breaks_it() {
        let mut game = game(&[&["@", " ", " ", " ", "g", " ", "0"]]);
        loop {
            let report = game.tick(&KeyState::new()).unwrap();
            if report.contains(|e| *e == GameEvent::GlassBroken { block: 0 }) {
                break;
            }
            assert!(game.frame() < 120, "glass never broke");
        }
        assert!(game.level().blocks[0].is_broken());
        assert!(!game.level().blocks[0].particles().is_empty());
    }

    #[test]
    fn test_wall_jump_off_wall_in_mid_air() {
        let mut game = game(&[&[
            "0     ", "0     ", "0 @   ", "0     ", "0     ", "0     ", "000000",
        ]]);
        let left = KeyState::from_keys(&[Key::Left]);
        while !game.player().sensors.left {
            game.tick(&left).unwrap();
            assert!(game.frame() < 60, "never reached the wall");
        }
        let pos = game.player_position().unwrap();
        assert!(pos.y < 250.0, "touched the wall at floor level, y = {}", pos.y);

        let report = game.tick(&left.with(Key::Jump)).unwrap();
        assert!(report.events.contains(&GameEvent::WallJumped { side: Side::Left }));
        let velocity = game.world().velocity(game.player().body).unwrap();
        assert!(velocity.x > 0.0 && velocity.y < 0.0, "velocity {velocity:?}");
    }

    #[test]
    fn test_falling_past_rope_grabs_it() {
        let mut game = game(&[&[
            "  @ r   ", "    r   ", "    r   ", "    r   ", "        ", "        ", "00000000",
        ]]);
        let right = KeyState::from_keys(&[Key::Right]);
        let mut grabbed_at = None;
        for _ in 0..60 {
            let report = game.tick(&right).unwrap();
            if report.contains(|e| *e == GameEvent::RopeGrabbed { rope: 0 }) {
                grabbed_at = Some(report.frame);
                break;
            }
        }
        assert!(grabbed_at.is_some(), "never grabbed the rope");
        assert!(game.player().is_grabbing());
        assert_eq!(game.player().grab.unwrap().anchor, game.level().ropes[0].anchor);
    }

    #[test]
    fn test_downhill_speed_carries_onto_flat() {
        let mut game = game(&[&["@        ", "\\\\\\\\00000"]]);
        let speed = game.config().player.speed;
        let right = KeyState::from_keys(&[Key::Right]);

        let mut top_speed = 0.0_f32;
        let mut carried = 0.0_f32;
        for _ in 0..60 {
            game.tick(&right).unwrap();
            let motion = game.player().motion;
            top_speed = top_speed.max(motion.speed);
            carried = carried.max(motion.downhill_momentum);
        }
        assert!(top_speed > speed * 1.2, "top speed {top_speed}");
        assert!(carried > 1.0, "carried momentum {carried}");
        assert!(game.player().motion.downhill_momentum < carried);
    }

    #[test]
    fn test_seesaw_tilts_under_rider() {
        let mut game = game(&[&["    @   ", "        ", "  sss   ", "00000000"]]);
        let body = game.level().seesaws[0].body;
        let max_angle = match game.catalog.lookup('s').map(|spec| &spec.behavior) {
            Some(Behavior::Pivoting(params)) => params.max_angle,
            _ => panic!("'s' is not a pivot block"),
        };

        let mut ridden = false;
        let mut steepest = 0.0_f32;
        for _ in 0..60 {
            game.tick(&KeyState::new()).unwrap();
            ridden |= matches!(
                &game.level().blocks[1].state,
                BlockState::Pivoting(pivot) if pivot.player_on
            );
            let angle = game.world().angle(body).unwrap();
            assert!(angle.abs() <= max_angle + 0.01, "angle {angle} past the limit");
            steepest = steepest.max(angle);
        }
        assert!(ridden);
        // Rider on the right of the pivot tips the right end down.
        assert!(steepest > 0.05, "steepest {steepest}");
    }

    #[test]
    fn test_message_fades() {
        let defs = vec![LevelDef::new(&["@", "0"]).with_message("hi")];
        let mut game = Game::new(GameConfig::default(), LevelSet::new(defs).unwrap(), 1).unwrap();
        assert_eq!(game.message(), Some(("hi", 255)));
        run(&mut game, KeyState::new(), 10);
        assert_eq!(game.message(), Some(("hi", 245)));

        game.reset_level().unwrap();
        assert_eq!(game.message(), Some(("hi", 255)));
    }

    #[test]
    fn test_same_seed_same_run() {
        let script = [
            (KeyState::from_keys(&[Key::Right]), 30),
            (KeyState::from_keys(&[Key::Right, Key::Jump]), 5),
            (KeyState::new(), 40),
        ];
        let play = || {
            let levels = LevelSet::default_set().unwrap();
            let mut game = Game::new(GameConfig::default(), levels, 9).unwrap();
            for &(input, ticks) in &script {
                run(&mut game, input, ticks);
            }
            game.player_position().unwrap()
        };
        assert_eq!(play(), play());
    }

    #[test]
    fn test_invalid_level_rejected_at_start() {
        let defs = vec![LevelDef::new(&["@", "0"]), LevelDef::new(&["@", "Z"])];
        let err = Game::new(GameConfig::default(), LevelSet::new(defs).unwrap(), 0).err();
        assert!(matches!(
            err,
            Some(LevelError::UnknownBlockType {
                level: 1,
                symbol: 'Z',
                ..
            })
        ));
    }
}
