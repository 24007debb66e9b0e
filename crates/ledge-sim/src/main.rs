//! Ledge headless runner
//!
//! Plays a scripted input track against a level set and logs what happened.
//!
//! Usage:
//!   cargo run -p ledge-sim -- --script "R:60,RJ:5,R:40" --ticks 600

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use ledge_core::{Game, GameConfig, GameEvent, InputScript, KeyState, LevelSet, Phase};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ledge-sim", version, about = "Run ledge levels headless from an input script")]
struct Args {
    /// Level set JSON. Defaults to the built-in levels.
    #[arg(long)]
    levels: Option<PathBuf>,
    /// Config JSON; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Index of the level to start on.
    #[arg(long, default_value_t = 0)]
    level: usize,
    /// Ticks to run. Defaults to the script length, or 600 without a script.
    #[arg(long)]
    ticks: Option<u64>,
    /// Comma-separated `KEYS:TICKS` steps, keys from `L R U D J E X`, `-` for none.
    #[arg(long)]
    script: Option<String>,
    /// Seed for glass shards.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Debug, Default)]
struct Summary {
    ticks: u64,
    deaths: u32,
    jumps: u32,
    grabs: u32,
    glass: u32,
}

impl Summary {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Died => self.deaths += 1,
            GameEvent::Jumped { .. } | GameEvent::WallJumped { .. } => self.jumps += 1,
            GameEvent::RopeGrabbed { .. } => self.grabs += 1,
            GameEvent::GlassBroken { .. } => self.glass += 1,
            _ => {}
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    GameConfig::from_json(&json).with_context(|| format!("parse config {}", path.display()))
}

fn load_levels(path: Option<&PathBuf>) -> Result<LevelSet> {
    let Some(path) = path else {
        return LevelSet::default_set().context("load built-in levels");
    };
    let json = fs::read_to_string(path).with_context(|| format!("read levels {}", path.display()))?;
    LevelSet::from_json(&json).with_context(|| format!("parse levels {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let levels = load_levels(args.levels.as_ref())?;
    let script: InputScript = match &args.script {
        Some(script) => script.parse().context("parse input script")?,
        None => InputScript::default(),
    };
    let ticks = args.ticks.unwrap_or(match script.total_ticks() {
        0 => 600,
        n => n,
    });

    let mut game = Game::starting_at(config, levels, args.seed, args.level)
        .with_context(|| format!("start at level {}", args.level))?;
    info!(level = args.level, ticks, seed = args.seed, "starting run");

    let mut summary = Summary::default();
    let mut frames = script.frames().chain(std::iter::repeat(KeyState::new()));
    for _ in 0..ticks {
        let input = frames.next().unwrap_or_default();
        let report = game.tick(&input)?;
        summary.ticks += 1;
        for event in &report.events {
            summary.record(event);
            match event {
                GameEvent::ContactAnglesChanged { angles } => {
                    debug!(frame = report.frame, ?angles, "contact angles");
                }
                _ => info!(frame = report.frame, ?event, "event"),
            }
        }
        if game.phase() == Phase::Won {
            break;
        }
    }

    let position = game.player_position().unwrap_or_default();
    info!(
        ticks = summary.ticks,
        level = game.level().index,
        won = game.phase() == Phase::Won,
        deaths = summary.deaths,
        jumps = summary.jumps,
        grabs = summary.grabs,
        glass = summary.glass,
        x = position.x,
        y = position.y,
        "run finished"
    );
    Ok(())
}
