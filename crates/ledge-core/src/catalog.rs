//! Block catalog: what each bitmap symbol spawns.

use std::collections::HashMap;

use crate::config::GameConfig;
use crate::error::LevelError;

/// Which way a surface runs downhill, in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downhill {
    Left,
    Right,
}

/// A polygon in cell space, measured from the cell's top-left corner
/// (or around the origin for centered shapes).
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub points: Vec<[f32; 2]>,
}

impl Shape {
    pub fn rect(width: f32, height: f32) -> Self {
        Self {
            points: vec![[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]],
        }
    }

    /// A rectangle centered on the origin.
    pub fn centered_rect(width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self {
            points: vec![[-hw, -hh], [hw, -hh], [hw, hh], [-hw, hh]],
        }
    }

    /// `(min, max)` corners of the bounding box.
    pub fn bounds(&self) -> ([f32; 2], [f32; 2]) {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for p in &self.points {
            min[0] = min[0].min(p[0]);
            min[1] = min[1].min(p[1]);
            max[0] = max[0].max(p[0]);
            max[1] = max[1].max(p[1]);
        }
        (min, max)
    }

    pub fn size(&self) -> [f32; 2] {
        let (min, max) = self.bounds();
        [max[0] - min[0], max[1] - min[1]]
    }

    /// Points shifted so the bounding box is centered on the origin,
    /// along with the offset from the original origin to that center.
    pub fn recentered(&self) -> (Vec<[f32; 2]>, [f32; 2]) {
        let (min, max) = self.bounds();
        let center = [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0];
        let points = self
            .points
            .iter()
            .map(|p| [p[0] - center[0], p[1] - center[1]])
            .collect();
        (points, center)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveParams {
    /// Travel above the starting height, in pixels.
    pub distance: f32,
    /// Pixels per tick.
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotParams {
    /// Rotation limit either side of level, in radians.
    pub max_angle: f32,
    /// Angular velocity (rad/tick) added per block-width of rider offset.
    pub tilt_response: f32,
    /// Pull back toward level for standalone seesaws, rad/tick per radian.
    pub restoring: f32,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopeParams {
    pub segment_radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakParams {
    /// Impact speed (px/tick, larger axis) that shatters the block.
    pub break_speed: f32,
    pub particle_count: usize,
    /// Ticks a shard survives, before jitter.
    pub particle_lifetime: i32,
}

/// What a block does each tick beyond being solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Static,
    Moving(MoveParams),
    Pivoting(PivotParams),
    Rope(RopeParams),
    Breakable(BreakParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSpec {
    pub symbol: char,
    pub shape: Shape,
    pub behavior: Behavior,
    pub slope: Option<Downhill>,
    /// Touching this block completes the level.
    pub goal: bool,
}

impl BlockSpec {
    fn solid(symbol: char, shape: Shape) -> Self {
        Self {
            symbol,
            shape,
            behavior: Behavior::Static,
            slope: None,
            goal: false,
        }
    }

    fn slope(symbol: char, points: Vec<[f32; 2]>, downhill: Downhill) -> Self {
        Self {
            slope: Some(downhill),
            ..Self::solid(symbol, Shape { points })
        }
    }
}

/// Symbol table for one block size.
#[derive(Debug, Clone)]
pub struct Catalog {
    block_size: f32,
    specs: HashMap<char, BlockSpec>,
}

impl Catalog {
    pub fn new(config: &GameConfig) -> Self {
        let bs = config.world.block_size;
        let mut specs = HashMap::new();
        let mut add = |spec: BlockSpec| {
            specs.insert(spec.symbol, spec);
        };

        add(BlockSpec::solid('0', Shape::rect(bs, bs)));
        add(BlockSpec::solid('p', Shape::rect(bs, bs)));
        add(BlockSpec::solid('a', Shape::rect(800.0, 50.0)));
        add(BlockSpec::solid('b', Shape::rect(50.0, 400.0)));
        add(BlockSpec {
            goal: true,
            ..BlockSpec::solid('+', Shape::rect(bs, bs))
        });

        add(BlockSpec::slope(
            '<',
            vec![[bs, 0.0], [bs, bs], [0.0, bs]],
            Downhill::Left,
        ));
        add(BlockSpec::slope(
            '>',
            vec![[0.0, 0.0], [bs, bs], [0.0, bs]],
            Downhill::Right,
        ));
        add(BlockSpec::slope(
            '\\',
            vec![[0.0, 0.0], [bs, bs], [bs, 0.0]],
            Downhill::Right,
        ));
        add(BlockSpec::slope(
            '/',
            vec![[0.0, 0.0], [bs, 0.0], [0.0, bs]],
            Downhill::Left,
        ));

        add(BlockSpec {
            behavior: Behavior::Moving(MoveParams {
                distance: 100.0,
                speed: 1.0,
            }),
            ..BlockSpec::solid('m', Shape::rect(bs, bs))
        });
        add(BlockSpec {
            behavior: Behavior::Pivoting(PivotParams {
                max_angle: 0.8,
                tilt_response: 0.002,
                restoring: 0.0005,
                density: 2.0,
                friction: 0.8,
                restitution: 0.2,
            }),
            ..BlockSpec::solid('s', Self::seesaw_shape(bs, 3))
        });
        add(BlockSpec {
            behavior: Behavior::Rope(RopeParams {
                segment_radius: 5.0,
            }),
            ..BlockSpec::solid('r', Shape::rect(bs, bs))
        });
        add(BlockSpec {
            behavior: Behavior::Breakable(BreakParams {
                break_speed: config.player.break_speed(),
                particle_count: 15,
                particle_lifetime: 60,
            }),
            ..BlockSpec::solid('g', Shape::rect(bs, bs))
        });

        Self {
            block_size: bs,
            specs,
        }
    }

    /// Plank spanning `cells` block widths, centered on its pivot.
    pub fn seesaw_shape(block_size: f32, cells: usize) -> Shape {
        #[allow(clippy::cast_precision_loss)]
        Shape::centered_rect(block_size * cells as f32, block_size * 0.3)
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn lookup(&self, symbol: char) -> Option<&BlockSpec> {
        self.specs.get(&symbol)
    }

    /// Looks up a symbol found at `(row, column)` of level `level`.
    pub fn get(
        &self,
        symbol: char,
        level: usize,
        row: usize,
        column: usize,
    ) -> Result<&BlockSpec, LevelError> {
        self.lookup(symbol).ok_or(LevelError::UnknownBlockType {
            level,
            symbol,
            row,
            column,
        })
    }

    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.specs.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(&GameConfig::default())
    }

    #[test]
    fn test_known_symbols_present() {
        let catalog = catalog();
        for symbol in ['0', '+', '<', '>', '\\', '/', 'p', 'a', 'b', 'm', 's', 'r', 'g'] {
            assert!(catalog.lookup(symbol).is_some(), "missing {symbol:?}");
        }
        assert_eq!(catalog.symbols().count(), 13);
    }

    #[test]
    fn test_unknown_symbol_reports_location() {
        let err = catalog().get('Z', 3, 1, 4).unwrap_err();
        match err {
            LevelError::UnknownBlockType {
                level,
                symbol,
                row,
                column,
            } => {
                assert_eq!((level, symbol, row, column), (3, 'Z', 1, 4));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_slope_directions() {
        let catalog = catalog();
        assert_eq!(catalog.lookup('>').unwrap().slope, Some(Downhill::Right));
        assert_eq!(catalog.lookup('\\').unwrap().slope, Some(Downhill::Right));
        assert_eq!(catalog.lookup('<').unwrap().slope, Some(Downhill::Left));
        assert_eq!(catalog.lookup('/').unwrap().slope, Some(Downhill::Left));
        assert_eq!(catalog.lookup('0').unwrap().slope, None);
    }

    #[test]
    fn test_glass_threshold_follows_player_speed() {
        let mut config = GameConfig::default();
        config.player.speed = 10.0;
        let catalog = Catalog::new(&config);
        match catalog.lookup('g').unwrap().behavior {
            Behavior::Breakable(params) => assert!((params.break_speed - 12.0).abs() < 1e-5),
            other => panic!("glass has behavior {other:?}"),
        }
    }

    #[test]
    fn test_goal_flag_only_on_plus() {
        let catalog = catalog();
        assert!(catalog.lookup('+').unwrap().goal);
        assert!(!catalog.lookup('0').unwrap().goal);
    }

    #[test]
    fn test_shape_recentered_about_bounds() {
        let shape = Shape::rect(800.0, 50.0);
        let (points, center) = shape.recentered();
        assert_eq!(center, [400.0, 25.0]);
        assert_eq!(points[0], [-400.0, -25.0]);
        assert_eq!(shape.size(), [800.0, 50.0]);
    }

    #[test]
    fn test_seesaw_shape_width() {
        let shape = Catalog::seesaw_shape(50.0, 4);
        assert_eq!(shape.size(), [200.0, 15.0]);
    }
}
