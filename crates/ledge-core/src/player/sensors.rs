//! Ground and wall sensing from block support points.

use rapier2d::prelude::Vector;

#[allow(clippy::cast_possible_truncation)]
fn px(v: f32) -> i64 {
    v.round() as i64
}

/// Which sides of the player are touching terrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sensors {
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl Sensors {
    /// Classifies support points against the player's box.
    ///
    /// A point at the feet (rounded to whole pixels) counts as ground. Any
    /// other point on the left or right edge counts as wall. A slope point
    /// that rounds differently from the feet line is therefore read as a
    /// wall touch, not ground.
    pub fn detect(supports: &[Vector], center: Vector, width: f32, height: f32) -> Self {
        let feet = px(center.y + height / 2.0);
        let left_edge = px(center.x - width / 2.0);
        let right_edge = px(center.x + width / 2.0);

        let mut sensors = Self::default();
        for point in supports {
            if px(point.y) == feet {
                sensors.bottom = true;
                continue;
            }
            let x = px(point.x);
            sensors.left |= x == left_edge;
            sensors.right |= x == right_edge;
        }
        sensors
    }

    /// Whether `point` lies on the feet line of a player at `center`.
    pub fn at_feet(point: Vector, center: Vector, height: f32) -> bool {
        px(point.y) == px(center.y + height / 2.0)
    }

    /// Exactly one wall is touched.
    pub fn single_wall(self) -> bool {
        self.left != self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Vector = Vector::new(100.0, 75.0);

    fn detect(points: &[(f32, f32)]) -> Sensors {
        let supports: Vec<Vector> = points.iter().map(|&(x, y)| Vector::new(x, y)).collect();
        Sensors::detect(&supports, CENTER, 30.0, 50.0)
    }

    #[test]
    fn test_ground_under_feet() {
        let sensors = detect(&[(85.0, 100.0), (115.0, 99.8)]);
        assert_eq!(
            sensors,
            Sensors {
                bottom: true,
                left: false,
                right: false
            }
        );
    }

    #[test]
    fn test_walls_exclude_feet_points() {
        // A point at the bottom-right corner is ground, not wall.
        let sensors = detect(&[(115.0, 100.0)]);
        assert!(sensors.bottom && !sensors.right);

        let sensors = detect(&[(115.0, 60.0), (115.2, 90.0)]);
        assert!(!sensors.bottom && sensors.right && !sensors.left);
        assert!(sensors.single_wall());

        let sensors = detect(&[(85.0, 60.0), (115.0, 60.0)]);
        assert!(sensors.left && sensors.right);
        assert!(!sensors.single_wall());
    }

    #[test]
    fn test_slope_points_can_miss_the_feet_line() {
        // On a slope the lowest contact sits a few pixels off the feet line.
        let sensors = detect(&[(85.0, 97.0)]);
        assert!(!sensors.bottom);
        assert!(sensors.left);
    }

    #[test]
    fn test_no_supports() {
        assert_eq!(detect(&[]), Sensors::default());
    }

    #[test]
    fn test_at_feet_rounds() {
        assert!(Sensors::at_feet(Vector::new(0.0, 100.4), CENTER, 50.0));
        assert!(!Sensors::at_feet(Vector::new(0.0, 101.0), CENTER, 50.0));
    }
}
