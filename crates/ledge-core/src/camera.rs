//! Follow camera.

use rapier2d::prelude::Vector;

/// World-to-screen translation that eases toward centering a target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub offset: Vector,
}

impl Camera {
    /// Moves `1 / friction` of the remaining distance toward centering `target`
    /// in a viewport of the given size.
    pub fn follow(&mut self, target: Vector, viewport: [f32; 2], friction: f32) {
        let friction = friction.max(1.0);
        let goal = Vector::new(viewport[0] / 2.0 - target.x, viewport[1] / 2.0 - target.y);
        self.offset.x += (goal.x - self.offset.x) / friction;
        self.offset.y += (goal.y - self.offset.y) / friction;
    }

    /// Screen position of a world point.
    pub fn to_screen(&self, point: Vector) -> Vector {
        Vector::new(point.x + self.offset.x, point.y + self.offset.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_converges_on_target() {
        let mut camera = Camera::default();
        let target = Vector::new(300.0, 200.0);
        camera.follow(target, [1000.0, 500.0], 10.0);
        assert!((camera.offset.x - 20.0).abs() < 1e-4);
        assert!((camera.offset.y - 5.0).abs() < 1e-4);

        for _ in 0..500 {
            camera.follow(target, [1000.0, 500.0], 10.0);
        }
        let screen = camera.to_screen(target);
        assert!((screen.x - 500.0).abs() < 0.01);
        assert!((screen.y - 250.0).abs() < 0.01);
    }

    #[test]
    fn test_friction_of_one_snaps() {
        let mut camera = Camera::default();
        camera.follow(Vector::new(0.0, 0.0), [100.0, 100.0], 0.0);
        assert_eq!(camera.offset, Vector::new(50.0, 50.0));
    }
}
