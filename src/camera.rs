// Camera - position and viewing direction, read once per draw

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Unit vector
    pub direction: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, -3.0),
            direction: Vec3::Z,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        let mut camera = Self {
            position,
            ..Self::default()
        };
        camera.set_direction(direction);
        camera
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Normalizes `direction`. A zero-length vector keeps the old direction.
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize() {
            self.direction = direction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = Camera::default();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, -3.0));
        assert_eq!(camera.direction, Vec3::Z);
    }

    #[test]
    fn test_set_direction_normalizes() {
        let mut camera = Camera::default();
        camera.set_direction(Vec3::new(0.0, 3.0, 4.0));
        assert!((camera.direction.length() - 1.0).abs() < 1e-6);
        assert!((camera.direction.y - 0.6).abs() < 1e-6);
        assert!((camera.direction.z - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_direction_is_ignored() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::X);
        camera.set_direction(Vec3::ZERO);
        assert_eq!(camera.direction, Vec3::X);
    }
}
